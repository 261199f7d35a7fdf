//! Read path.
//!
//! A lookup never CASes the node it reads. Its linearization point is the
//! protected load of the last main node it inspects; a tombstone met on the
//! way still answers the query (a dead I-node's content is frozen) after
//! asking the parent to absorb it.

use std::borrow::Borrow;
use std::sync::Arc;

use seize::Guard;

use super::Ctrie;
use crate::hash::HashFunction;
use crate::node::{Branch, INode, LEVEL_BITS, MainNode, SNode, flag_pos};

impl<K, V, H> Ctrie<K, V, H>
where
    K: Eq + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Get the value stored for `key`.
    ///
    /// The key may be any borrowed form of `K` that the hash function also
    /// accepts (`&str` for `String` keys with the default hasher).
    ///
    /// # Example
    ///
    /// ```rust
    /// use ctrie::Ctrie;
    ///
    /// let trie: Ctrie<String, u32> = Ctrie::new();
    /// assert!(trie.lookup("a").is_none());
    ///
    /// trie.insert("a".to_string(), 1);
    /// assert_eq!(trie.lookup("a").as_deref(), Some(&1));
    /// ```
    #[must_use]
    pub fn lookup<Q>(&self, key: &Q) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        H: HashFunction<Q>,
    {
        let guard = self.guard();
        self.lookup_with_guard(key, &guard)
    }

    /// Get the value stored for `key` using an existing guard.
    ///
    /// # Panics
    ///
    /// Panics if `guard` was not created by this trie's [`guard`](Self::guard).
    #[must_use]
    pub fn lookup_with_guard<Q, G>(&self, key: &Q, guard: &G) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        H: HashFunction<Q>,
        G: Guard,
    {
        self.verify_guard(guard);

        let hash: u64 = <H as HashFunction<Q>>::hash(&self.hasher, key);
        self.find(key, hash, guard).map(|leaf| Arc::clone(&leaf.value))
    }

    /// Check whether `key` is present.
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        H: HashFunction<Q>,
    {
        let guard = self.guard();
        let hash: u64 = <H as HashFunction<Q>>::hash(&self.hasher, key);
        self.find(key, hash, &guard).is_some()
    }

    /// Descend from the root to the leaf holding `key`.
    fn find<'g, Q, G>(&self, key: &Q, hash: u64, guard: &'g G) -> Option<&'g SNode<K, V>>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        G: Guard,
    {
        let mut inode: &'g INode<K, V> = self.root(guard).inode();
        let mut parent: Option<&'g INode<K, V>> = None;
        let mut level: u32 = 0;

        loop {
            match inode.load(guard).node() {
                MainNode::Branching(cnode) => {
                    let (flag, pos) = flag_pos(hash, level, cnode.bitmap());
                    if cnode.bitmap() & flag == 0 {
                        return None;
                    }

                    match cnode.branch(pos) {
                        Branch::Indirect(child) => {
                            parent = Some(inode);
                            inode = &**child;
                            level += LEVEL_BITS;
                        }

                        Branch::Leaf(leaf) => {
                            return (leaf.hash == hash && leaf.holds(key)).then_some(&**leaf);
                        }
                    }
                }

                MainNode::Tomb(tomb) => {
                    self.clean_parent_of(parent, level, guard);

                    let leaf: &'g SNode<K, V> = tomb.leaf();
                    return (leaf.hash == hash && leaf.holds(key)).then_some(leaf);
                }

                MainNode::List(list) => {
                    return list.lookup(key).map(|leaf| &**leaf);
                }
            }
        }
    }
}
