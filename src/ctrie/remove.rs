//! Write path: removal and contraction.
//!
//! Removing a leaf copies its C-node without it. If that leaves a non-root
//! C-node holding one leaf, the copy is a tombstone instead, and the removal
//! immediately asks the parent to absorb it. List nodes follow the same rule
//! once a single entry is left.

use std::borrow::Borrow;
use std::sync::Arc;

use seize::Guard;

use super::{Attempt, Ctrie, Root};
use crate::hash::HashFunction;
use crate::node::{Branch, INode, LEVEL_BITS, MainNode, flag_pos};
use crate::tracing_helpers::{debug_log, trace_log};

impl<K, V, H> Ctrie<K, V, H>
where
    K: Eq + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Remove `key`, returning its value if it was present.
    ///
    /// Removing an absent key is a no-op.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ctrie::Ctrie;
    ///
    /// let trie: Ctrie<u64, u64> = Ctrie::new();
    /// trie.insert(1, 10);
    ///
    /// assert_eq!(trie.remove(&1).as_deref(), Some(&10));
    /// assert!(trie.remove(&1).is_none());
    /// ```
    pub fn remove<Q>(&self, key: &Q) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        H: HashFunction<Q>,
    {
        let guard = self.guard();
        self.remove_with_guard(key, &guard)
    }

    /// Remove `key` using an existing guard.
    ///
    /// # Panics
    ///
    /// Panics if `guard` was not created by this trie's [`guard`](Self::guard).
    pub fn remove_with_guard<Q, G>(&self, key: &Q, guard: &G) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        H: HashFunction<Q>,
        G: Guard,
    {
        self.verify_guard(guard);

        let hash: u64 = <H as HashFunction<Q>>::hash(&self.hasher, key);

        let mut retries: usize = 0;
        loop {
            let root: &Root<K, V> = self.root(guard);

            match self.try_remove(root, key, hash, guard) {
                Attempt::Done(removed) => {
                    if removed.is_some() {
                        root.dec_count();
                    }
                    return removed;
                }

                Attempt::Restart => {
                    trace_log!(retries, hash, "remove: restart");
                    self.backoff(retries);
                    retries += 1;
                }
            }
        }
    }

    fn try_remove<Q, G>(
        &self,
        root: &Root<K, V>,
        key: &Q,
        hash: u64,
        guard: &G,
    ) -> Attempt<Option<Arc<V>>>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        G: Guard,
    {
        let mut inode: &INode<K, V> = root.inode();
        let mut parent: Option<&INode<K, V>> = None;
        let mut level: u32 = 0;

        loop {
            let main = inode.load(guard);

            let (replacement, value): (MainNode<K, V>, Arc<V>) = match main.node() {
                MainNode::Branching(cnode) => {
                    let (flag, pos) = flag_pos(hash, level, cnode.bitmap());
                    if cnode.bitmap() & flag == 0 {
                        return Attempt::Done(None);
                    }

                    match cnode.branch(pos) {
                        Branch::Indirect(child) => {
                            parent = Some(inode);
                            inode = &**child;
                            level += LEVEL_BITS;
                            continue;
                        }

                        Branch::Leaf(leaf) if leaf.hash == hash && leaf.holds(key) => {
                            (cnode.removed(pos, flag).contracted(level), Arc::clone(&leaf.value))
                        }

                        Branch::Leaf(_) => return Attempt::Done(None),
                    }
                }

                MainNode::Tomb(_) => {
                    self.clean_parent_of(parent, level, guard);
                    return Attempt::Restart;
                }

                MainNode::List(list) => match list.removed(key) {
                    Some((rest, leaf)) => (rest, Arc::clone(&leaf.value)),
                    None => return Attempt::Done(None),
                },
            };

            let entombed: bool = replacement.is_tomb();
            if !inode.cas(main, replacement, guard) {
                return Attempt::Restart;
            }

            if entombed {
                self.counters().record_contraction();
                debug_log!(level, "remove: entombed last entry");

                if let Some(parent) = parent {
                    self.clean_parent(parent, inode, hash, level - LEVEL_BITS, guard);
                }
            }

            return Attempt::Done(Some(value));
        }
    }
}
