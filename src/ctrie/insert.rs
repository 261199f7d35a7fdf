//! Write path: insert and overwrite.
//!
//! Each attempt descends to the I-node whose main node must change, builds
//! the replacement, and CASes it in. The three shapes of change are:
//!
//! - empty slot: copy the C-node with the new leaf added,
//! - slot holds the same key: copy the C-node with the leaf replaced,
//! - slot holds another key: push both leaves into a fresh subtree built by
//!   [`MainNode::dual`], one level deeper.

use std::sync::Arc;

use seize::Guard;

use super::{Attempt, Ctrie, Root};
use crate::hash::HashFunction;
use crate::node::{Branch, INode, LEVEL_BITS, MainNode, SNode, flag_pos};
use crate::tracing_helpers::trace_log;

impl<K, V, H> Ctrie<K, V, H>
where
    K: Eq + Send + Sync + 'static,
    V: Send + Sync + 'static,
    H: HashFunction<K>,
{
    /// Insert `key` with `value`, replacing any existing value.
    ///
    /// Returns the previous value if the key was already present.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ctrie::Ctrie;
    ///
    /// let trie: Ctrie<u64, &str> = Ctrie::new();
    /// assert!(trie.insert(7, "a").is_none());
    /// assert_eq!(trie.insert(7, "b").as_deref(), Some(&"a"));
    /// assert_eq!(trie.lookup(&7).as_deref(), Some(&"b"));
    /// ```
    pub fn insert(&self, key: K, value: V) -> Option<Arc<V>> {
        let guard = self.guard();
        self.insert_with_guard(key, value, &guard)
    }

    /// Insert `key` with `value` using an existing guard.
    ///
    /// # Panics
    ///
    /// Panics if `guard` was not created by this trie's [`guard`](Self::guard).
    pub fn insert_with_guard<G: Guard>(&self, key: K, value: V, guard: &G) -> Option<Arc<V>> {
        self.verify_guard(guard);

        let hash: u64 = <H as HashFunction<K>>::hash(&self.hasher, &key);
        let leaf: Arc<SNode<K, V>> = Arc::new(SNode::new(hash, key, Arc::new(value)));

        let mut retries: usize = 0;
        loop {
            let root: &Root<K, V> = self.root(guard);

            match self.try_insert(root, &leaf, guard) {
                Attempt::Done(old) => {
                    if old.is_none() {
                        root.inc_count();
                    }
                    return old;
                }

                Attempt::Restart => {
                    trace_log!(retries, hash, "insert: restart");
                    self.backoff(retries);
                    retries += 1;
                }
            }
        }
    }

    fn try_insert<G: Guard>(
        &self,
        root: &Root<K, V>,
        leaf: &Arc<SNode<K, V>>,
        guard: &G,
    ) -> Attempt<Option<Arc<V>>> {
        let hash: u64 = leaf.hash;
        let mut inode: &INode<K, V> = root.inode();
        let mut parent: Option<&INode<K, V>> = None;
        let mut level: u32 = 0;

        loop {
            let main = inode.load(guard);

            match main.node() {
                MainNode::Branching(cnode) => {
                    let (flag, pos) = flag_pos(hash, level, cnode.bitmap());

                    if cnode.bitmap() & flag == 0 {
                        let new = cnode.inserted(pos, flag, Branch::Leaf(Arc::clone(leaf)));
                        return if inode.cas(main, MainNode::Branching(new), guard) {
                            Attempt::Done(None)
                        } else {
                            Attempt::Restart
                        };
                    }

                    match cnode.branch(pos) {
                        Branch::Indirect(child) => {
                            parent = Some(inode);
                            inode = &**child;
                            level += LEVEL_BITS;
                        }

                        Branch::Leaf(existing)
                            if existing.hash == hash && existing.key == leaf.key =>
                        {
                            let old: Arc<V> = Arc::clone(&existing.value);
                            let new = cnode.updated(pos, Branch::Leaf(Arc::clone(leaf)));

                            return if inode.cas(main, MainNode::Branching(new), guard) {
                                Attempt::Done(Some(old))
                            } else {
                                Attempt::Restart
                            };
                        }

                        Branch::Leaf(existing) => {
                            let below = MainNode::dual(
                                Arc::clone(existing),
                                Arc::clone(leaf),
                                level + LEVEL_BITS,
                                self.max_level(),
                            );
                            let child = Branch::Indirect(Arc::new(INode::new(below)));

                            let new = cnode.updated(pos, child);

                            if !inode.cas(main, MainNode::Branching(new), guard) {
                                return Attempt::Restart;
                            }
                            self.counters().record_expansion();
                            return Attempt::Done(None);
                        }
                    }
                }

                MainNode::Tomb(_) => {
                    self.clean_parent_of(parent, level, guard);
                    return Attempt::Restart;
                }

                MainNode::List(list) => {
                    let (new, old) = list.inserted(leaf);

                    return if inode.cas(main, MainNode::List(new), guard) {
                        Attempt::Done(old)
                    } else {
                        Attempt::Restart
                    };
                }
            }
        }
    }
}
