//! Weakly consistent iteration.
//!
//! The iterator walks the trie depth-first, loading each I-node's main node
//! when it first reaches it. Main nodes are immutable, so every branch array
//! it walks is a consistent picture of its level at the moment of the load;
//! updates to subtrees not yet visited may or may not be seen. Every key
//! present for the whole iteration is yielded exactly once.

use std::iter::FusedIterator;
use std::slice;
use std::sync::Arc;

use seize::Guard;

use super::Ctrie;
use crate::node::{Branch, MainNode, SNode};

impl<K, V, H> Ctrie<K, V, H> {
    /// Iterate over all entries, protected by `guard`.
    ///
    /// # Panics
    ///
    /// Panics if `guard` was not created by this trie's [`guard`](Self::guard),
    /// as do [`keys`](Self::keys) and [`values`](Self::values).
    ///
    /// # Example
    ///
    /// ```rust
    /// use ctrie::Ctrie;
    ///
    /// let trie: Ctrie<u64, u64> = (0..10).map(|i| (i, i * i)).collect();
    /// let guard = trie.guard();
    ///
    /// let mut squares: Vec<u64> = trie.values(&guard).copied().collect();
    /// squares.sort_unstable();
    /// assert_eq!(squares[3], 9);
    /// ```
    pub fn iter<'g, G: Guard>(&'g self, guard: &'g G) -> Iter<'g, K, V, G> {
        self.verify_guard(guard);

        let mut iter = Iter {
            guard,
            stack: Vec::new(),
        };
        iter.descend(self.root(guard).inode().load(guard).node());
        iter
    }

    /// Iterate over all keys, protected by `guard`.
    pub fn keys<'g, G: Guard>(&'g self, guard: &'g G) -> Keys<'g, K, V, G> {
        Keys {
            inner: self.iter(guard),
        }
    }

    /// Iterate over all values, protected by `guard`.
    pub fn values<'g, G: Guard>(&'g self, guard: &'g G) -> Values<'g, K, V, G> {
        Values {
            inner: self.iter(guard),
        }
    }
}

enum Frame<'g, K, V> {
    Branches(slice::Iter<'g, Branch<K, V>>),
    Entries(slice::Iter<'g, Arc<SNode<K, V>>>),
}

/// Iterator over `(&K, &V)` pairs, see [`Ctrie::iter`].
pub struct Iter<'g, K, V, G> {
    guard: &'g G,
    stack: Vec<Frame<'g, K, V>>,
}

impl<'g, K, V, G: Guard> Iter<'g, K, V, G> {
    fn descend(&mut self, main: &'g MainNode<K, V>) {
        let frame = match main {
            MainNode::Branching(cnode) => Frame::Branches(cnode.branches().iter()),
            MainNode::Tomb(tomb) => Frame::Entries(slice::from_ref(tomb.leaf()).iter()),
            MainNode::List(list) => Frame::Entries(list.entries().iter()),
        };
        self.stack.push(frame);
    }
}

impl<'g, K, V, G: Guard> Iterator for Iter<'g, K, V, G> {
    type Item = (&'g K, &'g V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let leaf: &'g SNode<K, V> = match self.stack.last_mut()? {
                Frame::Branches(branches) => match branches.next() {
                    Some(Branch::Leaf(leaf)) => leaf,
                    Some(Branch::Indirect(inode)) => {
                        let main: &'g MainNode<K, V> = inode.load(self.guard).node();
                        self.descend(main);
                        continue;
                    }
                    None => {
                        self.stack.pop();
                        continue;
                    }
                },

                Frame::Entries(entries) => match entries.next() {
                    Some(leaf) => leaf,
                    None => {
                        self.stack.pop();
                        continue;
                    }
                },
            };

            return Some((&leaf.key, &*leaf.value));
        }
    }
}

impl<K, V, G: Guard> FusedIterator for Iter<'_, K, V, G> {}

/// Iterator over keys, see [`Ctrie::keys`].
pub struct Keys<'g, K, V, G> {
    inner: Iter<'g, K, V, G>,
}

impl<'g, K, V, G: Guard> Iterator for Keys<'g, K, V, G> {
    type Item = &'g K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }
}

/// Iterator over values, see [`Ctrie::values`].
pub struct Values<'g, K, V, G> {
    inner: Iter<'g, K, V, G>,
}

impl<'g, K, V, G: Guard> Iterator for Values<'g, K, V, G> {
    type Item = &'g V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }
}
