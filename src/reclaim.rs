//! Reclaim callbacks for seize-based memory reclamation.
//!
//! Two kinds of object are ever retired:
//! - main nodes replaced by a successful I-node CAS,
//! - roots (root I-node plus key count) replaced by
//!   [`Ctrie::clear`](crate::Ctrie::clear).
//!
//! Children are shared through `Arc`, so reclaiming a node only drops its
//! own references. A child I-node is freed (together with its current main
//! node) once the last main node pointing at it has been reclaimed.

use seize::Collector;

use crate::ctrie::Root;
use crate::node::MainNode;

/// Reclaim a boxed main node (seize callback).
///
/// # Safety
///
/// - `ptr` must come from `Box::into_raw` and must have been unlinked by a
///   successful CAS.
/// - Must only be called once seize determines no guard can still see it.
pub(crate) unsafe fn reclaim_main_node<K, V>(ptr: *mut MainNode<K, V>, _collector: &Collector) {
    // SAFETY: Caller guarantees ptr is valid and from Box::into_raw.
    // Seize ensures no readers remain.
    unsafe { drop(Box::from_raw(ptr)) };
}

/// Reclaim a boxed root and, through its drop, the tree below it.
///
/// # Safety
///
/// - `ptr` must come from `Box::into_raw` and must have been swapped out of
///   the trie's root slot.
/// - Must only be called once seize determines no guard can still see it.
pub(crate) unsafe fn reclaim_root<K, V>(ptr: *mut Root<K, V>, _collector: &Collector) {
    // SAFETY: Caller guarantees ptr is valid and from Box::into_raw.
    // Seize ensures no readers remain.
    unsafe { drop(Box::from_raw(ptr)) };
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::node::{CNode, SNode, TNode};

    #[test]
    fn test_reclaim_single_main_node() {
        let main: Box<MainNode<u64, u64>> = Box::new(MainNode::Branching(CNode::empty()));
        let ptr = Box::into_raw(main);

        // SAFETY: ptr was just created from Box::into_raw
        unsafe {
            let collector = Collector::new();
            reclaim_main_node(ptr, &collector);
        }
    }

    #[test]
    fn test_reclaim_main_node_keeps_shared_leaf_alive() {
        let value = Arc::new(7u64);
        let leaf = Arc::new(SNode::new(1, 1u64, Arc::clone(&value)));
        let ptr = Box::into_raw(Box::new(MainNode::Tomb(TNode::new(Arc::clone(&leaf)))));

        // SAFETY: ptr was just created from Box::into_raw
        unsafe {
            let collector = Collector::new();
            reclaim_main_node(ptr, &collector);
        }

        assert_eq!(Arc::strong_count(&leaf), 1);
        assert_eq!(*leaf.value, 7);
    }

    #[test]
    fn test_reclaim_root_drops_tree() {
        let value = Arc::new(7u64);
        let leaf = Arc::new(SNode::new(1, 1u64, Arc::clone(&value)));
        let root: Root<u64, u64> = Root::new(MainNode::Tomb(TNode::new(leaf)));
        let ptr = Box::into_raw(Box::new(root));

        // SAFETY: ptr was just created from Box::into_raw
        unsafe {
            let collector = Collector::new();
            reclaim_root(ptr, &collector);
        }

        assert_eq!(Arc::strong_count(&value), 1);
    }
}
