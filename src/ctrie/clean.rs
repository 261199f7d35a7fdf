//! Lazy tombstone cleanup.
//!
//! A removal that leaves a single leaf in a non-root C-node (or list node)
//! entombs it. The parent still points at the dead I-node until someone
//! replaces the parent's C-node with a compressed copy holding the leaf
//! directly. Both the removing thread and any later traversal that meets the
//! tombstone do this; whoever wins the CAS is enough.

use std::ptr;

use seize::Guard;

use super::Ctrie;
use crate::error::{InvariantViolation, fatal};
use crate::node::{Branch, INode, LEVEL_BITS, MainNode, flag_pos};
use crate::tracing_helpers::{debug_log, trace_log};

impl<K, V, H> Ctrie<K, V, H> {
    /// Clean the parent of a tombed I-node found at `level`.
    ///
    /// # Panics
    ///
    /// A tombstone without a parent means the root was entombed, which
    /// contraction never does.
    pub(crate) fn clean_parent_of<G: Guard>(
        &self,
        parent: Option<&INode<K, V>>,
        level: u32,
        guard: &G,
    ) {
        match parent {
            Some(parent) => self.clean(parent, level - LEVEL_BITS, guard),
            None => fatal(InvariantViolation::TombstoneAtRoot),
        }
    }

    /// One attempt to compress the C-node held by `inode` at `level`.
    ///
    /// A lost race is not retried: the caller restarts anyway and will
    /// trip over the tombstone again if it is still there.
    pub(crate) fn clean<G: Guard>(&self, inode: &INode<K, V>, level: u32, guard: &G) {
        let main = inode.load(guard);

        if let MainNode::Branching(cnode) = main.node() {
            if inode.cas(main, cnode.compressed(level, guard), guard) {
                self.counters().record_cleanup();
                debug_log!(level, "clean: parent compressed");
            } else {
                trace_log!(level, "clean: lost race");
            }
        }
    }

    /// Absorb the tombed `inode` into `parent`, retrying until the parent no
    /// longer references it.
    ///
    /// Called by the removal that created the tombstone, so the trie is
    /// compact again by the time that removal returns (absent interference
    /// from other writers, which then own the cleanup).
    pub(crate) fn clean_parent<G: Guard>(
        &self,
        parent: &INode<K, V>,
        inode: &INode<K, V>,
        hash: u64,
        parent_level: u32,
        guard: &G,
    ) {
        loop {
            let pmain = parent.load(guard);
            let MainNode::Branching(cnode) = pmain.node() else {
                return;
            };

            let (flag, pos) = flag_pos(hash, parent_level, cnode.bitmap());
            if cnode.bitmap() & flag == 0 {
                return;
            }

            let Branch::Indirect(child) = cnode.branch(pos) else {
                return;
            };
            if !ptr::eq(&**child, inode) || !inode.load(guard).node().is_tomb() {
                return;
            }

            if parent.cas(pmain, cnode.compressed(parent_level, guard), guard) {
                self.counters().record_cleanup();
                debug_log!(parent_level, "clean_parent: tombstone absorbed");
                return;
            }

            trace_log!(parent_level, "clean_parent: lost race, retrying");
        }
    }
}
