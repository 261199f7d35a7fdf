//! Trie nodes.
//!
//! ```text
//!   INode ──main──▶ MainNode::Branching(CNode) ── [Branch::Indirect(INode) | Branch::Leaf(SNode)]*
//!                   MainNode::Tomb(TNode)      ── SNode
//!                   MainNode::List(LNode)      ── SNode, SNode, ...
//! ```
//!
//! An [`INode`] is the only mutable object: its main-node pointer changes by
//! CAS and nothing else. Every main node and every [`SNode`] is immutable
//! once published. A change at one level builds a fresh main node that
//! shares all untouched children with the old one through `Arc`, then swings
//! the I-node to it.
//!
//! # Addressing
//!
//! Level `lev` (counted in bits, stepping by [`LEVEL_BITS`]) uses the slice
//! `(hash >> lev) & 0x1f` as the branch index. A C-node stores only present
//! branches, sorted by index; the physical position of index `i` is the
//! popcount of the bitmap below bit `i` (see [`flag_pos`]).

use std::borrow::Borrow;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::AtomicPtr;

use seize::Guard;

use crate::error::{InvariantViolation, fatal};
use crate::ordering::{CAS_FAILURE, CAS_SUCCESS, READ_ORD};
use crate::reclaim::reclaim_main_node;

/// Bits of hash consumed per level.
pub const LEVEL_BITS: u32 = 5;

/// Mask selecting one level's slice of the hash.
pub const LEVEL_MASK: u64 = (1 << LEVEL_BITS) - 1;

/// Branching factor of a C-node.
pub const BRANCH_FACTOR: usize = 1 << LEVEL_BITS;

/// Number of C-node levels a hash of `bits` significant bits can address.
///
/// 64 bits give 13 levels (the last one sees only 4 bits).
#[must_use]
pub const fn level_count(bits: u32) -> u32 {
    bits.div_ceil(LEVEL_BITS)
}

/// Branch index of `hash` at `level`.
#[inline(always)]
#[expect(
    clippy::cast_possible_truncation,
    reason = "masked to LEVEL_BITS bits"
)]
pub(crate) const fn branch_index(hash: u64, level: u32) -> u32 {
    ((hash >> level) & LEVEL_MASK) as u32
}

/// Bitmap flag and physical array position of `hash` at `level`.
#[inline(always)]
pub(crate) const fn flag_pos(hash: u64, level: u32, bitmap: u32) -> (u32, usize) {
    debug_assert!(level < u64::BITS);
    let flag: u32 = 1 << branch_index(hash, level);
    let pos: usize = (bitmap & (flag - 1)).count_ones() as usize;
    (flag, pos)
}

// ============================================================================
//  SNode
// ============================================================================

/// Immutable leaf entry.
///
/// A value update never touches an existing `SNode`; it publishes a new one.
pub(crate) struct SNode<K, V> {
    pub(crate) hash: u64,
    pub(crate) key: K,
    pub(crate) value: Arc<V>,
}

impl<K, V> SNode<K, V> {
    pub(crate) const fn new(hash: u64, key: K, value: Arc<V>) -> Self {
        Self { hash, key, value }
    }

    /// Does this entry hold `key`?
    #[inline(always)]
    pub(crate) fn holds<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.key.borrow() == key
    }
}

// ============================================================================
//  INode
// ============================================================================

/// Indirection node: a single CAS-able slot holding the current main node.
///
/// Never null after construction. The I-node owns its current main node;
/// replaced main nodes are retired through the guard that replaced them.
pub(crate) struct INode<K, V> {
    main: AtomicPtr<MainNode<K, V>>,
    _owns: PhantomData<Box<MainNode<K, V>>>,
}

/// A main node loaded from an I-node, together with the pointer it was
/// loaded from (the expected value of a later CAS).
pub(crate) struct MainRef<'g, K, V> {
    ptr: *mut MainNode<K, V>,
    node: &'g MainNode<K, V>,
}

impl<K, V> Clone for MainRef<'_, K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for MainRef<'_, K, V> {}

impl<'g, K, V> MainRef<'g, K, V> {
    #[inline(always)]
    pub(crate) const fn node(self) -> &'g MainNode<K, V> {
        self.node
    }
}

impl<K, V> INode<K, V> {
    pub(crate) fn new(main: MainNode<K, V>) -> Self {
        Self {
            main: AtomicPtr::new(Box::into_raw(Box::new(main))),
            _owns: PhantomData,
        }
    }

    /// Load the current main node.
    ///
    /// This single protected load is the linearization point of every read
    /// that stops at this I-node.
    #[inline(always)]
    pub(crate) fn load<'g, G: Guard>(&self, guard: &'g G) -> MainRef<'g, K, V> {
        let ptr: *mut MainNode<K, V> = guard.protect(&self.main, READ_ORD);

        // SAFETY: `main` is never null, and the guard keeps the loaded main
        // node alive until it is dropped even if it is retired meanwhile.
        MainRef {
            ptr,
            node: unsafe { &*ptr },
        }
    }

    /// Swing this I-node from `current` to `new`.
    ///
    /// On success the replaced main node is retired through `guard`. On
    /// failure `new` was never visible to anyone and is dropped here.
    pub(crate) fn cas<G: Guard>(
        &self,
        current: MainRef<'_, K, V>,
        new: MainNode<K, V>,
        guard: &G,
    ) -> bool {
        let new_ptr: *mut MainNode<K, V> = Box::into_raw(Box::new(new));

        match self
            .main
            .compare_exchange(current.ptr, new_ptr, CAS_SUCCESS, CAS_FAILURE)
        {
            Ok(old) => {
                // SAFETY: `old` is unreachable from this I-node now; readers
                // that loaded it are protected by their own guards.
                unsafe { guard.defer_retire(old, reclaim_main_node::<K, V>) };
                true
            }

            Err(_) => {
                // SAFETY: `new_ptr` came from `Box::into_raw` above and the
                // failed CAS never published it.
                drop(unsafe { Box::from_raw(new_ptr) });
                false
            }
        }
    }
}

impl<K, V> Drop for INode<K, V> {
    fn drop(&mut self) {
        // The last owner is gone, so nobody can load `main` any more.
        let ptr: *mut MainNode<K, V> = *self.main.get_mut();

        // SAFETY: `main` always holds a pointer from `Box::into_raw`.
        drop(unsafe { Box::from_raw(ptr) });
    }
}

// ============================================================================
//  MainNode
// ============================================================================

/// What an I-node currently points to.
pub(crate) enum MainNode<K, V> {
    /// Bitmap-compressed branch array for one level.
    Branching(CNode<K, V>),

    /// Sole survivor of a removal, waiting for the parent to absorb it.
    Tomb(TNode<K, V>),

    /// Entries whose hashes agree on every significant bit.
    List(LNode<K, V>),
}

impl<K, V> MainNode<K, V> {
    /// Main node of a fresh root: an empty C-node.
    pub(crate) fn empty_root() -> Self {
        Self::Branching(CNode::empty())
    }

    /// Main node holding two entries whose hashes agree below `level`.
    ///
    /// Builds one C-node per level while their slices agree, then splits
    /// them into sibling leaves. When the hash runs out (`level >= max_level`)
    /// the pair goes into a list node.
    pub(crate) fn dual(
        x: Arc<SNode<K, V>>,
        y: Arc<SNode<K, V>>,
        level: u32,
        max_level: u32,
    ) -> Self {
        if level >= max_level {
            return Self::List(LNode::pair(x, y));
        }

        let x_index: u32 = branch_index(x.hash, level);
        let y_index: u32 = branch_index(y.hash, level);
        let bitmap: u32 = (1 << x_index) | (1 << y_index);

        let branches: Vec<Branch<K, V>> = match x_index.cmp(&y_index) {
            std::cmp::Ordering::Equal => {
                let child = INode::new(Self::dual(x, y, level + LEVEL_BITS, max_level));
                vec![Branch::Indirect(Arc::new(child))]
            }
            std::cmp::Ordering::Less => vec![Branch::Leaf(x), Branch::Leaf(y)],
            std::cmp::Ordering::Greater => vec![Branch::Leaf(y), Branch::Leaf(x)],
        };

        Self::Branching(CNode::from_parts(bitmap, branches))
    }

    #[inline(always)]
    pub(crate) const fn is_tomb(&self) -> bool {
        matches!(self, Self::Tomb(_))
    }
}

// ============================================================================
//  Branch
// ============================================================================

/// One occupied slot of a C-node.
pub(crate) enum Branch<K, V> {
    Indirect(Arc<INode<K, V>>),
    Leaf(Arc<SNode<K, V>>),
}

impl<K, V> Clone for Branch<K, V> {
    fn clone(&self) -> Self {
        match self {
            Self::Indirect(inode) => Self::Indirect(Arc::clone(inode)),
            Self::Leaf(leaf) => Self::Leaf(Arc::clone(leaf)),
        }
    }
}

// ============================================================================
//  CNode
// ============================================================================

/// Bitmap-compressed branch array.
///
/// Invariant: `bitmap.count_ones() == branches.len()`, and `branches[i]`
/// belongs to the i-th set bit of `bitmap`.
pub(crate) struct CNode<K, V> {
    bitmap: u32,
    branches: Box<[Branch<K, V>]>,
}

impl<K, V> CNode<K, V> {
    pub(crate) fn empty() -> Self {
        Self::from_parts(0, Vec::new())
    }

    fn from_parts(bitmap: u32, branches: Vec<Branch<K, V>>) -> Self {
        debug_assert_eq!(bitmap.count_ones() as usize, branches.len());
        Self {
            bitmap,
            branches: branches.into_boxed_slice(),
        }
    }

    #[inline(always)]
    pub(crate) const fn bitmap(&self) -> u32 {
        self.bitmap
    }

    #[inline(always)]
    pub(crate) fn branches(&self) -> &[Branch<K, V>] {
        &self.branches
    }

    #[inline(always)]
    pub(crate) fn branch(&self, pos: usize) -> &Branch<K, V> {
        &self.branches[pos]
    }

    /// Copy with `branch` added at `pos` and `flag` set.
    pub(crate) fn inserted(&self, pos: usize, flag: u32, branch: Branch<K, V>) -> Self {
        let mut branches: Vec<Branch<K, V>> = Vec::with_capacity(self.branches.len() + 1);
        branches.extend_from_slice(&self.branches[..pos]);
        branches.push(branch);
        branches.extend_from_slice(&self.branches[pos..]);

        Self::from_parts(self.bitmap | flag, branches)
    }

    /// Copy with the branch at `pos` replaced.
    pub(crate) fn updated(&self, pos: usize, branch: Branch<K, V>) -> Self {
        let mut branches: Vec<Branch<K, V>> = self.branches.to_vec();
        branches[pos] = branch;

        Self::from_parts(self.bitmap, branches)
    }

    /// Copy with the branch at `pos` dropped and `flag` cleared.
    pub(crate) fn removed(&self, pos: usize, flag: u32) -> Self {
        let mut branches: Vec<Branch<K, V>> = Vec::with_capacity(self.branches.len() - 1);
        branches.extend_from_slice(&self.branches[..pos]);
        branches.extend_from_slice(&self.branches[pos + 1..]);

        Self::from_parts(self.bitmap & !flag, branches)
    }

    /// Wrap as a main node, entombing a lone leaf below the root.
    ///
    /// A non-root C-node whose only branch is a leaf becomes a T-node, so
    /// depth tracks the number of distinct keys rather than the hash width.
    pub(crate) fn contracted(self, level: u32) -> MainNode<K, V> {
        if level > 0 && self.branches.len() == 1 {
            if let Branch::Leaf(leaf) = &self.branches[0] {
                return MainNode::Tomb(TNode::new(Arc::clone(leaf)));
            }
        }

        MainNode::Branching(self)
    }

    /// Copy with every tombed child I-node replaced by its leaf, then contracted.
    pub(crate) fn compressed<G: Guard>(&self, level: u32, guard: &G) -> MainNode<K, V> {
        let branches: Vec<Branch<K, V>> = self
            .branches
            .iter()
            .map(|branch| match branch {
                Branch::Indirect(inode) => resurrect(inode, inode.load(guard).node()),
                Branch::Leaf(_) => branch.clone(),
            })
            .collect();

        Self::from_parts(self.bitmap, branches).contracted(level)
    }
}

/// The branch a parent should hold for `inode` given its main node `main`.
fn resurrect<K, V>(inode: &Arc<INode<K, V>>, main: &MainNode<K, V>) -> Branch<K, V> {
    match main {
        MainNode::Tomb(tomb) => Branch::Leaf(Arc::clone(tomb.leaf())),
        MainNode::Branching(_) | MainNode::List(_) => Branch::Indirect(Arc::clone(inode)),
    }
}

// ============================================================================
//  TNode
// ============================================================================

/// Tombstone wrapping the single entry left in a subtree.
///
/// An I-node holding a T-node is dead: no operation CASes it again. The
/// next operation that passes through it cleans its parent first.
pub(crate) struct TNode<K, V> {
    leaf: Arc<SNode<K, V>>,
}

impl<K, V> TNode<K, V> {
    pub(crate) const fn new(leaf: Arc<SNode<K, V>>) -> Self {
        Self { leaf }
    }

    #[inline(always)]
    pub(crate) const fn leaf(&self) -> &Arc<SNode<K, V>> {
        &self.leaf
    }
}

// ============================================================================
//  LNode
// ============================================================================

/// Immutable list of entries whose hashes are equal on every significant bit.
pub(crate) struct LNode<K, V> {
    entries: Box<[Arc<SNode<K, V>>]>,
}

impl<K, V> LNode<K, V> {
    fn pair(x: Arc<SNode<K, V>>, y: Arc<SNode<K, V>>) -> Self {
        Self {
            entries: Box::new([x, y]),
        }
    }

    #[inline(always)]
    pub(crate) fn entries(&self) -> &[Arc<SNode<K, V>>] {
        &self.entries
    }

    /// Linear scan for `key`.
    pub(crate) fn lookup<Q>(&self, key: &Q) -> Option<&Arc<SNode<K, V>>>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        self.entries.iter().find(|entry| entry.holds(key))
    }

    /// Copy with `leaf` added, replacing an entry with an equal key.
    ///
    /// Returns the new list and the replaced entry's value, if any.
    pub(crate) fn inserted(&self, leaf: &Arc<SNode<K, V>>) -> (Self, Option<Arc<V>>)
    where
        K: Eq,
    {
        let existing: Option<usize> = self.entries.iter().position(|e| e.key == leaf.key);

        match existing {
            Some(pos) => {
                let old: Arc<V> = Arc::clone(&self.entries[pos].value);
                let mut entries: Vec<Arc<SNode<K, V>>> = self.entries.to_vec();
                entries[pos] = Arc::clone(leaf);

                (
                    Self {
                        entries: entries.into_boxed_slice(),
                    },
                    Some(old),
                )
            }

            None => {
                let mut entries: Vec<Arc<SNode<K, V>>> = Vec::with_capacity(self.entries.len() + 1);
                entries.push(Arc::clone(leaf));
                entries.extend_from_slice(&self.entries);

                (
                    Self {
                        entries: entries.into_boxed_slice(),
                    },
                    None,
                )
            }
        }
    }

    /// Main node left after removing `key`, and the removed entry.
    ///
    /// `None` if `key` is absent. A single survivor is entombed.
    pub(crate) fn removed<Q>(&self, key: &Q) -> Option<(MainNode<K, V>, Arc<SNode<K, V>>)>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let pos: usize = self.entries.iter().position(|e| e.holds(key))?;
        let removed: Arc<SNode<K, V>> = Arc::clone(&self.entries[pos]);

        let rest: Vec<Arc<SNode<K, V>>> = self
            .entries
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != pos)
            .map(|(_, e)| Arc::clone(e))
            .collect();

        let main: MainNode<K, V> = match rest.as_slice() {
            [] => fatal(InvariantViolation::EmptyList),
            [survivor] => MainNode::Tomb(TNode::new(Arc::clone(survivor))),
            _ => MainNode::List(Self {
                entries: rest.into_boxed_slice(),
            }),
        };

        Some((main, removed))
    }
}
