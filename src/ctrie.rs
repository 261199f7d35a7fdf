//! `Ctrie` - the public handle of the concurrent hash trie.
//!
//! The handle owns the seize [`Collector`], the hash function and an atomic
//! pointer to the root I-node. The operation layer lives in submodules:
//!
//! - [`insert`](Ctrie::insert), [`lookup`](Ctrie::lookup),
//!   [`remove`](Ctrie::remove) - descend from the root and CAS one I-node,
//! - lazy tombstone cleanup shared by all three,
//! - [`iter`](Ctrie::iter) - weakly consistent traversal.
//!
//! Every mutating attempt is all-or-nothing: it builds one new main node,
//! tries one CAS, and on failure throws the candidate away and restarts from
//! the root.

use std::fmt as StdFmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicIsize, AtomicPtr};

use seize::{Collector, Guard, LocalGuard};

use crate::hash::{BuildHasherFn, HASH_BITS, HashFunction};
use crate::node::{INode, MainNode};
use crate::ordering::{CAS_SUCCESS, READ_ORD, RELAXED};
use crate::reclaim::reclaim_root;
use crate::stats::{Stats, StatsSnapshot};
use crate::tracing_helpers::{debug_log, warn_log};

mod clean;
mod insert;
mod iter;
mod lookup;
mod remove;



pub use iter::{Iter, Keys, Values};

/// Restarts after which a single operation starts warning about contention.
const CONTENTION_WARN_RETRIES: usize = 1024;

/// Outcome of one descent from the root.
pub(crate) enum Attempt<T> {
    /// The operation reached its linearization point.
    Done(T),
    /// A CAS was lost or a tombstone was met; start over from the root.
    Restart,
}

/// Root I-node together with the number of keys reachable from it.
///
/// `clear` swaps the whole box, so an operation that started in the old
/// tree also counts against the old tree.
pub(crate) struct Root<K, V> {
    inode: INode<K, V>,

    /// Keys added minus keys removed. May dip below zero while a removal
    /// overtakes the count update of the insert it undid.
    count: AtomicIsize,
}

impl<K, V> Root<K, V> {
    pub(crate) fn new(main: MainNode<K, V>) -> Self {
        Self {
            inode: INode::new(main),
            count: AtomicIsize::new(0),
        }
    }

    #[inline(always)]
    pub(crate) const fn inode(&self) -> &INode<K, V> {
        &self.inode
    }

    #[inline(always)]
    pub(crate) fn inc_count(&self) {
        self.count.fetch_add(1, RELAXED);
    }

    #[inline(always)]
    pub(crate) fn dec_count(&self) {
        self.count.fetch_sub(1, RELAXED);
    }

    #[inline(always)]
    fn len(&self) -> usize {
        usize::try_from(self.count.load(RELAXED)).unwrap_or(0)
    }
}

/// A lock-free concurrent hash trie.
///
/// Keys are placed by successive 5-bit slices of their hash; every update is
/// a single compare-and-swap on one indirection node, so any number of
/// threads can insert, look up and remove at once without blocking.
///
/// Values are stored as `Arc<V>`. Lookups, overwrites and removals hand back
/// a clone of that `Arc`, so `V` needs neither `Clone` nor `Copy`.
///
/// # Type Parameters
///
/// - `K` - key type; equality must agree with the hash function
/// - `V` - value type
/// - `H` - hash function (defaults to [`BuildHasherFn`] over `RandomState`)
///
/// # Example
///
/// ```rust
/// use ctrie::Ctrie;
///
/// let trie: Ctrie<String, u64> = Ctrie::new();
/// trie.insert("foo".to_string(), 1);
///
/// assert_eq!(trie.lookup("foo").as_deref(), Some(&1));
/// assert_eq!(trie.remove("foo").as_deref(), Some(&1));
/// assert!(trie.lookup("foo").is_none());
/// ```
pub struct Ctrie<K, V, H = BuildHasherFn> {
    /// Memory reclamation collector for safe concurrent access.
    collector: Collector,

    /// Root I-node and key count. Replaced only by [`clear`](Self::clear).
    root: AtomicPtr<Root<K, V>>,

    hasher: H,

    /// First level (in bits) that no longer has a hash slice of its own.
    max_level: u32,

    stats: Stats,

    /// Marker so `Send`/`Sync` follow the nodes the trie owns.
    _marker: PhantomData<Box<Root<K, V>>>,
}

impl<K, V> Ctrie<K, V, BuildHasherFn>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Create an empty trie hashing keys with a randomly seeded std hasher.
    #[must_use]
    pub fn new() -> Self {
        Self::with_hasher(BuildHasherFn::default())
    }
}

impl<K, V> Default for Ctrie<K, V, BuildHasherFn>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, H> Ctrie<K, V, H>
where
    K: Eq + Send + Sync + 'static,
    V: Send + Sync + 'static,
    H: HashFunction<K>,
{
    /// Create an empty trie using `hasher`.
    ///
    /// `hasher` may be any [`HashFunction`], including a plain closure:
    ///
    /// ```rust
    /// use ctrie::Ctrie;
    ///
    /// let trie = Ctrie::with_hasher(|k: &u64| k.rotate_left(17));
    /// trie.insert(3u64, "three");
    /// assert_eq!(trie.lookup(&3).as_deref(), Some(&"three"));
    /// ```
    ///
    /// The trie's depth is sized to `hasher.bits()`: one C-node level per
    /// 5-bit slice, then list nodes for keys that still collide.
    #[must_use]
    pub fn with_hasher(hasher: H) -> Self {
        let max_level: u32 = <H as HashFunction<K>>::bits(&hasher).clamp(1, HASH_BITS);
        let root: Box<Root<K, V>> = Box::new(Root::new(MainNode::empty_root()));

        Self {
            collector: Collector::new(),
            root: AtomicPtr::new(Box::into_raw(root)),
            hasher,
            max_level,
            stats: Stats::default(),
            _marker: PhantomData,
        }
    }
}

impl<K, V, F> Ctrie<K, V, F>
where
    K: Eq + Send + Sync + 'static,
    V: Send + Sync + 'static,
    F: Fn(&K) -> u64 + Send + Sync,
{
    /// Create an empty trie hashing keys with a plain function.
    ///
    /// Same as [`with_hasher`](Self::with_hasher), but pins the closure's
    /// argument type so literals in its body infer as `u64`.
    #[must_use]
    pub fn with_hash_fn(hash: F) -> Self {
        Self::with_hasher(hash)
    }
}

impl<K, V, H> Ctrie<K, V, H> {
    /// Enter a protected region and return a guard.
    ///
    /// The guard protects every node loaded during its lifetime from being
    /// reclaimed. Pass it to the `*_with_guard` methods to amortize its cost
    /// over several operations.
    ///
    /// Guards are tied to the trie that created them: the `*_with_guard`
    /// methods and [`iter`](Self::iter) panic when handed a guard from a
    /// different trie.
    #[must_use]
    #[inline(always)]
    pub fn guard(&self) -> LocalGuard<'_> {
        self.collector.enter()
    }

    /// Number of keys in the trie.
    ///
    /// Updated at each insert of a new key and each successful removal, so
    /// it is exact whenever no operation is in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        let guard = self.guard();
        self.root(&guard).len()
    }

    /// Check if the trie holds no keys.
    #[must_use]
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the trie's operation counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Reference to the trie's hash function.
    #[must_use]
    pub const fn hasher(&self) -> &H {
        &self.hasher
    }

    /// Remove every entry by installing a fresh, empty root.
    ///
    /// The old tree is retired as a whole, together with its key count, and
    /// reclaimed once no guard can still see it. Writers racing with `clear`
    /// may land in the old tree, in which case their effect is discarded
    /// with it and [`len`](Self::len) never sees it.
    pub fn clear(&self) {
        let guard = self.guard();
        let fresh: *mut Root<K, V> = Box::into_raw(Box::new(Root::new(MainNode::empty_root())));
        let old: *mut Root<K, V> = self.root.swap(fresh, CAS_SUCCESS);

        debug_log!("clear: root replaced");

        // SAFETY: `old` came from Box::into_raw and is no longer reachable
        // from the root slot; guards that loaded it keep it alive.
        unsafe { guard.defer_retire(old, reclaim_root::<K, V>) };
    }

    /// Panic unless `guard` was entered on this trie's collector.
    ///
    /// A guard from another collector does not hold back reclamation here,
    /// so every node loaded under it could be freed while still borrowed.
    #[inline(always)]
    pub(crate) fn verify_guard<G: Guard>(&self, guard: &G) {
        assert!(
            guard.collector() == &self.collector,
            "guard belongs to a different trie"
        );
    }

    /// Load the root.
    #[inline(always)]
    pub(crate) fn root<'g, G: Guard>(&self, guard: &'g G) -> &'g Root<K, V> {
        let ptr: *mut Root<K, V> = guard.protect(&self.root, READ_ORD);

        // SAFETY: the root slot is never null, and the guard keeps a root
        // swapped out by `clear` alive until the guard is dropped.
        unsafe { &*ptr }
    }

    #[inline(always)]
    pub(crate) const fn max_level(&self) -> u32 {
        self.max_level
    }

    #[inline(always)]
    pub(crate) const fn counters(&self) -> &Stats {
        &self.stats
    }

    /// Record a restart and spin briefly before the next attempt.
    #[inline(always)]
    pub(crate) fn backoff(&self, retries: usize) {
        self.stats.record_restart();

        if retries == CONTENTION_WARN_RETRIES {
            warn_log!(retries, "operation keeps losing CAS races");
        }

        let spins: usize = 1usize << retries.min(6);
        for _ in 0..spins {
            std::hint::spin_loop();
        }
    }
}

impl<K, V, H> Drop for Ctrie<K, V, H> {
    fn drop(&mut self) {
        // No concurrent access is possible here (Drop requires unique access).
        let root: *mut Root<K, V> = *self.root.get_mut();

        // SAFETY: the root slot always holds a pointer from Box::into_raw.
        drop(unsafe { Box::from_raw(root) });
    }
}

impl<K, V, H> StdFmt::Debug for Ctrie<K, V, H>
where
    K: StdFmt::Debug,
    V: StdFmt::Debug,
{
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        let guard = self.guard();
        f.debug_map().entries(self.iter(&guard)).finish()
    }
}

impl<K, V> FromIterator<(K, V)> for Ctrie<K, V, BuildHasherFn>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let trie = Self::new();
        (&trie).extend(iter);
        trie
    }
}

impl<K, V, H> Extend<(K, V)> for &Ctrie<K, V, H>
where
    K: Eq + Send + Sync + 'static,
    V: Send + Sync + 'static,
    H: HashFunction<K>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        let guard = self.guard();
        for (key, value) in iter {
            self.insert_with_guard(key, value, &guard);
        }
    }
}
