//! # `Ctrie`
//!
//! A lock-free concurrent hash trie.
//!
//! This crate implements the Ctrie of Prokopec et al.:
//! - Hash array mapped trie indexed by successive 5-bit hash slices
//! - Every update is a single CAS on one indirection node (I-node)
//! - Removals contract the trie through tombstones cleaned lazily by any
//!   thread that passes by
//!
//! ## Thread Safety
//!
//! `Ctrie<K, V, H>` is `Send + Sync` when `K`, `V` and `H` are. All
//! operations take `&self`; share the trie through an `Arc` or a scoped
//! thread borrow:
//!
//! ```rust
//! use std::sync::Arc;
//! use std::thread;
//!
//! use ctrie::Ctrie;
//!
//! let trie: Arc<Ctrie<u64, u64>> = Arc::new(Ctrie::new());
//!
//! let handles: Vec<_> = (0..4u64)
//!     .map(|t| {
//!         let trie = Arc::clone(&trie);
//!         thread::spawn(move || {
//!             for i in 0..100 {
//!                 trie.insert(t * 100 + i, i);
//!             }
//!         })
//!     })
//!     .collect();
//!
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//! assert_eq!(trie.len(), 400);
//! ```
//!
//! Each plain method enters the memory-reclamation collector for its own
//! duration. To amortize that over many calls, take a guard once and use the
//! `*_with_guard` variants:
//!
//! ```rust
//! use ctrie::Ctrie;
//!
//! let trie: Ctrie<u64, u64> = Ctrie::new();
//! let guard = trie.guard();
//!
//! trie.insert_with_guard(1, 10, &guard);
//! assert_eq!(trie.lookup_with_guard(&1, &guard).as_deref(), Some(&10));
//! ```
//!
//! A guard only protects the trie that created it; passing it to another
//! trie panics.
//!
//! ## Hashing
//!
//! The trie is generic over a [`HashFunction`]. The default hashes `K: Hash`
//! with a randomly seeded std hasher; any `Fn(&K) -> u64` closure also works,
//! and [`Truncated`] narrows a hash to fewer significant bits. Keys whose
//! hashes agree on every significant bit share a list node at the bottom of
//! the trie.
//!
//! ## Value Storage
//!
//! Values are stored as `Arc<V>`; lookups, overwrites and removals return a
//! clone of that `Arc`.
//!
//! ## Iteration
//!
//! [`Ctrie::iter`] is weakly consistent: it never blocks writers and never
//! yields a key twice, but may or may not observe updates made while it
//! runs.

#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// Hot-path helpers are tiny and called once per level.
#![allow(clippy::inline_always)]

mod ctrie;
mod error;
pub mod hash;
mod node;
mod ordering;
mod reclaim;
mod stats;
mod tracing_helpers;

// Re-export main types for convenience
pub use ctrie::{Ctrie, Iter, Keys, Values};
pub use error::InvariantViolation;
pub use hash::{BuildHasherFn, HASH_BITS, HashFunction, Truncated};
pub use node::{BRANCH_FACTOR, LEVEL_BITS, level_count};
pub use stats::StatsSnapshot;
