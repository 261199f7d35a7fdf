//! Standard memory orderings for I-node and root access.
//!
//! Every atomic touch of the trie goes through one of these so the pairing
//! between publishers and readers is visible at each access point.

use std::sync::atomic::Ordering;

/// Ordering for loading an I-node's main node or the root I-node.
/// Pairs with the Release half of a successful CAS.
pub(crate) const READ_ORD: Ordering = Ordering::Acquire;

/// Ordering for CAS success on an I-node or the root.
/// Publishes the freshly built main node to every later reader.
pub(crate) const CAS_SUCCESS: Ordering = Ordering::AcqRel;

/// Ordering for CAS failure.
/// Only need to see the current value before restarting.
pub(crate) const CAS_FAILURE: Ordering = Ordering::Acquire;

/// Ordering for statistics and the approximate entry count.
pub(crate) const RELAXED: Ordering = Ordering::Relaxed;
