//! Per-trie operation counters.
//!
//! All counters are relaxed and only meaningful as totals once the trie is
//! quiescent. They cost one uncontended `fetch_add` on the slow paths
//! (restart, cleanup, contraction, level extension) and nothing on the
//! fast paths.

use std::sync::atomic::AtomicU64;

use crate::ordering::RELAXED;

#[derive(Debug, Default)]
pub(crate) struct Stats {
    restarts: AtomicU64,
    cleanups: AtomicU64,
    contractions: AtomicU64,
    expansions: AtomicU64,
}

impl Stats {
    /// An operation lost a CAS (or met a tombstone) and went back to the root.
    #[inline(always)]
    pub(crate) fn record_restart(&self) {
        self.restarts.fetch_add(1, RELAXED);
    }

    /// A cleanup CAS replaced a parent C-node.
    #[inline(always)]
    pub(crate) fn record_cleanup(&self) {
        self.cleanups.fetch_add(1, RELAXED);
    }

    /// A removal entombed the remaining entry of a C-node or list node.
    #[inline(always)]
    pub(crate) fn record_contraction(&self) {
        self.contractions.fetch_add(1, RELAXED);
    }

    /// Two keys shared a slot and the trie grew a level below it.
    #[inline(always)]
    pub(crate) fn record_expansion(&self) {
        self.expansions.fetch_add(1, RELAXED);
    }

    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            restarts: self.restarts.load(RELAXED),
            cleanups: self.cleanups.load(RELAXED),
            contractions: self.contractions.load(RELAXED),
            expansions: self.expansions.load(RELAXED),
        }
    }
}

/// Point-in-time copy of a trie's counters, see [`Ctrie::stats`](crate::Ctrie::stats).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Operations restarted from the root after a lost CAS or a tombstone.
    pub restarts: u64,
    /// Successful cleanup CASes on a parent C-node.
    pub cleanups: u64,
    /// Removals that left a single entry behind and entombed it.
    pub contractions: u64,
    /// Inserts that pushed a colliding leaf pair one or more levels down.
    pub expansions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_records() {
        let stats = Stats::default();

        stats.record_restart();
        stats.record_restart();
        stats.record_cleanup();
        stats.record_contraction();
        stats.record_expansion();

        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                restarts: 2,
                cleanups: 1,
                contractions: 1,
                expansions: 1,
            }
        );
    }

    #[test]
    fn test_default_is_zero() {
        assert_eq!(Stats::default().snapshot(), StatsSnapshot::default());
    }
}
