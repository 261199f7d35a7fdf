//! Structural invariant violations.
//!
//! The trie has no user-facing error path: a missing key is `None` and CAS
//! races are retried internally. What remains are states that only a logic
//! bug or memory corruption can produce. They are reported through
//! [`fatal`], which logs and panics instead of trying to recover.

use std::fmt as StdFmt;

use crate::tracing_helpers::error_log;

/// A broken structural invariant found during traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantViolation {
    /// The root I-node holds a tombstone.
    ///
    /// Contraction never entombs level 0, so nothing above the root could
    /// ever clean it.
    TombstoneAtRoot,

    /// A list node would be left with no entries.
    ///
    /// List nodes are created holding two colliding entries and are entombed
    /// when one entry remains, so an empty list cannot be reached.
    EmptyList,
}

impl StdFmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        match self {
            Self::TombstoneAtRoot => write!(f, "tombstone found at the root I-node"),

            Self::EmptyList => write!(f, "list node emptied by removal"),
        }
    }
}

impl std::error::Error for InvariantViolation {}

/// Abort on a broken invariant.
#[cold]
#[inline(never)]
#[track_caller]
pub(crate) fn fatal(violation: InvariantViolation) -> ! {
    error_log!(?violation, "ctrie invariant violated");
    panic!("ctrie invariant violated: {violation}");
}
