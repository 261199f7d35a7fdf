//! Shared fixtures for the integration tests: tracing setup, hash functions
//! that force particular trie shapes, and key/verification helpers.
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//!
//! #[test]
//! fn my_test() {
//!     common::init_tracing();
//!     let trie = ctrie::Ctrie::with_hasher(common::identity_hash);
//!     // ...
//! }
//! ```
//!
//! # Configuration
//!
//! Environment variables:
//! - `RUST_LOG`: Filter directives (e.g., `ctrie=debug,ctrie::ctrie::clean=trace`)
//! - `CTRIE_LOG_DIR`: Log directory (default: `logs/`)
//! - `CTRIE_LOG_CONSOLE`: Set to "0" to disable console output
//! - `CTRIE_STRESS_THREADS`: Thread count for stress tests (default: 8)
//!
//! The trie only emits events when built with `--features tracing`.
//!
//! # Log Files
//!
//! Logs are written to `logs/ctrie.jsonl` as newline-delimited JSON (NDJSON).
//! Use `jq` for pretty-printing and filtering:
//!
//! ```bash
//! # Pretty-print all logs
//! cat logs/ctrie.jsonl | jq .
//!
//! # CAS restarts only
//! cat logs/ctrie.jsonl | jq 'select(.fields.message | endswith("restart"))'
//!
//! # Show only errors
//! cat logs/ctrie.jsonl | jq 'select(.level == "ERROR")'
//! ```

#![allow(dead_code)]

use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Once;

use ctrie::{Ctrie, HashFunction};
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

// ============================================================================
//  Tracing
// ============================================================================

/// Ensures tracing is only initialized once per test binary.
static INIT: Once = Once::new();

/// Initialize the tracing subscriber with file and console logging.
///
/// Safe to call multiple times - only the first call takes effect.
pub fn init_tracing() {
    INIT.call_once(|| {
        setup_tracing();
    });
}

/// Configuration for tracing setup.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Directory for log files.
    pub log_dir: PathBuf,
    /// Log file name.
    pub log_file: String,
    /// Enable console output.
    pub console_enabled: bool,
    /// Default log level if RUST_LOG is not set.
    pub default_level: Level,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            log_file: "ctrie.jsonl".to_string(),
            console_enabled: true,
            default_level: Level::INFO,
        }
    }
}

impl TracingConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = env::var("CTRIE_LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }

        if env::var("CTRIE_LOG_CONSOLE").is_ok_and(|v| v == "0") {
            config.console_enabled = false;
        }

        config
    }
}

fn make_filter(default_level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("{default_level}")))
}

#[expect(clippy::expect_used)]
fn setup_tracing() {
    let config = TracingConfig::from_env();

    std::fs::create_dir_all(&config.log_dir).expect("Failed to create log directory");
    let log_path = config.log_dir.join(&config.log_file);

    // Append: nextest runs each test in its own process.
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .expect("Failed to open log file");

    let console_layer = config.console_enabled.then(|| {
        tracing_subscriber::fmt::layer()
            .with_thread_ids(true)
            .with_target(true)
            .with_line_number(true)
            .with_span_events(FmtSpan::CLOSE)
            .compact()
            .with_filter(make_filter(config.default_level))
    });

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::sync::Mutex::new(file))
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .json()
        .with_filter(make_filter(config.default_level));

    let _ = Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

// ============================================================================
//  Hash functions that shape the trie
// ============================================================================

/// Keys are their own hash: key bits pick the slot at every level.
pub fn identity_hash(key: &u64) -> u64 {
    *key
}

/// Every key collides on every bit: everything ends up in list nodes.
pub fn constant_hash(_: &u64) -> u64 {
    0x5eed
}

/// Keys collide in groups of `GROUP` on the full hash.
pub fn grouped_hash(key: &u64) -> u64 {
    const GROUP: u64 = 4;
    (key / GROUP).wrapping_mul(0x9e37_79b9_7f4a_7c15)
}

// ============================================================================
//  Keys and verification
// ============================================================================

/// Thread count for stress tests.
pub fn stress_threads() -> usize {
    env::var("CTRIE_STRESS_THREADS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8)
}

/// Spread sequential indices over the key space.
pub fn scatter(i: u64) -> u64 {
    i.wrapping_mul(0x517c_c1b7_2722_0a95).rotate_left(23)
}

/// Keys from `keys` that do not map to `value_of(key)`.
pub fn missing_keys<H, I, F>(trie: &Ctrie<u64, u64, H>, keys: I, value_of: F) -> Vec<u64>
where
    H: HashFunction<u64>,
    I: IntoIterator<Item = u64>,
    F: Fn(u64) -> u64,
{
    let guard = trie.guard();
    keys.into_iter()
        .filter(|key| trie.lookup_with_guard(key, &guard).as_deref() != Some(&value_of(*key)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_init() {
        init_tracing();
        tracing::info!("Tracing initialized successfully");
        tracing::debug!(key = 42u64, level = 5u32, "Debug event");
    }

    #[test]
    fn test_grouped_hash_collides_in_groups() {
        assert_eq!(grouped_hash(&0), grouped_hash(&3));
        assert_ne!(grouped_hash(&3), grouped_hash(&4));
    }
}
