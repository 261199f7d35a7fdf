//! Stress driver for concurrent `Ctrie` workloads.
//!
//! Runs a disjoint-insert phase and a mixed high-contention phase, with a
//! watchdog that reports threads making no progress (a lock-free trie must
//! never hang), then prints throughput and the trie's counters.
//!
//! Run with:
//! ```bash
//! CTRIE_THREADS=8 CTRIE_KEYS=100000 cargo run --release
//! RUST_LOG=ctrie=debug cargo run --features tracing
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]

use std::env;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use ctrie::Ctrie;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const DEFAULT_THREADS: usize = 4;
const DEFAULT_KEYS: usize = 50_000;
const STALL_TIMEOUT_MS: u64 = 2_000;

// =============================================================================
// Configuration
// =============================================================================

/// Driver settings, read from `CTRIE_THREADS` and `CTRIE_KEYS`.
#[derive(Debug, Clone, Copy)]
struct DriverConfig {
    threads: usize,
    keys: usize,
}

impl DriverConfig {
    fn from_env() -> Self {
        Self {
            threads: env_usize("CTRIE_THREADS").unwrap_or(DEFAULT_THREADS).max(1),
            keys: env_usize("CTRIE_KEYS").unwrap_or(DEFAULT_KEYS).max(1),
        }
    }
}

fn env_usize(name: &str) -> Option<usize> {
    let raw = env::var(name).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(e) => {
            eprintln!("ignoring {name}={raw:?}: {e}");
            None
        }
    }
}

#[cfg(feature = "tracing")]
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_thread_ids(true)
        .try_init();
}

#[cfg(not(feature = "tracing"))]
const fn init_tracing() {}

// =============================================================================
// Thread progress tracking for hang detection
// =============================================================================

struct ThreadProgress {
    /// Current operation index for each thread
    current_op: Vec<AtomicUsize>,
    /// Last time each thread made progress
    last_progress_ms: Vec<AtomicU64>,
    /// Whether each thread is done
    done: Vec<AtomicBool>,
    start: Instant,
}

impl ThreadProgress {
    fn new(num_threads: usize) -> Self {
        Self {
            current_op: (0..num_threads).map(|_| AtomicUsize::new(0)).collect(),
            last_progress_ms: (0..num_threads).map(|_| AtomicU64::new(0)).collect(),
            done: (0..num_threads).map(|_| AtomicBool::new(false)).collect(),
            start: Instant::now(),
        }
    }

    fn update(&self, thread_id: usize, op: usize) {
        self.current_op[thread_id].store(op, Ordering::Relaxed);
        let now_ms: u64 = self.start.elapsed().as_millis() as u64;
        self.last_progress_ms[thread_id].store(now_ms, Ordering::Relaxed);
    }

    fn mark_done(&self, thread_id: usize) {
        self.done[thread_id].store(true, Ordering::Relaxed);
    }

    fn report_stuck(&self, timeout_ms: u64) -> Vec<(usize, usize, u64)> {
        let now_ms = self.start.elapsed().as_millis() as u64;

        (0..self.done.len())
            .filter(|&i| !self.done[i].load(Ordering::Relaxed))
            .filter_map(|i| {
                let last = self.last_progress_ms[i].load(Ordering::Relaxed);
                (now_ms.saturating_sub(last) > timeout_ms)
                    .then(|| (i, self.current_op[i].load(Ordering::Relaxed), now_ms - last))
            })
            .collect()
    }

    fn all_done(&self) -> bool {
        self.done.iter().all(|d| d.load(Ordering::Relaxed))
    }
}

/// Run `work` on `threads` threads under a stall watchdog.
fn run_watched<F>(threads: usize, work: F)
where
    F: Fn(usize, &ThreadProgress) + Send + Sync + 'static,
{
    let progress = Arc::new(ThreadProgress::new(threads));
    let work = Arc::new(work);
    let stop = Arc::new(AtomicBool::new(false));

    let watchdog = {
        let progress = Arc::clone(&progress);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(500));
                for (tid, op, stall_ms) in progress.report_stuck(STALL_TIMEOUT_MS) {
                    eprintln!("!!! STUCK: Thread {tid} at op {op} for {stall_ms}ms");
                }
                if progress.all_done() {
                    break;
                }
            }
        })
    };

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let progress = Arc::clone(&progress);
            let work = Arc::clone(&work);
            thread::spawn(move || {
                work(t, &progress);
                progress.mark_done(t);
            })
        })
        .collect();

    for h in handles {
        if h.join().is_err() {
            eprintln!("worker panicked");
        }
    }

    stop.store(true, Ordering::Relaxed);
    let _ = watchdog.join();
}

// =============================================================================
// Phase 1: Disjoint inserts
// =============================================================================

fn run_disjoint_inserts(trie: &Arc<Ctrie<u64, u64>>, config: DriverConfig) {
    let DriverConfig { threads, keys } = config;
    println!("\n{}", "=".repeat(80));
    println!("DISJOINT INSERTS ({threads} threads, {keys} keys/thread)");
    println!("{}", "=".repeat(80));

    let start = Instant::now();
    let shared = Arc::clone(trie);
    run_watched(threads, move |t, progress| {
        let guard = shared.guard();
        let base = (t * keys) as u64;

        for i in 0..keys {
            progress.update(t, i);
            let key = base + i as u64;
            shared.insert_with_guard(key, key, &guard);
        }
    });

    let elapsed = start.elapsed();
    let total = threads * keys;
    println!(
        "DONE: {total} inserts in {elapsed:?} ({:.0} ops/sec), len={}",
        total as f64 / elapsed.as_secs_f64(),
        trie.len()
    );

    if trie.len() != total {
        eprintln!("!!! expected {total} keys, found {}", trie.len());
    }

    // Round trip from a single thread after the barrier.
    let guard = trie.guard();
    let missing = (0..total as u64)
        .filter(|key| trie.lookup_with_guard(key, &guard).as_deref() != Some(key))
        .count();
    if missing > 0 {
        eprintln!("!!! {missing} keys missing or wrong after disjoint inserts");
    }
}

// =============================================================================
// Phase 2: Mixed operations on a shared key range
// =============================================================================

fn run_contention_mix(trie: &Arc<Ctrie<u64, u64>>, config: DriverConfig) {
    let DriverConfig { threads, keys } = config;
    let key_space = (keys / 10).max(16) as u64;
    println!("\n{}", "=".repeat(80));
    println!("CONTENTION MIX ({threads} threads, {keys} ops/thread, {key_space} keys)");
    println!("{}", "=".repeat(80));

    let start = Instant::now();
    let shared = Arc::clone(trie);
    run_watched(threads, move |t, progress| {
        let mut state: u64 = 0x9e37_79b9_7f4a_7c15 ^ t as u64;

        for i in 0..keys {
            progress.update(t, i);

            // xorshift64
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;

            let key = state % key_space;
            match state >> 62 {
                0 => {
                    shared.remove(&key);
                }
                1 => {
                    shared.insert(key, state);
                }
                _ => {
                    let _ = shared.lookup(&key);
                }
            }
        }
    });

    let elapsed = start.elapsed();
    let total = threads * keys;
    println!(
        "DONE: {total} ops in {elapsed:?} ({:.0} ops/sec), len={}",
        total as f64 / elapsed.as_secs_f64(),
        trie.len()
    );

    let guard = trie.guard();
    let visible = trie.iter(&guard).count();
    if visible != trie.len() {
        eprintln!("!!! len()={} but iteration saw {visible}", trie.len());
    }
}

fn main() {
    init_tracing();
    let config = DriverConfig::from_env();

    eprintln!("Ctrie Concurrent Stress Driver");
    eprintln!("==============================");
    eprintln!("Watchdog will report any thread stuck for >{}s.", STALL_TIMEOUT_MS / 1_000);

    let trie: Arc<Ctrie<u64, u64>> = Arc::new(Ctrie::new());
    run_disjoint_inserts(&trie, config);

    trie.clear();
    run_contention_mix(&trie, config);

    let stats = trie.stats();
    println!("\nstats: {stats:?}");
}
