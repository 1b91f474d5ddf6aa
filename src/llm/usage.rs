/*!
 * Usage metering for orchestrated API calls.
 *
 * Counts calls per metered function and per originating pipeline stage, and
 * persists the counters to a JSON document on a time-debounced schedule. The
 * debounce keeps a hot dispatch loop from rewriting the file on every call;
 * a forced flush on drop bounds the loss window to `save_interval` on normal
 * termination.
 */

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use log::{debug, error, warn};

/// Per-function call counters
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FunctionUsage {
    /// Calls recorded for this function across all origins
    pub total_calls: u64,

    /// Calls broken down by originating pipeline stage
    pub by_module: BTreeMap<String, u64>,
}

/// Aggregated view of the recorded usage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageSnapshot {
    /// Calls recorded across all functions
    pub total_calls: u64,

    /// Per-function totals
    pub by_function: BTreeMap<String, u64>,

    /// Per-origin totals summed across functions
    pub by_module: BTreeMap<String, u64>,
}

impl UsageSnapshot {
    /// Render a formatted usage report for end-of-run diagnostics
    pub fn report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "API Usage Statistics:");
        let _ = writeln!(out, "{}", "-".repeat(50));
        let _ = writeln!(out, "Total API calls: {}", self.total_calls);
        let _ = writeln!(out, "\nCalls by Function:");
        for (function, count) in &self.by_function {
            let _ = writeln!(out, "  {}: {}", function, count);
        }
        let _ = writeln!(out, "\nCalls by Module:");
        for (module, count) in &self.by_module {
            let _ = writeln!(out, "  {}: {}", module, count);
        }
        out
    }
}

struct MeterState {
    counters: BTreeMap<String, FunctionUsage>,
    modified: bool,
    last_save: Instant,
}

/// Thread-safe counter of orchestrated calls, persisted with a debounce
pub struct UsageMeter {
    /// JSON document the counters are persisted to
    path: PathBuf,

    /// Minimum time between two debounced flushes
    save_interval: Duration,

    /// Counter map plus flush bookkeeping
    state: Mutex<MeterState>,
}

impl UsageMeter {
    /// Create a meter persisting to `path`, loading any prior counters
    ///
    /// A missing, unreadable or corrupt counters file is treated as empty
    /// state rather than an error.
    pub fn new(path: impl Into<PathBuf>, save_interval: Duration) -> Self {
        let path = path.into();
        let counters = Self::load_counters(&path);
        Self {
            path,
            save_interval,
            state: Mutex::new(MeterState {
                counters,
                modified: false,
                last_save: Instant::now(),
            }),
        }
    }

    fn load_counters(path: &Path) -> BTreeMap<String, FunctionUsage> {
        if !path.exists() {
            return BTreeMap::new();
        }
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                warn!("Failed to read usage counters {}: {}", path.display(), err);
                return BTreeMap::new();
            }
        };
        match serde_json::from_str(&content) {
            Ok(counters) => counters,
            Err(err) => {
                warn!("Treating corrupt usage counters {} as empty: {}", path.display(), err);
                BTreeMap::new()
            }
        }
    }

    /// Record one call of `function` attributed to `origin`
    ///
    /// Safe under concurrent invocation from multiple threads; afterwards a
    /// debounced flush is attempted, so a long-running process persists its
    /// counters without anyone calling `flush` explicitly.
    pub fn record(&self, function: &str, origin: &str) {
        let mut state = self.state.lock();
        let usage = state.counters.entry(function.to_string()).or_default();
        usage.total_calls += 1;
        *usage.by_module.entry(origin.to_string()).or_insert(0) += 1;
        state.modified = true;
        self.flush_locked(&mut state, false);
    }

    /// Persist the counters when modified
    ///
    /// With `force == false` this is a no-op unless at least `save_interval`
    /// has elapsed since the last successful flush; with `force == true` it
    /// writes whenever the in-memory state has changed.
    pub fn flush(&self, force: bool) {
        let mut state = self.state.lock();
        self.flush_locked(&mut state, force);
    }

    fn flush_locked(&self, state: &mut MeterState, force: bool) {
        if !state.modified {
            return;
        }
        if !force && state.last_save.elapsed() < self.save_interval {
            return;
        }

        if let Some(parent) = self.path.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                error!("Failed to create usage counter directory {}: {}", parent.display(), err);
                return;
            }
        }
        let content = match serde_json::to_string_pretty(&state.counters) {
            Ok(content) => content,
            Err(err) => {
                error!("Failed to serialize usage counters: {}", err);
                return;
            }
        };
        match fs::write(&self.path, content) {
            Ok(()) => {
                state.last_save = Instant::now();
                state.modified = false;
                debug!("Usage counters flushed to {}", self.path.display());
            }
            Err(err) => {
                error!("Failed to write usage counters {}: {}", self.path.display(), err);
            }
        }
    }

    /// Aggregate the current counters into totals
    ///
    /// The counter map is cloned under the lock and aggregated outside it, so
    /// writers are not blocked while the snapshot is assembled.
    pub fn snapshot(&self) -> UsageSnapshot {
        let counters = self.state.lock().counters.clone();

        let mut snapshot = UsageSnapshot::default();
        for (function, usage) in counters {
            snapshot.total_calls += usage.total_calls;
            snapshot.by_function.insert(function, usage.total_calls);
            for (module, count) in usage.by_module {
                *snapshot.by_module.entry(module).or_insert(0) += count;
            }
        }
        snapshot
    }
}

impl Drop for UsageMeter {
    /// Force-flush on shutdown so no increments are silently lost on normal
    /// termination; abnormal termination may lose up to `save_interval` of
    /// increments.
    fn drop(&mut self) {
        self.flush(true);
    }
}
