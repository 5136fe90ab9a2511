//! The shared profiling engine.
//!
//! A [`Profiler`] owns the registry of source units and exposes the
//! operations the host runtime drives: `begin`/`end` on every traced
//! instruction boundary, `toggle` for the global switch, and `save` for the
//! report dump. One explicitly constructed instance is shared by reference
//! across all host threads; there is no ambient global.
//!
//! Hot-path cost model: with profiling off, `begin`/`end` are a single
//! relaxed atomic load and a branch. With profiling on, they take the
//! registry mutex only for the lookup and the stack/counter mutation.
//! Timestamps are sampled before the lock is acquired, in both `begin` and
//! `end`, so contention on the mutex does not inflate measured durations.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use fnv::FnvHashMap;
use parking_lot::Mutex;

use crate::clock::MonotonicClock;
use crate::error::ProfileError;
use crate::report;
use crate::source_unit::SourceUnit;

/// Report file pattern used when the host never sets one.
pub const DEFAULT_OUTPUT_PATTERN: &str = "profile.%Y-%m-%d_%H%M%S";

/// How unit keys are normalized into registry map keys.
///
/// Units are always resolved by exact full-key equality; the mode only
/// controls which strings land in the same map slot. `Basename` matches a
/// historical deployment that hashed the extension-free basename: two files
/// sharing a basename then share a slot and pay a chain scan, but are never
/// merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyMode {
    /// Hash the full key string. Deterministic, no chain scans.
    #[default]
    FullKey,
    /// Hash the trailing-slash-stripped, extension-free basename.
    Basename,
}

/// Construction-time options for a [`Profiler`].
#[derive(Debug, Clone)]
pub struct ProfilerConfig {
    /// Key normalization mode for the registry map.
    pub key_mode: KeyMode,
    /// Initial report file pattern, in strftime syntax.
    pub output_pattern: String,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        ProfilerConfig {
            key_mode: KeyMode::FullKey,
            output_pattern: DEFAULT_OUTPUT_PATTERN.to_string(),
        }
    }
}

/// Registry state guarded by the engine mutex.
#[derive(Debug, Default)]
struct RegistryState {
    /// Normalized key to chain of units, resolved by full-key equality.
    units: FnvHashMap<String, Vec<SourceUnit>>,
    /// Report file pattern, strftime syntax.
    output_pattern: String,
}

/// The profiling engine.
#[derive(Debug)]
pub struct Profiler {
    enabled: AtomicBool,
    begin_count: AtomicU64,
    end_count: AtomicU64,
    clock: MonotonicClock,
    key_mode: KeyMode,
    state: Mutex<RegistryState>,
}

impl Profiler {
    /// Create a disabled profiler with default configuration.
    pub fn new() -> Self {
        Self::with_config(ProfilerConfig::default())
    }

    /// Create a disabled profiler from an explicit configuration.
    pub fn with_config(config: ProfilerConfig) -> Self {
        Profiler {
            enabled: AtomicBool::new(false),
            begin_count: AtomicU64::new(0),
            end_count: AtomicU64::new(0),
            clock: MonotonicClock::new(),
            key_mode: config.key_mode,
            state: Mutex::new(RegistryState {
                units: FnvHashMap::default(),
                output_pattern: config.output_pattern,
            }),
        }
    }

    /// Set the global switch and return the new state.
    pub fn toggle(&self, enabled: bool) -> bool {
        self.enabled.store(enabled, Ordering::Relaxed);
        tracing::info!(enabled, "profiling toggled");
        enabled
    }

    /// Whether begin/end currently record anything.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Replace the report file pattern. Validation happens at save time.
    pub fn set_output_pattern(&self, pattern: &str) {
        self.state.lock().output_pattern = pattern.to_string();
    }

    /// Enter a traced location: count the call and push its start
    /// timestamp onto the line's in-flight stack.
    ///
    /// First sight of a key creates its unit, which for file-backed units
    /// includes the one-off line scan of the backing file; that stall is
    /// accepted because creation is rare next to steady-state calls.
    pub fn begin(&self, unit_key: &str, line: usize) {
        if !self.enabled.load(Ordering::Relaxed) {
            return;
        }
        let start = self.clock.now();
        let mut state = self.state.lock();
        let unit = unit_or_create(&mut state.units, self.key_mode, unit_key);
        unit.line_slot(line).record_begin(start);
        self.begin_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Leave a traced location: pop the matching start timestamp and
    /// accumulate the elapsed time into the line's total.
    ///
    /// An end can never create state. An unknown unit or an empty in-flight
    /// stack means some begin went missing on a host error path; both cases
    /// are logged and dropped without touching the aggregates.
    pub fn end(&self, unit_key: &str, line: usize) {
        if !self.enabled.load(Ordering::Relaxed) {
            return;
        }
        let end_ts = self.clock.now();
        let mut state = self.state.lock();
        let normalized = normalize_key(self.key_mode, unit_key);
        let unit = match state
            .units
            .get_mut(&normalized)
            .and_then(|chain| chain.iter_mut().find(|u| u.key() == unit_key))
        {
            Some(unit) => unit,
            None => {
                tracing::warn!(unit = unit_key, line, "end for unknown unit");
                return;
            }
        };
        if !unit.line_slot(line).record_end(end_ts) {
            tracing::warn!(unit = unit_key, line, "unmatched end, no begin in flight");
            return;
        }
        self.end_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Write the report and return its path.
    ///
    /// The registry mutex is held for the entire dump: a consistent
    /// snapshot at the cost of blocking instrumentation while the report is
    /// written. A `pid` hint is appended to the formatted file name as
    /// `.{pid}`. Failures are logged here and returned for hosts that want
    /// to observe them; in-memory state is never affected.
    pub fn save(&self, pid: Option<u32>) -> Result<PathBuf, ProfileError> {
        let state = self.state.lock();
        let path = match report::format_report_path(&state.output_pattern, pid) {
            Ok(path) => path,
            Err(err) => {
                tracing::error!(%err, "report save aborted");
                return Err(err);
            }
        };
        if let Err(err) = report::write_report(&path, &state.units) {
            tracing::error!(%err, "report save aborted");
            return Err(err);
        }
        tracing::info!(
            path = %path.display(),
            begins = self.begin_count.load(Ordering::Relaxed),
            ends = self.end_count.load(Ordering::Relaxed),
            "profile report written"
        );
        Ok(path)
    }

    /// Process-lifetime totals of processed `(begin, end)` calls.
    ///
    /// Ends that found no matching begin are not counted, so a difference
    /// between the two numbers is itself a diagnostic.
    pub fn counters(&self) -> (u64, u64) {
        (
            self.begin_count.load(Ordering::Relaxed),
            self.end_count.load(Ordering::Relaxed),
        )
    }

    /// Number of source units currently registered.
    pub fn unit_count(&self) -> usize {
        self.state.lock().units.values().map(Vec::len).sum()
    }

    /// Current report file pattern.
    pub fn output_pattern(&self) -> String {
        self.state.lock().output_pattern.clone()
    }

    #[cfg(test)]
    pub(crate) fn snapshot_entry(
        &self,
        unit_key: &str,
        line: usize,
    ) -> Option<crate::line_entry::LineEntry> {
        let state = self.state.lock();
        state
            .units
            .get(&normalize_key(self.key_mode, unit_key))
            .and_then(|chain| chain.iter().find(|u| u.key() == unit_key))
            .and_then(|unit| {
                unit.live_entries()
                    .find(|(l, _)| *l == line)
                    .map(|(_, entry)| entry.clone())
            })
    }
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve or create the unit for `key` inside its chain.
fn unit_or_create<'a>(
    units: &'a mut FnvHashMap<String, Vec<SourceUnit>>,
    mode: KeyMode,
    key: &str,
) -> &'a mut SourceUnit {
    let chain = units.entry(normalize_key(mode, key)).or_default();
    match chain.iter().position(|u| u.key() == key) {
        Some(idx) => &mut chain[idx],
        None => {
            let idx = chain.len();
            chain.push(SourceUnit::open(key));
            &mut chain[idx]
        }
    }
}

/// Map a unit key to its registry map key.
fn normalize_key(mode: KeyMode, key: &str) -> String {
    match mode {
        KeyMode::FullKey => key.to_string(),
        KeyMode::Basename => {
            let trimmed = key.trim_end_matches('/');
            let base = trimmed.rsplit('/').next().unwrap_or(trimmed);
            match base.rfind('.') {
                Some(dot) if dot > 0 => base[..dot].to_string(),
                _ => base.to_string(),
            }
        }
    }
}
