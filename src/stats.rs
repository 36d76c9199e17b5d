//! Runtime statistics of the refresh engine.
//!
//! Counters are updated by the sampler after every pass and read by the
//! `check` command and by anything polling `RefreshEngine::stats`.

use serde::Serialize;
use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock as StdRwLock};
use std::time::Instant;

/// Running statistics for a single metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RunningStat {
    pub count: u64,
    sum: f64,
    pub min: f64,
    pub max: f64,
    pub last: f64,
}

impl RunningStat {
    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
            self.last = value;
            self.sum = value;
            self.count = 1;
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

/// Thread-safe wrapper for running statistics.
#[derive(Default)]
pub struct Stat {
    inner: Mutex<RunningStat>,
}

impl Stat {
    pub fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    pub fn snapshot(&self) -> RunningStat {
        self.inner.lock().map(|s| *s).unwrap_or_default()
    }
}

/// Counters describing the sampler's work so far.
pub struct EngineStats {
    pub pass_duration_ms: Stat,
    pub live_processes: Stat,
    pub passes_completed: AtomicU64,
    pub passes_failed: AtomicU64,
    pub passes_coalesced: AtomicU64,
    pub processes_added: AtomicU64,
    pub processes_removed: AtomicU64,
    pub processes_reparented: AtomicU64,
    pub vanished_mid_read: AtomicU64,
    pub permission_denied: AtomicU64,
    pub malformed_records: AtomicU64,
    pub stale_nodes: AtomicU64,
    pub start_time: Instant,
    pub last_pass_time: StdRwLock<Option<Instant>>,
}

impl Default for EngineStats {
    fn default() -> Self {
        Self {
            pass_duration_ms: Stat::default(),
            live_processes: Stat::default(),
            passes_completed: AtomicU64::new(0),
            passes_failed: AtomicU64::new(0),
            passes_coalesced: AtomicU64::new(0),
            processes_added: AtomicU64::new(0),
            processes_removed: AtomicU64::new(0),
            processes_reparented: AtomicU64::new(0),
            vanished_mid_read: AtomicU64::new(0),
            permission_denied: AtomicU64::new(0),
            malformed_records: AtomicU64::new(0),
            stale_nodes: AtomicU64::new(0),
            start_time: Instant::now(),
            last_pass_time: StdRwLock::new(None),
        }
    }
}

/// Plain copy of `EngineStats` for serialization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStatsReport {
    pub pass_duration_ms: RunningStat,
    pub live_processes: RunningStat,
    pub passes_completed: u64,
    pub passes_failed: u64,
    pub passes_coalesced: u64,
    pub processes_added: u64,
    pub processes_removed: u64,
    pub processes_reparented: u64,
    pub vanished_mid_read: u64,
    pub permission_denied: u64,
    pub malformed_records: u64,
    pub stale_nodes: u64,
    pub uptime_seconds: u64,
}

impl EngineStats {
    pub fn new() -> Self {
        Default::default()
    }

    /// Records a completed pass.
    pub fn record_pass(
        &self,
        duration_ms: f64,
        live: usize,
        added: usize,
        removed: usize,
        reparented: usize,
        stale: usize,
    ) {
        self.pass_duration_ms.add_sample(duration_ms);
        self.live_processes.add_sample(live as f64);
        self.passes_completed.fetch_add(1, Ordering::Relaxed);
        self.processes_added.fetch_add(added as u64, Ordering::Relaxed);
        self.processes_removed.fetch_add(removed as u64, Ordering::Relaxed);
        self.processes_reparented
            .fetch_add(reparented as u64, Ordering::Relaxed);
        self.stale_nodes.fetch_add(stale as u64, Ordering::Relaxed);
        if let Ok(mut guard) = self.last_pass_time.write() {
            *guard = Some(Instant::now());
        }
    }

    pub fn record_read_failures(&self, vanished: usize, denied: usize, malformed: usize) {
        self.vanished_mid_read
            .fetch_add(vanished as u64, Ordering::Relaxed);
        self.permission_denied
            .fetch_add(denied as u64, Ordering::Relaxed);
        self.malformed_records
            .fetch_add(malformed as u64, Ordering::Relaxed);
    }

    pub fn record_pass_failure(&self) {
        self.passes_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_coalesced(&self) {
        self.passes_coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_pass_success_rate(&self) -> f64 {
        let success = self.passes_completed.load(Ordering::Relaxed);
        let failure = self.passes_failed.load(Ordering::Relaxed);
        let total = success + failure;
        if total == 0 {
            100.0
        } else {
            (success as f64 / total as f64) * 100.0
        }
    }

    pub fn seconds_since_last_pass(&self) -> Option<f64> {
        let guard = self.last_pass_time.read().ok()?;
        guard.map(|t| t.elapsed().as_secs_f64())
    }

    pub fn report(&self) -> EngineStatsReport {
        EngineStatsReport {
            pass_duration_ms: self.pass_duration_ms.snapshot(),
            live_processes: self.live_processes.snapshot(),
            passes_completed: self.passes_completed.load(Ordering::Relaxed),
            passes_failed: self.passes_failed.load(Ordering::Relaxed),
            passes_coalesced: self.passes_coalesced.load(Ordering::Relaxed),
            processes_added: self.processes_added.load(Ordering::Relaxed),
            processes_removed: self.processes_removed.load(Ordering::Relaxed),
            processes_reparented: self.processes_reparented.load(Ordering::Relaxed),
            vanished_mid_read: self.vanished_mid_read.load(Ordering::Relaxed),
            permission_denied: self.permission_denied.load(Ordering::Relaxed),
            malformed_records: self.malformed_records.load(Ordering::Relaxed),
            stale_nodes: self.stale_nodes.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    pub fn render_table(&self) -> String {
        let report = self.report();
        let left_col = 24usize;
        let col_w = 12usize;

        let mut out = String::new();
        writeln!(out, "REFRESH ENGINE STATS").ok();
        writeln!(out, "====================").ok();
        writeln!(out).ok();
        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "",
            "current",
            "average",
            "max",
            "min",
            left = left_col,
            col = col_w
        )
        .ok();
        writeln!(out, "{}", "-".repeat(left_col + 4 * (col_w + 3))).ok();

        for (label, stat) in [
            ("pass duration (ms)", report.pass_duration_ms),
            ("live processes", report.live_processes),
        ] {
            writeln!(
                out,
                "{:left$} | {:>col$.2} | {:>col$.2} | {:>col$.2} | {:>col$.2}",
                label,
                stat.last,
                stat.avg(),
                stat.max,
                stat.min,
                left = left_col,
                col = col_w
            )
            .ok();
        }

        writeln!(out).ok();
        for (label, value) in [
            ("passes completed", report.passes_completed),
            ("passes failed", report.passes_failed),
            ("passes coalesced", report.passes_coalesced),
            ("processes added", report.processes_added),
            ("processes removed", report.processes_removed),
            ("processes reparented", report.processes_reparented),
            ("vanished mid-read", report.vanished_mid_read),
            ("permission denied", report.permission_denied),
            ("malformed records", report.malformed_records),
            ("stale nodes", report.stale_nodes),
        ] {
            writeln!(out, "{:left$} : {}", label, value, left = left_col).ok();
        }
        writeln!(
            out,
            "{:left$} : {:.1}%",
            "pass success rate",
            self.get_pass_success_rate(),
            left = left_col
        )
        .ok();
        out
    }
}
