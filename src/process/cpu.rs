//! CPU and memory percentage calculation from raw counters.
//!
//! CPU usage is a rate: the share of all processor ticks that elapsed
//! between two samples which the process spent in user or kernel mode.
//! The calculator therefore keeps the previous raw counters per pid.

use ahash::AHashMap as HashMap;
use tracing::warn;

use crate::process::record::ProcessSample;
use crate::system::SystemSample;

/// Derived percentages for one process and pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Metrics {
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

/// Raw counters retained from the previous observation of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuSample {
    pub proc_ticks: u64,
    pub system_ticks: u64,
}

/// Computes CPU% from the previous and current counters.
///
/// Reports 0 on the first observation, when no system ticks elapsed, or when
/// either counter went backwards (counter reset or pid reuse racing the sample).
pub fn cpu_percent(pid: u32, prev: Option<CpuSample>, now: CpuSample) -> f64 {
    let Some(prev) = prev else {
        return 0.0;
    };

    if now.proc_ticks < prev.proc_ticks || now.system_ticks < prev.system_ticks {
        warn!(
            "CPU counters of process {} went backwards (proc {} -> {}, system {} -> {}); reporting 0%",
            pid, prev.proc_ticks, now.proc_ticks, prev.system_ticks, now.system_ticks
        );
        return 0.0;
    }

    let system_delta = now.system_ticks - prev.system_ticks;
    if system_delta == 0 {
        return 0.0;
    }

    let proc_delta = now.proc_ticks - prev.proc_ticks;
    // The system counter sums every processor, so the share cannot exceed 100%
    // except through read skew between the two counters.
    ((proc_delta as f64 / system_delta as f64) * 100.0).min(100.0)
}

/// Resident size as a percentage of installed memory.
pub fn memory_percent(rss_bytes: u64, total_memory_bytes: u64) -> f64 {
    if total_memory_bytes == 0 {
        return 0.0;
    }
    rss_bytes as f64 / total_memory_bytes as f64 * 100.0
}

/// Stateful per-process metric calculator.
#[derive(Debug, Default)]
pub struct MetricCalculator {
    previous: HashMap<u32, CpuSample>,
}

impl MetricCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes metrics for `pid` and retains the counters for the next call.
    pub fn compute(&mut self, pid: u32, sample: &ProcessSample, system: &SystemSample) -> Metrics {
        let now = CpuSample {
            proc_ticks: sample.cpu_ticks,
            system_ticks: system.total_cpu_ticks,
        };
        let prev = self.previous.insert(pid, now);

        Metrics {
            cpu_percent: cpu_percent(pid, prev, now),
            memory_percent: memory_percent(sample.rss_bytes, system.total_memory_bytes),
        }
    }

    /// Drops the retained counters of a removed process.
    pub fn forget(&mut self, pid: u32) {
        self.previous.remove(&pid);
    }

    pub fn clear(&mut self) {
        self.previous.clear();
    }

    pub fn tracked(&self) -> usize {
        self.previous.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::record::ProcessState;

    fn sample(cpu_ticks: u64, rss_bytes: u64) -> ProcessSample {
        ProcessSample {
            ppid: 1,
            state: ProcessState::Running,
            priority: 20,
            nice: 0,
            vsize_bytes: 0,
            rss_bytes,
            cpu_ticks,
            start_ticks: 1,
        }
    }

    fn system(total_cpu_ticks: u64) -> SystemSample {
        SystemSample {
            total_cpu_ticks,
            total_memory_bytes: 1000,
            cpu_count: 4,
        }
    }

    #[test]
    fn test_first_observation_reports_zero() {
        let mut calc = MetricCalculator::new();
        let m = calc.compute(10, &sample(500, 100), &system(10_000));
        assert_eq!(m.cpu_percent, 0.0);
        assert!((m.memory_percent - 10.0).abs() < 1e-9);
        assert_eq!(calc.tracked(), 1);
    }

    #[test]
    fn test_delta_over_system_ticks() {
        let mut calc = MetricCalculator::new();
        calc.compute(10, &sample(500, 0), &system(10_000));
        let m = calc.compute(10, &sample(550, 0), &system(10_200));
        assert!((m.cpu_percent - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_system_delta_reports_zero() {
        let mut calc = MetricCalculator::new();
        calc.compute(10, &sample(500, 0), &system(10_000));
        let m = calc.compute(10, &sample(510, 0), &system(10_000));
        assert_eq!(m.cpu_percent, 0.0);
    }

    #[test]
    fn test_counter_decrease_clamps_to_zero() {
        let mut calc = MetricCalculator::new();
        calc.compute(10, &sample(500, 0), &system(10_000));
        let m = calc.compute(10, &sample(20, 0), &system(10_100));
        assert_eq!(m.cpu_percent, 0.0);
        // the new counters become the baseline
        let m = calc.compute(10, &sample(70, 0), &system(10_200));
        assert!((m.cpu_percent - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_forget_discards_state() {
        let mut calc = MetricCalculator::new();
        calc.compute(10, &sample(500, 0), &system(10_000));
        calc.forget(10);
        assert_eq!(calc.tracked(), 0);
        let m = calc.compute(10, &sample(900, 0), &system(10_100));
        assert_eq!(m.cpu_percent, 0.0);
    }

    #[test]
    fn test_memory_percent_zero_total() {
        assert_eq!(memory_percent(100, 0), 0.0);
        assert!((memory_percent(512, 2048) - 25.0).abs() < 1e-9);
    }
}
