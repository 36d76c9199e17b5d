//! System-wide counters from the proc root.
//!
//! This module reads the aggregate CPU tick counter from `stat` and the total
//! installed memory from `meminfo`. Both are read fresh on every pass.

use serde::Serialize;
use std::fs;
use std::path::PathBuf;

use crate::error::{ProcError, Result};
use crate::process::DEFAULT_PROC_ROOT;

/// CPU statistics of the aggregate `cpu` line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuStat {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuStat {
    /// Calculate total CPU time (all fields).
    ///
    /// guest and guest_nice are already accounted in user and nice.
    pub fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }
}

/// One sample of the system-wide normalisation counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SystemSample {
    /// Ticks elapsed across all processors since boot.
    pub total_cpu_ticks: u64,
    pub total_memory_bytes: u64,
    pub cpu_count: usize,
}

/// Source of system-wide counters. Failure fails the whole refresh pass.
pub trait SystemSource: Send + Sync {
    fn sample(&self) -> Result<SystemSample>;
}

/// Parses the aggregate `cpu` line and counts the per-processor lines.
pub fn parse_cpu_stat(content: &str) -> std::result::Result<(CpuStat, usize), String> {
    let first = content
        .lines()
        .next()
        .ok_or_else(|| "empty stat record".to_string())?;

    let parts: Vec<&str> = first.split_whitespace().collect();
    if parts.first() != Some(&"cpu") {
        return Err(format!("first line is not the aggregate cpu line: {:?}", first));
    }
    if parts.len() < 8 {
        return Err(format!(
            "Invalid cpu line: expected at least 8 fields, got {}",
            parts.len()
        ));
    }

    let value = |idx: usize| -> std::result::Result<u64, String> {
        match parts.get(idx) {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|e| format!("Failed to parse cpu field {}: {}", idx, e)),
            // steal is missing on very old kernels
            None => Ok(0),
        }
    };

    let stat = CpuStat {
        user: value(1)?,
        nice: value(2)?,
        system: value(3)?,
        idle: value(4)?,
        iowait: value(5)?,
        irq: value(6)?,
        softirq: value(7)?,
        steal: value(8)?,
    };

    let cpu_count = content
        .lines()
        .skip(1)
        .filter(|l| {
            l.strip_prefix("cpu")
                .and_then(|rest| rest.chars().next())
                .is_some_and(|c| c.is_ascii_digit())
        })
        .count()
        .max(1);

    Ok((stat, cpu_count))
}

/// Parses total memory in bytes from the first labeled value of meminfo.
pub fn parse_total_memory(content: &str) -> std::result::Result<u64, String> {
    let line = content
        .lines()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| "empty meminfo record".to_string())?;

    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 2 || !parts[0].ends_with(':') {
        return Err(format!("Invalid meminfo line: {:?}", line));
    }
    let kb = parts[1]
        .parse::<u64>()
        .map_err(|e| format!("Failed to parse {}: {}", parts[0], e))?;
    Ok(kb * 1024)
}

/// Reads system counters below a proc root.
pub struct SystemReader {
    root: PathBuf,
}

impl SystemReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read(&self, name: &str) -> Result<(PathBuf, String)> {
        let path = self.root.join(name);
        let content = fs::read_to_string(&path).map_err(|e| ProcError::system(&path, e))?;
        Ok((path, content))
    }
}

impl Default for SystemReader {
    fn default() -> Self {
        Self::new(DEFAULT_PROC_ROOT)
    }
}

impl SystemSource for SystemReader {
    fn sample(&self) -> Result<SystemSample> {
        let (stat_path, stat) = self.read("stat")?;
        let (cpu, cpu_count) = parse_cpu_stat(&stat).map_err(|e| ProcError::system(&stat_path, e))?;

        let (mem_path, meminfo) = self.read("meminfo")?;
        let total_memory_bytes =
            parse_total_memory(&meminfo).map_err(|e| ProcError::system(&mem_path, e))?;

        Ok(SystemSample {
            total_cpu_ticks: cpu.total(),
            total_memory_bytes,
            cpu_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const STAT: &str = "cpu  4705 356 584 3699176 23060 0 277 0 0 0
cpu0 1393 280 165 924195 5853 0 51 0 0 0
cpu1 1057 20 140 925040 5763 0 39 0 0 0
intr 1462898
ctxt 115315
btime 1700000000
processes 8543
";

    #[test]
    fn test_parse_cpu_stat() {
        let (stat, count) = parse_cpu_stat(STAT).expect("stat should parse");
        assert_eq!(stat.user, 4705);
        assert_eq!(stat.idle, 3699176);
        assert_eq!(stat.total(), 4705 + 356 + 584 + 3699176 + 23060 + 277);
        assert_eq!(count, 2);
    }

    #[test]
    fn test_parse_cpu_stat_invalid() {
        assert!(parse_cpu_stat("").is_err());
        assert!(parse_cpu_stat("intr 1 2 3").is_err());
        assert!(parse_cpu_stat("cpu 1 2").is_err());
        assert!(parse_cpu_stat("cpu a b c d e f g").is_err());
    }

    #[test]
    fn test_parse_total_memory() {
        let meminfo = "MemTotal:       16318504 kB\nMemFree:         1234567 kB\n";
        assert_eq!(parse_total_memory(meminfo).unwrap(), 16318504 * 1024);
        assert!(parse_total_memory("garbage").is_err());
    }

    #[test]
    fn test_system_reader_sample() {
        let dir = tempdir().expect("Failed to create temp dir");
        fs::write(dir.path().join("stat"), STAT).unwrap();
        fs::write(dir.path().join("meminfo"), "MemTotal: 2048 kB\n").unwrap();

        let sample = SystemReader::new(dir.path()).sample().unwrap();
        assert_eq!(sample.total_memory_bytes, 2048 * 1024);
        assert_eq!(sample.cpu_count, 2);
        assert!(sample.total_cpu_ticks > 0);
    }

    #[test]
    fn test_system_reader_missing_records() {
        let dir = tempdir().expect("Failed to create temp dir");
        let err = SystemReader::new(dir.path()).sample().unwrap_err();
        assert!(matches!(err, ProcError::SystemRecord { .. }));
    }
}
