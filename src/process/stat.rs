//! Parsers for the per-process stat, status and cmdline records.
//!
//! All parsers work on already-read contents so they can be exercised
//! without a live /proc.

use once_cell::sync::Lazy;

use crate::error::{ProcError, Result};
use crate::process::record::{ProcessSample, ProcessState};

/// Get system clock ticks per second (usually 100, but can vary).
fn get_clk_tck() -> f64 {
    #[cfg(unix)]
    {
        // SAFETY: sysconf is safe to call with _SC_CLK_TCK
        // Returns -1 on error, 0 if undefined - both are handled by the > 0 check
        unsafe {
            let tck = libc::sysconf(libc::_SC_CLK_TCK);
            if tck > 0 {
                return tck as f64;
            }
        }
    }
    100.0
}

fn get_page_size() -> u64 {
    #[cfg(unix)]
    {
        // SAFETY: sysconf is safe to call with _SC_PAGESIZE
        unsafe {
            let size = libc::sysconf(libc::_SC_PAGESIZE);
            if size > 0 {
                return size as u64;
            }
        }
    }
    4096
}

/// System clock ticks per second (for CPU time calculation).
pub static CLK_TCK: Lazy<f64> = Lazy::new(get_clk_tck);

/// Memory page size in bytes (for converting resident pages).
pub static PAGE_SIZE: Lazy<u64> = Lazy::new(get_page_size);

/// Positional fields of /proc/<pid>/stat used by the explorer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatRecord {
    pub pid: u32,
    pub short_name: String,
    pub state: ProcessState,
    pub ppid: u32,
    pub utime: u64,
    pub stime: u64,
    pub priority: i64,
    pub nice: i64,
    pub start_ticks: u64,
    pub vsize: u64,
    pub rss_pages: u64,
}

impl StatRecord {
    pub fn to_sample(&self, page_size: u64) -> ProcessSample {
        ProcessSample {
            ppid: self.ppid,
            state: self.state,
            priority: self.priority,
            nice: self.nice,
            vsize_bytes: self.vsize,
            rss_bytes: self.rss_pages.saturating_mul(page_size),
            cpu_ticks: self.utime.saturating_add(self.stime),
            start_ticks: self.start_ticks,
        }
    }
}

/// Parses a stat record.
///
/// The short name sits in parentheses at position 2 and may itself contain
/// spaces or parentheses, so it runs up to the last `)`. Remaining fields are
/// addressed by their 1-based kernel position.
pub fn parse_stat(pid: u32, content: &str) -> Result<StatRecord> {
    let open = content
        .find('(')
        .ok_or_else(|| ProcError::malformed(pid, "stat", "missing '('"))?;
    let close = content
        .rfind(')')
        .filter(|&c| c > open)
        .ok_or_else(|| ProcError::malformed(pid, "stat", "missing ')'"))?;

    let short_name = content[open + 1..close].to_string();
    let rest: Vec<&str> = content[close + 1..].split_whitespace().collect();

    let field = |pos: usize| stat_field(&rest, pid, pos);
    let number = |pos: usize| -> Result<i64> {
        let raw = stat_field(&rest, pid, pos)?;
        raw.parse::<i64>().map_err(|_| {
            ProcError::malformed(pid, "stat", format!("field {} is not a number: {:?}", pos, raw))
        })
    };
    let counter = |pos: usize| -> Result<u64> {
        let raw = stat_field(&rest, pid, pos)?;
        raw.parse::<u64>().map_err(|_| {
            ProcError::malformed(pid, "stat", format!("field {} is not a counter: {:?}", pos, raw))
        })
    };

    let code = field(3)?;
    let state = code
        .chars()
        .next()
        .filter(|_| code.len() == 1)
        .and_then(ProcessState::from_code)
        .ok_or_else(|| ProcError::malformed(pid, "stat", format!("unknown state {:?}", code)))?;

    Ok(StatRecord {
        pid,
        short_name,
        state,
        ppid: counter(4)? as u32,
        utime: counter(14)?,
        stime: counter(15)?,
        priority: number(18)?,
        nice: number(19)?,
        start_ticks: counter(22)?,
        vsize: counter(23)?,
        rss_pages: number(24)?.max(0) as u64,
    })
}

fn stat_field<'a>(rest: &[&'a str], pid: u32, pos: usize) -> Result<&'a str> {
    // rest[0] is field 3
    rest.get(pos - 3)
        .copied()
        .ok_or_else(|| ProcError::malformed(pid, "stat", format!("missing field {}", pos)))
}

/// Splits a raw command-line record into arguments.
///
/// Arguments are normally NUL-separated and NUL-terminated. Some programs
/// rewrite their argv with plain spaces, so a record without any NUL falls
/// back to whitespace splitting. Trailing NULs never yield an empty argument.
pub fn parse_cmdline(bytes: &[u8]) -> Vec<String> {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    let trimmed = &bytes[..end];
    if trimmed.is_empty() {
        return Vec::new();
    }

    if trimmed.contains(&0) {
        trimmed
            .split(|&b| b == 0)
            .map(|arg| String::from_utf8_lossy(arg).into_owned())
            .collect()
    } else {
        String::from_utf8_lossy(trimmed)
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}

/// Extracts the real uid from a status record.
pub fn parse_status_uid(pid: u32, content: &str) -> Result<u32> {
    for line in content.lines() {
        if let Some(value) = line.strip_prefix("Uid:") {
            let raw = value
                .split_whitespace()
                .next()
                .ok_or_else(|| ProcError::malformed(pid, "status", "empty Uid line"))?;
            return raw
                .parse::<u32>()
                .map_err(|_| ProcError::malformed(pid, "status", format!("bad uid {:?}", raw)));
        }
    }
    Err(ProcError::malformed(pid, "status", "no Uid line"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAT: &str = "1234 (test_process) S 1 1234 1234 0 -1 4194304 100 0 0 0 1000 500 0 0 20 0 1 0 12345 12345678 1234 18446744073709551615 4194304 4238788 140736466511168 0 0 0 0 0 0 0 0 0 17 1 0 0 0 0 0";

    #[test]
    fn test_parse_stat_fields() {
        let rec = parse_stat(1234, STAT).expect("stat should parse");
        assert_eq!(rec.short_name, "test_process");
        assert_eq!(rec.state, ProcessState::Sleeping);
        assert_eq!(rec.ppid, 1);
        assert_eq!(rec.utime, 1000);
        assert_eq!(rec.stime, 500);
        assert_eq!(rec.priority, 20);
        assert_eq!(rec.nice, 0);
        assert_eq!(rec.start_ticks, 12345);
        assert_eq!(rec.vsize, 12345678);
        assert_eq!(rec.rss_pages, 1234);

        let sample = rec.to_sample(4096);
        assert_eq!(sample.cpu_ticks, 1500);
        assert_eq!(sample.rss_bytes, 1234 * 4096);
    }

    #[test]
    fn test_parse_stat_name_with_spaces_and_parens() {
        let content = STAT.replace("(test_process)", "(Web Content (x))");
        let rec = parse_stat(1234, &content).expect("stat should parse");
        assert_eq!(rec.short_name, "Web Content (x)");
        assert_eq!(rec.ppid, 1);
    }

    #[test]
    fn test_parse_stat_negative_nice() {
        let content = STAT.replace(" 20 0 1 0 ", " 0 -20 1 0 ");
        let rec = parse_stat(1234, &content).expect("stat should parse");
        assert_eq!(rec.priority, 0);
        assert_eq!(rec.nice, -20);
    }

    #[test]
    fn test_parse_stat_truncated() {
        let err = parse_stat(1234, "1234 (test) S 1 2 3").unwrap_err();
        assert!(matches!(err, ProcError::MalformedRecord { .. }));
    }

    #[test]
    fn test_parse_stat_unknown_state() {
        let content = STAT.replace(") S ", ") Q ");
        assert!(parse_stat(1234, &content).is_err());
    }

    #[test]
    fn test_parse_cmdline_nul_separated() {
        assert_eq!(parse_cmdline(b"/bin/foo\0-x\0"), vec!["/bin/foo", "-x"]);
    }

    #[test]
    fn test_parse_cmdline_whitespace_fallback() {
        assert_eq!(parse_cmdline(b"foo -x"), vec!["foo", "-x"]);
    }

    #[test]
    fn test_parse_cmdline_empty_and_trailing() {
        assert!(parse_cmdline(b"").is_empty());
        assert!(parse_cmdline(b"\0").is_empty());
        assert_eq!(parse_cmdline(b"a\0\0"), vec!["a"]);
        assert_eq!(parse_cmdline(b"a\0\0b\0"), vec!["a", "", "b"]);
    }

    #[test]
    fn test_parse_status_uid() {
        let status = "Name:\tbash\nUmask:\t0022\nState:\tS (sleeping)\nTgid:\t42\nNgid:\t0\nPid:\t42\nPPid:\t1\nTracerPid:\t0\nUid:\t1000\t1000\t1000\t1000\nGid:\t1000\t1000\t1000\t1000\n";
        assert_eq!(parse_status_uid(42, status).unwrap(), 1000);
        assert!(parse_status_uid(42, "Name:\tbash\n").is_err());
    }
}
