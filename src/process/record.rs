//! Data types produced by process reads.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::process::stat::CLK_TCK;

/// Scheduling state of a process as reported by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessState {
    Running,
    Sleeping,
    DiskSleep,
    Stopped,
    Zombie,
    Dead,
}

impl ProcessState {
    /// Maps the single-character state code of the stat record.
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'R' => Some(ProcessState::Running),
            'S' | 'I' => Some(ProcessState::Sleeping),
            'D' => Some(ProcessState::DiskSleep),
            'T' | 't' => Some(ProcessState::Stopped),
            'Z' => Some(ProcessState::Zombie),
            'X' | 'x' => Some(ProcessState::Dead),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessState::Running => "running",
            ProcessState::Sleeping => "sleeping",
            ProcessState::DiskSleep => "disk-sleep",
            ProcessState::Stopped => "stopped",
            ProcessState::Zombie => "zombie",
            ProcessState::Dead => "dead",
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field that may be unreadable for the current caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field<T> {
    Value(T),
    /// Access control denied the read.
    Restricted,
    /// The record was missing or did not parse.
    Unavailable,
}

impl<T> Field<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Field::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_restricted(&self) -> bool {
        matches!(self, Field::Restricted)
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Field::Unavailable)
    }
}

/// Owning user of a process (real uid).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub uid: u32,
    pub name: String,
}

/// Dynamic fields re-read on every refresh pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSample {
    pub ppid: u32,
    pub state: ProcessState,
    pub priority: i64,
    pub nice: i64,
    pub vsize_bytes: u64,
    pub rss_bytes: u64,
    /// utime + stime in clock ticks.
    pub cpu_ticks: u64,
    /// Start time in clock ticks since boot; identifies a pid incarnation.
    pub start_ticks: u64,
}

/// Full read of one process or thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub tid: Option<u32>,
    pub name: String,
    /// Short name recorded by the kernel (stat field 2).
    pub short_name: String,
    pub cmdline: Field<Vec<String>>,
    pub exe: Field<PathBuf>,
    pub cwd: Field<PathBuf>,
    pub owner: Field<Owner>,
    pub sample: ProcessSample,
    /// Set when neither the executable link nor the command line yielded anything.
    pub forced_zombie: bool,
}

impl ProcessRecord {
    /// Combines the individually read pieces of a process into a record.
    ///
    /// A process whose executable link and command line both come back empty
    /// is reported as a zombie under its kernel short name, whatever the stat
    /// record says.
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        pid: u32,
        tid: Option<u32>,
        short_name: String,
        mut sample: ProcessSample,
        exe: Field<PathBuf>,
        cmdline: Field<Vec<String>>,
        cwd: Field<PathBuf>,
        owner: Field<Owner>,
    ) -> Self {
        let exe_empty = match &exe {
            Field::Value(p) => p.as_os_str().is_empty(),
            Field::Unavailable => true,
            Field::Restricted => false,
        };
        let cmdline_empty = match &cmdline {
            Field::Value(args) => args.is_empty(),
            Field::Unavailable => true,
            Field::Restricted => false,
        };
        let forced_zombie = exe_empty && cmdline_empty;

        let name = if forced_zombie {
            sample.state = ProcessState::Zombie;
            short_name.clone()
        } else {
            derive_name(&exe, &cmdline, &short_name, |p| p.exists())
        };

        Self {
            pid,
            tid,
            name,
            short_name,
            cmdline,
            exe,
            cwd,
            owner,
            sample,
            forced_zombie,
        }
    }
}

/// Resolves a display name: executable link, then an existing first
/// command-line token, then the kernel short name.
pub fn derive_name<F>(
    exe: &Field<PathBuf>,
    cmdline: &Field<Vec<String>>,
    short_name: &str,
    path_exists: F,
) -> String
where
    F: Fn(&Path) -> bool,
{
    if let Some(name) = exe.value().and_then(|p| base_name(p)) {
        return name;
    }

    if let Some(first) = cmdline.value().and_then(|args| args.first()) {
        let path = Path::new(first);
        if !first.is_empty() && path_exists(path) {
            if let Some(name) = base_name(path) {
                return name;
            }
        }
    }

    short_name.to_string()
}

fn base_name(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy();
    let name = name.strip_suffix(" (deleted)").unwrap_or(&name);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// The field block of a tree node: identity, static-ish fields, and the
/// dynamic fields of the latest completed pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub tid: Option<u32>,
    pub ppid: u32,
    pub name: String,
    pub short_name: String,
    pub cmdline: Field<Vec<String>>,
    pub exe: Field<PathBuf>,
    pub cwd: Field<PathBuf>,
    pub owner: Field<Owner>,
    pub state: ProcessState,
    pub priority: i64,
    pub nice: i64,
    pub rss_bytes: u64,
    pub vsize_bytes: u64,
    pub cpu_ticks: u64,
    pub start_ticks: u64,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    /// The latest pass could not refresh this node; values are from an earlier pass.
    pub stale: bool,
}

impl ProcessInfo {
    pub fn from_record(record: ProcessRecord) -> Self {
        let s = record.sample;
        Self {
            pid: record.pid,
            tid: record.tid,
            ppid: s.ppid,
            name: record.name,
            short_name: record.short_name,
            cmdline: record.cmdline,
            exe: record.exe,
            cwd: record.cwd,
            owner: record.owner,
            state: s.state,
            priority: s.priority,
            nice: s.nice,
            rss_bytes: s.rss_bytes,
            vsize_bytes: s.vsize_bytes,
            cpu_ticks: s.cpu_ticks,
            start_ticks: s.start_ticks,
            cpu_percent: 0.0,
            memory_percent: 0.0,
            stale: false,
        }
    }

    /// Cumulative CPU time in seconds.
    pub fn cpu_time_seconds(&self) -> f64 {
        self.cpu_ticks as f64 / *CLK_TCK
    }

    pub fn owner_name(&self) -> &str {
        match &self.owner {
            Field::Value(o) => &o.name,
            Field::Restricted => "<restricted>",
            Field::Unavailable => "",
        }
    }

    pub fn command_line(&self) -> String {
        match &self.cmdline {
            Field::Value(args) => args.join(" "),
            Field::Restricted => "<restricted>".to_string(),
            Field::Unavailable => String::new(),
        }
    }
}
