//! In-memory process and system sources for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use herakles_process_explorer::{
    DescriptorKind, Field, FileDescriptor, MappedRegion, Owner, ProcError, ProcessRecord,
    ProcessSample, ProcessSource, ProcessState, Result, SystemSample, SystemSource,
};

pub const TOTAL_MEMORY: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct MockProc {
    pub name: String,
    pub ppid: u32,
    pub state: ProcessState,
    pub cpu_ticks: u64,
    pub rss_bytes: u64,
    pub start_ticks: u64,
    pub fds: Vec<String>,
    pub libs: Vec<String>,
    /// Executable and command line unreadable.
    pub restricted: bool,
    /// Descriptor and map reads are denied.
    pub handles_denied: bool,
    /// Sample reads fail with permission denied.
    pub sample_denied: bool,
    /// Stat record fails to parse.
    pub malformed: bool,
    /// Listed by `pids()` but already gone when read.
    pub vanishing: bool,
    pub threads: Vec<u32>,
}

impl MockProc {
    fn new(name: &str, ppid: u32) -> Self {
        Self {
            name: name.to_string(),
            ppid,
            state: ProcessState::Sleeping,
            cpu_ticks: 0,
            rss_bytes: 0,
            start_ticks: 100,
            fds: Vec::new(),
            libs: Vec::new(),
            restricted: false,
            handles_denied: false,
            sample_denied: false,
            malformed: false,
            vanishing: false,
            threads: Vec::new(),
        }
    }

    fn sample(&self) -> ProcessSample {
        ProcessSample {
            ppid: self.ppid,
            state: self.state,
            priority: 20,
            nice: 0,
            vsize_bytes: self.rss_bytes * 2,
            rss_bytes: self.rss_bytes,
            cpu_ticks: self.cpu_ticks,
            start_ticks: self.start_ticks,
        }
    }
}

pub struct MockSource {
    procs: Mutex<BTreeMap<u32, MockProc>>,
    system_ticks: Mutex<u64>,
    system_fails: Mutex<bool>,
    enumerate_delay: Mutex<Option<Duration>>,
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSource {
    pub fn new() -> Self {
        Self {
            procs: Mutex::new(BTreeMap::new()),
            system_ticks: Mutex::new(1_000),
            system_fails: Mutex::new(false),
            enumerate_delay: Mutex::new(None),
        }
    }

    /// Source populated with `(pid, ppid, name)` triples.
    pub fn with(procs: &[(u32, u32, &str)]) -> Self {
        let source = Self::new();
        for &(pid, ppid, name) in procs {
            source.add(pid, ppid, name);
        }
        source
    }

    pub fn add(&self, pid: u32, ppid: u32, name: &str) {
        self.procs
            .lock()
            .unwrap()
            .insert(pid, MockProc::new(name, ppid));
    }

    pub fn remove(&self, pid: u32) {
        self.procs.lock().unwrap().remove(&pid);
    }

    pub fn update<F: FnOnce(&mut MockProc)>(&self, pid: u32, f: F) {
        if let Some(p) = self.procs.lock().unwrap().get_mut(&pid) {
            f(p);
        }
    }

    pub fn set_ppid(&self, pid: u32, ppid: u32) {
        self.update(pid, |p| p.ppid = ppid);
    }

    pub fn set_cpu_ticks(&self, pid: u32, ticks: u64) {
        self.update(pid, |p| p.cpu_ticks = ticks);
    }

    pub fn set_rss(&self, pid: u32, bytes: u64) {
        self.update(pid, |p| p.rss_bytes = bytes);
    }

    pub fn set_system_ticks(&self, ticks: u64) {
        *self.system_ticks.lock().unwrap() = ticks;
    }

    pub fn set_system_fails(&self, fails: bool) {
        *self.system_fails.lock().unwrap() = fails;
    }

    /// Makes every `pids()` call block for `delay`.
    pub fn set_enumerate_delay(&self, delay: Option<Duration>) {
        *self.enumerate_delay.lock().unwrap() = delay;
    }

    fn get(&self, pid: u32) -> Result<MockProc> {
        let procs = self.procs.lock().unwrap();
        match procs.get(&pid) {
            Some(p) if !p.vanishing => Ok(p.clone()),
            _ => Err(ProcError::NotFound { pid }),
        }
    }

    fn malformed_stat(pid: u32) -> ProcError {
        ProcError::MalformedRecord {
            pid,
            record: "stat",
            reason: "missing fields after name".to_string(),
        }
    }

    fn record(pid: u32, tid: Option<u32>, p: &MockProc) -> ProcessRecord {
        let (exe, cmdline) = if p.restricted {
            (Field::Restricted, Field::Restricted)
        } else {
            (
                Field::Value(PathBuf::from(format!("/usr/bin/{}", p.name))),
                Field::Value(vec![p.name.clone()]),
            )
        };
        ProcessRecord::assemble(
            pid,
            tid,
            p.name.clone(),
            p.sample(),
            exe,
            cmdline,
            Field::Value(PathBuf::from("/")),
            Field::Value(Owner {
                uid: 0,
                name: "root".to_string(),
            }),
        )
    }
}

impl ProcessSource for MockSource {
    fn pids(&self) -> Result<Vec<u32>> {
        let delay = *self.enumerate_delay.lock().unwrap();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        Ok(self.procs.lock().unwrap().keys().copied().collect())
    }

    fn read_process(&self, pid: u32) -> Result<ProcessRecord> {
        let p = self.get(pid)?;
        if p.malformed {
            return Err(Self::malformed_stat(pid));
        }
        Ok(Self::record(pid, None, &p))
    }

    fn read_sample(&self, pid: u32) -> Result<ProcessSample> {
        let p = self.get(pid)?;
        if p.sample_denied {
            return Err(ProcError::PermissionDenied { pid, what: "stat" });
        }
        if p.malformed {
            return Err(Self::malformed_stat(pid));
        }
        Ok(p.sample())
    }

    fn read_descriptors(&self, pid: u32) -> Result<Vec<FileDescriptor>> {
        let p = self.get(pid)?;
        if p.handles_denied {
            return Err(ProcError::PermissionDenied { pid, what: "fd" });
        }
        Ok(p.fds
            .iter()
            .enumerate()
            .map(|(i, target)| FileDescriptor {
                fd: i as u32,
                kind: DescriptorKind::classify(target),
                target: target.clone(),
            })
            .collect())
    }

    fn read_memory_maps(&self, pid: u32) -> Result<Vec<MappedRegion>> {
        let p = self.get(pid)?;
        if p.handles_denied {
            return Err(ProcError::PermissionDenied { pid, what: "maps" });
        }
        Ok(p.libs
            .iter()
            .enumerate()
            .map(|(i, path)| MappedRegion {
                start: 0x1000 * (i as u64 + 1),
                end: 0x1000 * (i as u64 + 2),
                permissions: "r-xp".to_string(),
                offset: 0,
                device: "08:01".to_string(),
                inode: 1000 + i as u64,
                path: Some(path.clone()),
            })
            .collect())
    }

    fn read_threads(&self, pid: u32) -> Result<Vec<ProcessRecord>> {
        let p = self.get(pid)?;
        let mut tids = vec![pid];
        tids.extend(p.threads.iter().copied());
        Ok(tids
            .into_iter()
            .map(|tid| Self::record(pid, Some(tid), &p))
            .collect())
    }
}

impl SystemSource for MockSource {
    fn sample(&self) -> Result<SystemSample> {
        if *self.system_fails.lock().unwrap() {
            return Err(ProcError::SystemRecord {
                path: PathBuf::from("/proc/stat"),
                reason: "unreadable".to_string(),
            });
        }
        Ok(SystemSample {
            total_cpu_ticks: *self.system_ticks.lock().unwrap(),
            total_memory_bytes: TOTAL_MEMORY,
            cpu_count: 4,
        })
    }
}
