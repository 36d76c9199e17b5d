//! Reading one process's raw state from a /proc-style directory tree.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{ProcError, Result};
use crate::process::descriptors::{
    read_descriptors, read_memory_maps, DeviceTable, FileDescriptor, MappedRegion,
};
use crate::process::record::{Field, Owner, ProcessRecord, ProcessSample};
use crate::process::scanner::{collect_pids, collect_thread_ids};
use crate::process::stat::{parse_cmdline, parse_stat, parse_status_uid, StatRecord, PAGE_SIZE};
use crate::process::users::UserCache;

/// Default location of the kernel's per-process interface.
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Source of per-process state consumed by the tree and search.
///
/// Implementations must be cheap to call concurrently; every method is a
/// bounded read that either completes or fails fast.
pub trait ProcessSource: Send + Sync {
    /// Enumerates live process ids. Failure here fails the whole pass.
    fn pids(&self) -> Result<Vec<u32>>;

    /// Full read of a process: identity, static-ish and dynamic fields.
    fn read_process(&self, pid: u32) -> Result<ProcessRecord>;

    /// Dynamic fields only, re-read on every pass.
    fn read_sample(&self, pid: u32) -> Result<ProcessSample>;

    fn read_descriptors(&self, pid: u32) -> Result<Vec<FileDescriptor>>;

    fn read_memory_maps(&self, pid: u32) -> Result<Vec<MappedRegion>>;

    /// Reads every thread of a process as a record carrying its thread id.
    fn read_threads(&self, pid: u32) -> Result<Vec<ProcessRecord>>;
}

/// `ProcessSource` backed by a procfs mount.
pub struct ProcfsReader {
    root: PathBuf,
    resolve_devices: bool,
    users: UserCache,
}

impl ProcfsReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            resolve_devices: true,
            users: UserCache::new(),
        }
    }

    /// Whether memory maps report device names instead of raw `major:minor`.
    pub fn with_device_resolution(mut self, enabled: bool) -> Self {
        self.resolve_devices = enabled;
        self
    }

    fn pid_dir(&self, pid: u32) -> PathBuf {
        self.root.join(pid.to_string())
    }

    fn read_stat(&self, id: u32, dir: &Path) -> Result<StatRecord> {
        let path = dir.join("stat");
        let content =
            fs::read_to_string(&path).map_err(|e| ProcError::from_io(id, "stat", &path, e))?;
        parse_stat(id, &content)
    }

    fn read_cmdline(&self, id: u32, dir: &Path) -> Result<Vec<String>> {
        let path = dir.join("cmdline");
        let bytes = fs::read(&path).map_err(|e| ProcError::from_io(id, "cmdline", &path, e))?;
        Ok(parse_cmdline(&bytes))
    }

    fn read_link(&self, id: u32, dir: &Path, what: &'static str) -> Result<PathBuf> {
        let path = dir.join(what);
        fs::read_link(&path).map_err(|e| ProcError::from_io(id, what, &path, e))
    }

    fn read_owner(&self, id: u32, dir: &Path) -> Result<Owner> {
        let path = dir.join("status");
        let content =
            fs::read_to_string(&path).map_err(|e| ProcError::from_io(id, "status", &path, e))?;
        let uid = parse_status_uid(id, &content)?;
        Ok(Owner {
            uid,
            name: self.users.resolve(uid),
        })
    }

    /// Reads a process (`tid == None`) or one of its threads.
    fn read_record(&self, pid: u32, tid: Option<u32>, dir: &Path) -> Result<ProcessRecord> {
        let id = tid.unwrap_or(pid);
        let stat = self.read_stat(id, dir)?;
        let sample = stat.to_sample(*PAGE_SIZE);

        let exe = to_field(id, self.read_link(id, dir, "exe"));
        let cmdline = to_field(id, self.read_cmdline(id, dir));
        let cwd = to_field(id, self.read_link(id, dir, "cwd"));
        let owner = to_field(id, self.read_owner(id, dir));

        Ok(ProcessRecord::assemble(
            pid,
            tid,
            stat.short_name,
            sample,
            exe,
            cmdline,
            cwd,
            owner,
        ))
    }
}

/// Turns an optional-field read into a `Field`, keeping the denial visible.
fn to_field<T>(id: u32, res: Result<T>) -> Field<T> {
    match res {
        Ok(v) => Field::Value(v),
        Err(ProcError::PermissionDenied { .. }) => Field::Restricted,
        Err(e @ ProcError::MalformedRecord { .. }) => {
            warn!("Omitting field of process {}: {}", id, e);
            Field::Unavailable
        }
        Err(e) => {
            debug!("Field of process {} unavailable: {}", id, e);
            Field::Unavailable
        }
    }
}

impl Default for ProcfsReader {
    fn default() -> Self {
        Self::new(DEFAULT_PROC_ROOT)
    }
}

impl ProcessSource for ProcfsReader {
    fn pids(&self) -> Result<Vec<u32>> {
        collect_pids(&self.root).map_err(|e| ProcError::system(&self.root, e))
    }

    fn read_process(&self, pid: u32) -> Result<ProcessRecord> {
        self.read_record(pid, None, &self.pid_dir(pid))
    }

    fn read_sample(&self, pid: u32) -> Result<ProcessSample> {
        Ok(self.read_stat(pid, &self.pid_dir(pid))?.to_sample(*PAGE_SIZE))
    }

    fn read_descriptors(&self, pid: u32) -> Result<Vec<FileDescriptor>> {
        read_descriptors(pid, &self.pid_dir(pid))
    }

    fn read_memory_maps(&self, pid: u32) -> Result<Vec<MappedRegion>> {
        let devices = self.resolve_devices.then(|| DeviceTable::load(&self.root));
        read_memory_maps(pid, &self.pid_dir(pid), devices.as_ref())
    }

    fn read_threads(&self, pid: u32) -> Result<Vec<ProcessRecord>> {
        let dir = self.pid_dir(pid);
        let tids = collect_thread_ids(&dir)
            .map_err(|e| ProcError::from_io(pid, "task", &dir.join("task"), e))?;

        let mut threads = Vec::with_capacity(tids.len());
        for tid in tids {
            let thread_dir = dir.join("task").join(tid.to_string());
            match self.read_record(pid, Some(tid), &thread_dir) {
                Ok(record) => threads.push(record),
                Err(ProcError::NotFound { .. }) => {
                    debug!("Thread {} of process {} exited while listing", tid, pid);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(threads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::record::ProcessState;
    use std::os::unix::fs::symlink;
    use tempfile::{tempdir, TempDir};

    fn stat_line(pid: u32, comm: &str, state: char, ppid: u32) -> String {
        format!(
            "{pid} ({comm}) {state} {ppid} {pid} {pid} 0 -1 4194304 100 0 0 0 250 50 0 0 20 0 1 0 4242 8192000 300 18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 1 0 0 0 0 0"
        )
    }

    fn write_process(root: &Path, pid: u32, comm: &str, ppid: u32, cmdline: &[u8]) -> PathBuf {
        let dir = root.join(pid.to_string());
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("stat"), stat_line(pid, comm, 'S', ppid)).unwrap();
        fs::write(dir.join("cmdline"), cmdline).unwrap();
        fs::write(
            dir.join("status"),
            format!("Name:\t{comm}\nState:\tS (sleeping)\nUid:\t0\t0\t0\t0\n"),
        )
        .unwrap();
        dir
    }

    fn fake_proc() -> TempDir {
        let root = tempdir().expect("Failed to create temp dir");
        let dir = write_process(root.path(), 42, "foo", 1, b"/bin/foo\0-x\0");
        symlink("/usr/bin/foo", dir.join("exe")).unwrap();
        symlink("/tmp", dir.join("cwd")).unwrap();
        root
    }

    #[test]
    fn test_read_process_full_record() {
        let root = fake_proc();
        let reader = ProcfsReader::new(root.path());

        let rec = reader.read_process(42).expect("read should succeed");
        assert_eq!(rec.pid, 42);
        assert_eq!(rec.tid, None);
        assert_eq!(rec.name, "foo");
        assert_eq!(rec.short_name, "foo");
        assert_eq!(
            rec.cmdline,
            Field::Value(vec!["/bin/foo".to_string(), "-x".to_string()])
        );
        assert_eq!(rec.cwd, Field::Value(PathBuf::from("/tmp")));
        assert_eq!(rec.owner.value().map(|o| o.uid), Some(0));
        assert_eq!(rec.sample.ppid, 1);
        assert_eq!(rec.sample.cpu_ticks, 300);
        assert_eq!(rec.sample.start_ticks, 4242);
        assert_eq!(rec.sample.rss_bytes, 300 * *PAGE_SIZE);
        assert!(!rec.forced_zombie);
    }

    #[test]
    fn test_read_process_missing_is_not_found() {
        let root = fake_proc();
        let reader = ProcfsReader::new(root.path());
        assert!(reader.read_process(999).unwrap_err().is_not_found());
        assert!(reader.read_sample(999).unwrap_err().is_not_found());
    }

    #[test]
    fn test_read_process_without_exe_or_cmdline_is_zombie() {
        let root = tempdir().unwrap();
        write_process(root.path(), 77, "defunct", 1, b"");
        let reader = ProcfsReader::new(root.path());

        let rec = reader.read_process(77).unwrap();
        assert!(rec.forced_zombie);
        assert_eq!(rec.sample.state, ProcessState::Zombie);
        assert_eq!(rec.name, "defunct");
        assert!(rec.exe.is_unavailable());
    }

    #[test]
    fn test_pids_and_threads() {
        let root = fake_proc();
        let dir = root.path().join("42");
        write_process(&dir.join("task"), 42, "foo", 1, b"/bin/foo\0");
        write_process(&dir.join("task"), 43, "foo-worker", 1, b"/bin/foo\0");
        fs::create_dir(root.path().join("self")).unwrap();

        let reader = ProcfsReader::new(root.path());
        assert_eq!(reader.pids().unwrap(), vec![42]);

        let threads = reader.read_threads(42).unwrap();
        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].pid, 42);
        assert_eq!(threads[0].tid, Some(42));
        assert_eq!(threads[1].tid, Some(43));
        assert_eq!(threads[1].short_name, "foo-worker");
    }

    #[test]
    fn test_pids_unreadable_root_is_system_error() {
        let root = tempdir().unwrap();
        let reader = ProcfsReader::new(root.path().join("missing"));
        assert!(matches!(
            reader.pids(),
            Err(ProcError::SystemRecord { .. })
        ));
    }

    #[test]
    fn test_read_memory_maps_resolves_devices() {
        let root = fake_proc();
        fs::write(
            root.path().join("partitions"),
            "major minor  #blocks  name\n\n   8        1     524288 sda1\n",
        )
        .unwrap();
        fs::write(
            root.path().join("42").join("maps"),
            "1000-2000 r-xp 00000000 08:01 10 /usr/lib/libfoo.so\n3000-4000 rw-p 00000000 00:00 0\n",
        )
        .unwrap();

        let reader = ProcfsReader::new(root.path());
        let maps = reader.read_memory_maps(42).unwrap();
        assert_eq!(maps.len(), 2);
        assert_eq!(maps[0].device, "sda1");

        let raw = ProcfsReader::new(root.path()).with_device_resolution(false);
        assert_eq!(raw.read_memory_maps(42).unwrap()[0].device, "08:01");
    }
}
