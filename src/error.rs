//! Error taxonomy for kernel-interface reads.
//!
//! Per-process errors are contained to the process they concern: `NotFound`
//! means the process exited, `PermissionDenied` means a degraded read,
//! `MalformedRecord` means a record did not match the expected layout.
//! `SystemRecord` is the only error that fails a whole refresh pass.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result alias used across the engine.
pub type Result<T> = std::result::Result<T, ProcError>;

#[derive(Debug, Error)]
pub enum ProcError {
    /// The process or thread vanished between enumeration and read.
    #[error("process {pid} not found")]
    NotFound { pid: u32 },

    /// Access control prevented reading a record or listing.
    #[error("permission denied reading {what} of process {pid}")]
    PermissionDenied { pid: u32, what: &'static str },

    /// A record did not match the expected field layout.
    #[error("malformed {record} record for process {pid}: {reason}")]
    MalformedRecord {
        pid: u32,
        record: &'static str,
        reason: String,
    },

    /// No display name exists for a device number.
    #[error("no device name for {major}:{minor}")]
    DeviceNameUnresolved { major: u32, minor: u32 },

    /// A system-wide record (aggregate CPU, memory, process listing) could not be read.
    #[error("failed to read system record {path}: {reason}")]
    SystemRecord { path: PathBuf, reason: String },

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ProcError {
    /// Classifies an I/O error raised while reading `what` from a process directory.
    pub fn from_io(pid: u32, what: &'static str, path: &Path, err: io::Error) -> Self {
        if is_not_found(&err) {
            return ProcError::NotFound { pid };
        }
        if is_permission_denied(&err) {
            return ProcError::PermissionDenied { pid, what };
        }
        ProcError::Io {
            path: path.to_path_buf(),
            source: err,
        }
    }

    pub fn malformed(pid: u32, record: &'static str, reason: impl Into<String>) -> Self {
        ProcError::MalformedRecord {
            pid,
            record,
            reason: reason.into(),
        }
    }

    pub fn system(path: &Path, reason: impl ToString) -> Self {
        ProcError::SystemRecord {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ProcError::NotFound { .. })
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, ProcError::PermissionDenied { .. })
    }
}

fn is_not_found(err: &io::Error) -> bool {
    // ESRCH shows up when the task is torn down while its directory is open
    err.kind() == io::ErrorKind::NotFound || err.raw_os_error() == Some(libc::ESRCH)
}

fn is_permission_denied(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::PermissionDenied
        || matches!(err.raw_os_error(), Some(libc::EACCES) | Some(libc::EPERM))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_not_found() {
        let err = io::Error::from(io::ErrorKind::NotFound);
        let e = ProcError::from_io(42, "stat", Path::new("/proc/42/stat"), err);
        assert!(e.is_not_found());
    }

    #[test]
    fn test_from_io_esrch_is_not_found() {
        let err = io::Error::from_raw_os_error(libc::ESRCH);
        let e = ProcError::from_io(42, "stat", Path::new("/proc/42/stat"), err);
        assert!(e.is_not_found());
    }

    #[test]
    fn test_from_io_permission_denied() {
        let err = io::Error::from(io::ErrorKind::PermissionDenied);
        let e = ProcError::from_io(7, "exe", Path::new("/proc/7/exe"), err);
        assert!(e.is_permission_denied());
        assert_eq!(e.to_string(), "permission denied reading exe of process 7");
    }

    #[test]
    fn test_from_io_other_kept_as_io() {
        let err = io::Error::other("boom");
        let e = ProcError::from_io(7, "maps", Path::new("/proc/7/maps"), err);
        assert!(matches!(e, ProcError::Io { .. }));
    }
}
