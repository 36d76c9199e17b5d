//! Process scanning utilities for discovering live process and thread ids.

use std::fs;
use std::io;
use std::path::Path;

/// Returns true for directory names made only of ASCII digits.
fn numeric_name(name: &str) -> Option<u32> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}

/// Scans the proc root for numeric process directories.
///
/// Failing to list the root itself is a system-wide failure and is returned
/// as an error; individual entries that vanish while listing are skipped.
pub fn collect_pids(root: &Path) -> io::Result<Vec<u32>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(root)?.flatten() {
        let name = entry.file_name();
        let pid = match name.to_str().and_then(numeric_name) {
            Some(v) => v,
            None => continue,
        };
        if pid == 0 {
            continue;
        }
        out.push(pid);
    }
    out.sort_unstable();
    Ok(out)
}

/// Lists the thread ids below `<pid_dir>/task`.
pub fn collect_thread_ids(pid_dir: &Path) -> io::Result<Vec<u32>> {
    let mut out: Vec<u32> = fs::read_dir(pid_dir.join("task"))?
        .flatten()
        .filter_map(|entry| entry.file_name().to_str().and_then(numeric_name))
        .collect();
    out.sort_unstable();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_collect_pids_ignores_non_numeric() {
        let dir = tempdir().expect("Failed to create temp dir");
        for name in ["1", "42", "self", "meminfo", "7x", "300"] {
            fs::create_dir(dir.path().join(name)).expect("Failed to create dir");
        }

        let pids = collect_pids(dir.path()).expect("listing should succeed");
        assert_eq!(pids, vec![1, 42, 300]);
    }

    #[test]
    fn test_collect_pids_missing_root() {
        let dir = tempdir().expect("Failed to create temp dir");
        assert!(collect_pids(&dir.path().join("nope")).is_err());
    }

    #[test]
    fn test_collect_thread_ids() {
        let dir = tempdir().expect("Failed to create temp dir");
        let task = dir.path().join("task");
        fs::create_dir(&task).expect("Failed to create task dir");
        for tid in ["12", "10", "11"] {
            fs::create_dir(task.join(tid)).expect("Failed to create tid dir");
        }

        assert_eq!(collect_thread_ids(dir.path()).unwrap(), vec![10, 11, 12]);
    }
}
