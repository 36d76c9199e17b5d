//! Open file descriptors and memory maps of a single process.
//!
//! These are detail reads: they are only performed on explicit request
//! (selected process, handle search), never during a bulk refresh pass.

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::{ProcError, Result};

/// Kind of object a descriptor refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub enum DescriptorKind {
    File,
    Socket,
    Pipe,
    AnonInode,
    Other(String),
}

impl DescriptorKind {
    /// Classifies a descriptor link target.
    ///
    /// Targets containing `/` are filesystem objects; everything else uses the
    /// `type:[inode]` form, e.g. `socket:[8842]` or `anon_inode:[eventfd]`.
    pub fn classify(target: &str) -> Self {
        if target.contains('/') {
            return DescriptorKind::File;
        }
        match target.split_once(':').map(|(prefix, _)| prefix) {
            Some("socket") => DescriptorKind::Socket,
            Some("pipe") => DescriptorKind::Pipe,
            Some("anon_inode") => DescriptorKind::AnonInode,
            Some(other) => DescriptorKind::Other(other.to_string()),
            None => DescriptorKind::File,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DescriptorKind::File => "file",
            DescriptorKind::Socket => "socket",
            DescriptorKind::Pipe => "pipe",
            DescriptorKind::AnonInode => "anon_inode",
            DescriptorKind::Other(s) => s,
        }
    }
}

impl fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<DescriptorKind> for String {
    fn from(kind: DescriptorKind) -> Self {
        kind.as_str().to_string()
    }
}

/// One open descriptor of a process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDescriptor {
    pub fd: u32,
    pub kind: DescriptorKind,
    pub target: String,
}

/// One line of a process's memory maps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappedRegion {
    pub start: u64,
    pub end: u64,
    pub permissions: String,
    pub offset: u64,
    /// Device name when resolvable, otherwise the raw `major:minor`.
    pub device: String,
    pub inode: u64,
    pub path: Option<String>,
}

/// Reads the descriptor directory of a process (or thread) directory.
pub fn read_descriptors(pid: u32, pid_dir: &Path) -> Result<Vec<FileDescriptor>> {
    let fd_dir = pid_dir.join("fd");
    let entries = fs::read_dir(&fd_dir).map_err(|e| ProcError::from_io(pid, "fd", &fd_dir, e))?;

    let mut out = Vec::new();
    for entry in entries.flatten() {
        let fd: u32 = match entry.file_name().to_str().and_then(|s| s.parse().ok()) {
            Some(v) => v,
            None => continue,
        };
        let path = entry.path();
        match fs::read_link(&path) {
            Ok(target) => {
                let target = target.to_string_lossy().into_owned();
                out.push(FileDescriptor {
                    fd,
                    kind: DescriptorKind::classify(&target),
                    target,
                });
            }
            Err(e) => match ProcError::from_io(pid, "fd", &path, e) {
                // closed between listing and readlink
                ProcError::NotFound { .. } => continue,
                err @ ProcError::PermissionDenied { .. } => return Err(err),
                err => debug!("Skipping fd {} of process {}: {}", fd, pid, err),
            },
        }
    }
    out.sort_by_key(|d| d.fd);
    Ok(out)
}

/// Partition table used to give device numbers a display name.
#[derive(Debug, Default, Clone)]
pub struct DeviceTable {
    names: HashMap<(u32, u32), String>,
}

impl DeviceTable {
    /// Loads `<root>/partitions`; an unreadable table is simply empty.
    pub fn load(root: &Path) -> Self {
        match fs::read_to_string(root.join("partitions")) {
            Ok(content) => Self::parse(&content),
            Err(e) => {
                debug!("Partition table unavailable: {}", e);
                Self::default()
            }
        }
    }

    /// Parses the `major minor #blocks name` table; header and blank lines are skipped.
    pub fn parse(content: &str) -> Self {
        let mut names = HashMap::new();
        for line in content.lines() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                continue;
            }
            if let (Ok(major), Ok(minor)) = (fields[0].parse::<u32>(), fields[1].parse::<u32>()) {
                names.insert((major, minor), fields[3].to_string());
            }
        }
        Self { names }
    }

    pub fn lookup(&self, major: u32, minor: u32) -> Result<&str> {
        self.names
            .get(&(major, minor))
            .map(String::as_str)
            .ok_or(ProcError::DeviceNameUnresolved { major, minor })
    }

    /// Display name for a raw `major:minor` field, falling back to the raw text.
    pub fn display(&self, raw: &str) -> String {
        let parsed = raw.split_once(':').and_then(|(ma, mi)| {
            Some((
                u32::from_str_radix(ma, 16).ok()?,
                u32::from_str_radix(mi, 16).ok()?,
            ))
        });
        match parsed {
            Some((0, 0)) | None => raw.to_string(),
            Some((major, minor)) => match self.lookup(major, minor) {
                Ok(name) => name.to_string(),
                Err(_) => raw.to_string(),
            },
        }
    }
}

/// Parses one memory-maps line.
///
/// Layout: `start-end perms offset dev inode [path]`; the path is padded with
/// spaces and may itself contain spaces.
pub fn parse_maps_line(pid: u32, line: &str, devices: Option<&DeviceTable>) -> Result<MappedRegion> {
    let mut parts = line.splitn(6, ' ');
    let mut next = |what: &str| {
        parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProcError::malformed(pid, "maps", format!("missing {}", what)))
    };

    let range = next("address range")?;
    let permissions = next("permissions")?.to_string();
    let offset = next("offset")?;
    let device = next("device")?;
    let inode = next("inode")?;
    let path = parts
        .next()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string);

    let (start, end) = range
        .split_once('-')
        .and_then(|(s, e)| {
            Some((
                u64::from_str_radix(s, 16).ok()?,
                u64::from_str_radix(e, 16).ok()?,
            ))
        })
        .ok_or_else(|| ProcError::malformed(pid, "maps", format!("bad range {:?}", range)))?;
    let offset = u64::from_str_radix(offset, 16)
        .map_err(|_| ProcError::malformed(pid, "maps", format!("bad offset {:?}", offset)))?;
    let inode = inode
        .parse::<u64>()
        .map_err(|_| ProcError::malformed(pid, "maps", format!("bad inode {:?}", inode)))?;

    let device = match devices {
        Some(table) => table.display(device),
        None => device.to_string(),
    };

    Ok(MappedRegion {
        start,
        end,
        permissions,
        offset,
        device,
        inode,
        path,
    })
}

/// Reads and parses the memory maps of a process directory.
pub fn read_memory_maps(
    pid: u32,
    pid_dir: &Path,
    devices: Option<&DeviceTable>,
) -> Result<Vec<MappedRegion>> {
    let path = pid_dir.join("maps");
    let content = fs::read_to_string(&path).map_err(|e| ProcError::from_io(pid, "maps", &path, e))?;

    let mut regions = Vec::new();
    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        match parse_maps_line(pid, line, devices) {
            Ok(region) => regions.push(region),
            Err(e) => debug!("Skipping maps line of process {}: {}", pid, e),
        }
    }
    Ok(regions)
}

/// Distinct file-backed paths of a set of regions, in first-seen order.
pub fn mapped_libraries(regions: &[MappedRegion]) -> Vec<String> {
    let mut seen = HashSet::new();
    regions
        .iter()
        .filter_map(|r| r.path.as_deref())
        .filter(|p| p.starts_with('/'))
        .filter(|p| seen.insert(p.to_string()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::tempdir;

    #[test]
    fn test_classify_descriptor_targets() {
        assert_eq!(DescriptorKind::classify("/dev/null"), DescriptorKind::File);
        assert_eq!(DescriptorKind::classify("socket:[8842]"), DescriptorKind::Socket);
        assert_eq!(DescriptorKind::classify("pipe:[123664]"), DescriptorKind::Pipe);
        assert_eq!(
            DescriptorKind::classify("anon_inode:[eventfd]"),
            DescriptorKind::AnonInode
        );
        assert_eq!(
            DescriptorKind::classify("net:[4026531840]"),
            DescriptorKind::Other("net".to_string())
        );
        assert_eq!(DescriptorKind::Socket.to_string(), "socket");
    }

    #[test]
    fn test_read_descriptors_from_directory() {
        let dir = tempdir().expect("Failed to create temp dir");
        let fd_dir = dir.path().join("fd");
        fs::create_dir(&fd_dir).unwrap();
        symlink("/dev/null", fd_dir.join("0")).unwrap();
        symlink("socket:[8842]", fd_dir.join("3")).unwrap();
        symlink("pipe:[99]", fd_dir.join("10")).unwrap();

        let fds = read_descriptors(5, dir.path()).expect("fd listing should succeed");
        assert_eq!(fds.len(), 3);
        assert_eq!(fds[0].fd, 0);
        assert_eq!(fds[0].kind, DescriptorKind::File);
        assert_eq!(fds[1].target, "socket:[8842]");
        assert_eq!(fds[1].kind, DescriptorKind::Socket);
        assert_eq!(fds[2].fd, 10);
        assert_eq!(fds[2].kind, DescriptorKind::Pipe);
    }

    #[test]
    fn test_read_descriptors_missing_dir_is_not_found() {
        let dir = tempdir().expect("Failed to create temp dir");
        let err = read_descriptors(5, &dir.path().join("gone")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_parse_maps_line_with_path() {
        let line = "7f1c2a000000-7f1c2a022000 r--p 00000000 08:01 1048602                    /usr/lib/x86_64-linux-gnu/libc.so.6";
        let region = parse_maps_line(1, line, None).expect("line should parse");
        assert_eq!(region.start, 0x7f1c2a000000);
        assert_eq!(region.end, 0x7f1c2a022000);
        assert_eq!(region.permissions, "r--p");
        assert_eq!(region.offset, 0);
        assert_eq!(region.device, "08:01");
        assert_eq!(region.inode, 1048602);
        assert_eq!(
            region.path.as_deref(),
            Some("/usr/lib/x86_64-linux-gnu/libc.so.6")
        );
    }

    #[test]
    fn test_parse_maps_line_anonymous_and_spaces() {
        let anon = "7ffd1000-7ffd2000 rw-p 00000000 00:00 0 ";
        assert_eq!(parse_maps_line(1, anon, None).unwrap().path, None);

        let spaced = "1000-2000 r-xp 00001000 08:01 77          /opt/My App/lib core.so";
        assert_eq!(
            parse_maps_line(1, spaced, None).unwrap().path.as_deref(),
            Some("/opt/My App/lib core.so")
        );

        assert!(parse_maps_line(1, "garbage", None).is_err());
    }

    #[test]
    fn test_device_table_resolution_and_fallback() {
        let table = DeviceTable::parse(
            "major minor  #blocks  name\n\n   8        0  500107608 sda\n   8        1     524288 sda1\n 259        0  1000204632 nvme0n1\n",
        );
        assert_eq!(table.lookup(8, 1).unwrap(), "sda1");
        assert!(matches!(
            table.lookup(9, 9),
            Err(ProcError::DeviceNameUnresolved { major: 9, minor: 9 })
        ));
        assert_eq!(table.display("08:01"), "sda1");
        assert_eq!(table.display("fd:03"), "fd:03");
        assert_eq!(table.display("00:00"), "00:00");
    }

    #[test]
    fn test_mapped_libraries_distinct_in_order() {
        let content = "\
1000-2000 r--p 00000000 08:01 10 /usr/lib/libz.so.1
2000-3000 r-xp 00001000 08:01 10 /usr/lib/libz.so.1
3000-4000 rw-p 00000000 00:00 0 [heap]
4000-5000 r--p 00000000 08:01 11 /usr/lib/libc.so.6
5000-6000 rw-p 00000000 00:00 0
";
        let regions: Vec<MappedRegion> = content
            .lines()
            .map(|l| parse_maps_line(1, l, None).unwrap())
            .collect();
        assert_eq!(
            mapped_libraries(&regions),
            vec!["/usr/lib/libz.so.1", "/usr/lib/libc.so.6"]
        );
    }
}
