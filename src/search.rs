//! Handle search across every live process.
//!
//! Descriptors and memory maps are read fresh for each query; nothing is
//! cached between searches.

use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{ProcError, Result};
use crate::process::{mapped_libraries, DescriptorKind, ProcessSource};
use crate::snapshot::TreeSnapshot;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Descriptor(DescriptorKind),
    Library,
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchKind::Descriptor(kind) => write!(f, "{}", kind),
            MatchKind::Library => f.write_str("library"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandleMatch {
    pub pid: u32,
    pub process_name: String,
    pub kind: MatchKind,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchResults {
    /// Ordered by pid; descriptors before libraries within a process.
    pub matches: Vec<HandleMatch>,
    /// Processes whose handles could not be read.
    pub skipped: Vec<u32>,
}

pub struct SearchIndex {
    source: Arc<dyn ProcessSource>,
}

impl SearchIndex {
    pub fn new(source: Arc<dyn ProcessSource>) -> Self {
        Self { source }
    }

    /// Case-insensitive substring search over descriptor targets and mapped
    /// library paths of every process in `snapshot`.
    ///
    /// An empty needle matches nothing.
    pub fn find_by_substring(&self, snapshot: &TreeSnapshot, text: &str) -> SearchResults {
        let needle = text.to_lowercase();
        if needle.is_empty() {
            return SearchResults::default();
        }

        let targets: Vec<(u32, &str)> = snapshot
            .nodes
            .iter()
            .map(|(&pid, node)| (pid, node.info.name.as_str()))
            .collect();

        let per_process: Vec<(u32, Result<Vec<HandleMatch>>)> = targets
            .par_iter()
            .map(|&(pid, name)| (pid, self.search_process(pid, name, &needle)))
            .collect();

        let mut results = SearchResults::default();
        for (pid, outcome) in per_process {
            match outcome {
                Ok(found) => results.matches.extend(found),
                Err(ProcError::NotFound { .. }) => {
                    debug!("Process {} exited during handle search", pid);
                }
                Err(e @ ProcError::PermissionDenied { .. }) => {
                    debug!("Skipping process {} in handle search: {}", pid, e);
                    results.skipped.push(pid);
                }
                Err(e) => {
                    warn!("Skipping process {} in handle search: {}", pid, e);
                    results.skipped.push(pid);
                }
            }
        }
        results
    }

    fn search_process(&self, pid: u32, name: &str, needle: &str) -> Result<Vec<HandleMatch>> {
        let descriptors = self.source.read_descriptors(pid)?;
        let regions = self.source.read_memory_maps(pid)?;

        let fds = descriptors
            .into_iter()
            .filter(|d| d.target.to_lowercase().contains(needle))
            .map(|d| HandleMatch {
                pid,
                process_name: name.to_string(),
                kind: MatchKind::Descriptor(d.kind),
                name: d.target,
            });

        let libraries = mapped_libraries(&regions)
            .into_iter()
            .filter(|path| path.to_lowercase().contains(needle))
            .map(|path| HandleMatch {
                pid,
                process_name: name.to_string(),
                kind: MatchKind::Library,
                name: path,
            });

        Ok(fds.chain(libraries).collect())
    }
}
