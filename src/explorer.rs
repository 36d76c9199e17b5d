//! Presentation-boundary facade.
//!
//! `ProcessExplorer` is what a front end talks to: snapshots and change
//! events from the engine, sort requests, handle search and the per-process
//! detail reads.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::engine::{EngineOptions, PassOutcome, RefreshEngine};
use crate::error::Result;
use crate::events::ChangeEvent;
use crate::process::{
    mapped_libraries, FileDescriptor, MappedRegion, ProcessInfo, ProcessSource, ProcfsReader,
};
use crate::search::{SearchIndex, SearchResults};
use crate::snapshot::TreeSnapshot;
use crate::stats::EngineStats;
use crate::system::{SystemReader, SystemSource};
use crate::tree::SortKey;

pub struct ProcessExplorer {
    engine: Arc<RefreshEngine>,
    search: SearchIndex,
    source: Arc<dyn ProcessSource>,
}

impl ProcessExplorer {
    pub fn new(
        source: Arc<dyn ProcessSource>,
        system: Arc<dyn SystemSource>,
        options: EngineOptions,
    ) -> Self {
        let engine = Arc::new(RefreshEngine::new(Arc::clone(&source), system, options));
        Self {
            engine,
            search: SearchIndex::new(Arc::clone(&source)),
            source,
        }
    }

    /// Explorer over a procfs mount.
    pub fn procfs(root: impl Into<PathBuf>, resolve_devices: bool, options: EngineOptions) -> Self {
        let root = root.into();
        let source = ProcfsReader::new(&root).with_device_resolution(resolve_devices);
        Self::new(Arc::new(source), Arc::new(SystemReader::new(root)), options)
    }

    pub fn engine(&self) -> &Arc<RefreshEngine> {
        &self.engine
    }

    pub fn snapshot(&self) -> Arc<TreeSnapshot> {
        self.engine.snapshot()
    }

    pub fn change_events(&self) -> broadcast::Receiver<ChangeEvent> {
        self.engine.subscribe()
    }

    pub fn set_sort(&self, key: SortKey, ascending: bool) -> bool {
        self.engine.set_sort(key, ascending)
    }

    pub fn clear_sort(&self) -> bool {
        self.engine.clear_sort()
    }

    /// Runs a pass now on the blocking pool.
    pub async fn refresh_now(&self) -> PassOutcome {
        self.engine.refresh_now().await
    }

    /// Searches the handles of every process in the current snapshot.
    pub fn find_handles(&self, text: &str) -> SearchResults {
        let snapshot = self.snapshot();
        self.search.find_by_substring(&snapshot, text)
    }

    pub fn descriptors(&self, pid: u32) -> Result<Vec<FileDescriptor>> {
        self.source.read_descriptors(pid)
    }

    pub fn memory_maps(&self, pid: u32) -> Result<Vec<MappedRegion>> {
        self.source.read_memory_maps(pid)
    }

    pub fn mapped_libraries(&self, pid: u32) -> Result<Vec<String>> {
        let regions = self.source.read_memory_maps(pid)?;
        Ok(mapped_libraries(&regions))
    }

    /// Threads of a process. Metrics are left at zero; threads are not sampled.
    pub fn threads(&self, pid: u32) -> Result<Vec<ProcessInfo>> {
        let records = self.source.read_threads(pid)?;
        Ok(records.into_iter().map(ProcessInfo::from_record).collect())
    }

    pub fn stats(&self) -> &EngineStats {
        self.engine.stats()
    }
}
