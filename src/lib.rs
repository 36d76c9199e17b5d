//! Herakles Process Explorer Library
//!
//! This library samples the kernel's per-process interface and maintains a
//! live, sorted process hierarchy with derived CPU and memory metrics. It is
//! front-end agnostic: a presentation layer reads snapshots, listens for
//! change events and issues sort and search requests.
//!
//! # Features
//!
//! - **Process Tree**: Parent/child hierarchy reconciled on every pass
//! - **Live Metrics**: CPU% from tick deltas, memory% from resident size
//! - **Change Events**: Batched add/remove/reparent notifications per pass
//! - **Handle Search**: Substring search over open descriptors and libraries
//! - **Degraded Reads**: Unreadable fields are marked, never fatal
//!
//! # Usage
//!
//! ```rust,no_run
//! use herakles_process_explorer::{EngineOptions, ProcessExplorer, SortKey};
//!
//! let explorer = ProcessExplorer::procfs("/proc", true, EngineOptions::default());
//!
//! // One synchronous refresh pass
//! explorer.engine().run_pass();
//! explorer.set_sort(SortKey::Cpu, false);
//!
//! let snapshot = explorer.snapshot();
//! for (depth, node) in snapshot.walk() {
//!     println!("{}{} {:.1}%", "  ".repeat(depth), node.info.name, node.info.cpu_percent);
//! }
//!
//! for hit in explorer.find_handles("libssl").matches {
//!     println!("{} {} {}", hit.pid, hit.kind, hit.name);
//! }
//! ```

pub mod engine;
pub mod error;
pub mod events;
pub mod explorer;
pub mod process;
pub mod search;
pub mod snapshot;
pub mod stats;
pub mod system;
pub mod tree;

// Re-export main types for convenience
pub use engine::{EngineOptions, EngineState, PassOutcome, RefreshEngine};
pub use error::{ProcError, Result};
pub use events::{ChangeEvent, NodeLink, PassSummary};
pub use explorer::ProcessExplorer;
pub use process::{
    DescriptorKind, Field, FileDescriptor, MappedRegion, MetricCalculator, Owner, ProcessInfo,
    ProcessRecord, ProcessSample, ProcessSource, ProcessState, ProcfsReader,
};
pub use search::{HandleMatch, MatchKind, SearchIndex, SearchResults};
pub use snapshot::{SnapshotNode, TreeSnapshot};
pub use stats::{EngineStats, EngineStatsReport};
pub use system::{SystemReader, SystemSample, SystemSource};
pub use tree::{ProcessTree, SortKey, SortScope, SortSpec, TreeChanges, ROOT_PID};
