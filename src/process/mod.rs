//! Process-related modules for reading and deriving per-process state.
//!
//! This module provides:
//! - `scanner`: Process and thread id discovery
//! - `stat`: Parsers for stat, status and cmdline records
//! - `record`: Record, field and state types
//! - `reader`: The `ProcessSource` seam and its procfs implementation
//! - `descriptors`: Open descriptors, memory maps and device names
//! - `users`: Uid to user name resolution
//! - `cpu`: CPU and memory percentage calculation

pub mod cpu;
pub mod descriptors;
pub mod reader;
pub mod record;
pub mod scanner;
pub mod stat;
pub mod users;

// Re-export commonly used types
pub use cpu::{MetricCalculator, Metrics};
pub use descriptors::{mapped_libraries, DescriptorKind, DeviceTable, FileDescriptor, MappedRegion};
pub use reader::{ProcessSource, ProcfsReader, DEFAULT_PROC_ROOT};
pub use record::{Field, Owner, ProcessInfo, ProcessRecord, ProcessSample, ProcessState};
pub use stat::{CLK_TCK, PAGE_SIZE};
