//! Change notifications published after each refresh pass.

use serde::Serialize;

/// A node and its resolved parent (`None` for top-level processes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeLink {
    pub pid: u32,
    pub parent: Option<u32>,
}

/// Batched description of one completed pass.
///
/// Consumers apply `removed` before `added`: a pid reused within a pass is
/// reported in both lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PassSummary {
    pub generation: u64,
    pub added: Vec<NodeLink>,
    pub removed: Vec<u32>,
    pub reparented: Vec<NodeLink>,
    /// Every still-live node carries the metrics of this pass.
    pub metrics_updated: bool,
    /// Nodes whose dynamic fields could not be refreshed this pass.
    pub stale: Vec<u32>,
    pub live: usize,
    pub duration_ms: f64,
}

impl PassSummary {
    pub fn is_topology_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.reparented.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChangeEvent {
    Pass(PassSummary),
    /// A system-wide read failed; the previous tree state was retained.
    PassFailed { generation: u64, reason: String },
    /// Child ordering changed after a sort request.
    Resorted { generation: u64 },
}

impl ChangeEvent {
    pub fn generation(&self) -> u64 {
        match self {
            ChangeEvent::Pass(s) => s.generation,
            ChangeEvent::PassFailed { generation, .. } => *generation,
            ChangeEvent::Resorted { generation } => *generation,
        }
    }
}
