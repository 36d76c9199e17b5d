//! Immutable point-in-time view of the process tree.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::process::ProcessInfo;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotNode {
    pub info: ProcessInfo,
    /// `None` for top-level processes; the synthetic root is never exposed.
    pub parent: Option<u32>,
    pub children: Vec<u32>,
}

/// Read-only copy of the tree handed to foreground readers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeSnapshot {
    pub generation: u64,
    pub taken_at: DateTime<Utc>,
    /// Ordered top-level pids (children of the synthetic root).
    pub roots: Vec<u32>,
    pub nodes: BTreeMap<u32, SnapshotNode>,
}

impl TreeSnapshot {
    pub fn empty() -> Self {
        Self {
            generation: 0,
            taken_at: Utc::now(),
            roots: Vec::new(),
            nodes: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, pid: u32) -> Option<&SnapshotNode> {
        self.nodes.get(&pid)
    }

    pub fn children(&self, pid: u32) -> &[u32] {
        self.nodes
            .get(&pid)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Number of hops from `pid` up to the synthetic root, or `None` if the
    /// chain is broken or cyclic.
    pub fn depth(&self, pid: u32) -> Option<usize> {
        let mut hops = 0;
        let mut current = self.nodes.get(&pid)?;
        loop {
            hops += 1;
            match current.parent {
                None => return Some(hops),
                Some(parent) => {
                    if hops > self.nodes.len() {
                        return None;
                    }
                    current = self.nodes.get(&parent)?;
                }
            }
        }
    }

    /// Depth-first walk in display order, yielding `(depth, node)` with
    /// top-level nodes at depth 0.
    pub fn walk(&self) -> Vec<(usize, &SnapshotNode)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(usize, u32)> = self.roots.iter().rev().map(|&p| (0, p)).collect();
        while let Some((depth, pid)) = stack.pop() {
            let Some(node) = self.nodes.get(&pid) else {
                continue;
            };
            out.push((depth, node));
            stack.extend(node.children.iter().rev().map(|&c| (depth + 1, c)));
        }
        out
    }
}

impl Default for TreeSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}
