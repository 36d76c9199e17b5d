//! The authoritative in-memory process hierarchy.
//!
//! `ProcessTree` owns every node, resolves parent/child edges and applies
//! the additions, removals and metric updates of a refresh pass. It is only
//! ever mutated by the sampler; readers get a `TreeSnapshot` copy.
//!
//! Nodes live in a pid-keyed map. The synthetic root (pid 0) is not stored
//! in the map: its children are kept in `root_children` and it never appears
//! in a snapshot.

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use chrono::Utc;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{ProcError, Result};
use crate::events::{NodeLink, PassSummary};
use crate::process::{
    MetricCalculator, Metrics, ProcessInfo, ProcessRecord, ProcessSample, ProcessSource,
    ProcessState,
};
use crate::snapshot::{SnapshotNode, TreeSnapshot};
use crate::system::SystemSample;

/// Reserved id of the synthetic root, outside the real pid space.
pub const ROOT_PID: u32 = 0;

/// Column a children list can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Name,
    Pid,
    Owner,
    State,
    Cpu,
    Memory,
    Rss,
    Vsize,
    Priority,
    Nice,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "name" => Ok(SortKey::Name),
            "pid" => Ok(SortKey::Pid),
            "owner" | "user" => Ok(SortKey::Owner),
            "state" => Ok(SortKey::State),
            "cpu" => Ok(SortKey::Cpu),
            "memory" | "mem" => Ok(SortKey::Memory),
            "rss" => Ok(SortKey::Rss),
            "vsize" | "virt" => Ok(SortKey::Vsize),
            "priority" | "prio" => Ok(SortKey::Priority),
            "nice" => Ok(SortKey::Nice),
            other => Err(format!("unknown sort key '{}'", other)),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SortKey::Name => "name",
            SortKey::Pid => "pid",
            SortKey::Owner => "owner",
            SortKey::State => "state",
            SortKey::Cpu => "cpu",
            SortKey::Memory => "memory",
            SortKey::Rss => "rss",
            SortKey::Vsize => "vsize",
            SortKey::Priority => "priority",
            SortKey::Nice => "nice",
        };
        f.write_str(s)
    }
}

/// Which children lists a sort applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortScope {
    /// Only the top-level processes.
    #[default]
    Root,
    /// Every children list in the tree.
    Global,
}

impl FromStr for SortScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "root" => Ok(SortScope::Root),
            "global" => Ok(SortScope::Global),
            other => Err(format!("unknown sort scope '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub key: SortKey,
    pub ascending: bool,
    pub scope: SortScope,
}

/// Compares two field blocks by a sort key.
pub fn compare_by(key: SortKey, a: &ProcessInfo, b: &ProcessInfo) -> Ordering {
    match key {
        SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        SortKey::Pid => a.pid.cmp(&b.pid),
        SortKey::Owner => a
            .owner_name()
            .to_lowercase()
            .cmp(&b.owner_name().to_lowercase()),
        SortKey::State => a.state.cmp(&b.state),
        SortKey::Cpu => a.cpu_percent.total_cmp(&b.cpu_percent),
        SortKey::Memory => a.memory_percent.total_cmp(&b.memory_percent),
        SortKey::Rss => a.rss_bytes.cmp(&b.rss_bytes),
        SortKey::Vsize => a.vsize_bytes.cmp(&b.vsize_bytes),
        SortKey::Priority => a.priority.cmp(&b.priority),
        SortKey::Nice => a.nice.cmp(&b.nice),
    }
}

/// What a reconcile or metrics update changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeChanges {
    pub added: Vec<NodeLink>,
    pub removed: Vec<u32>,
    pub reparented: Vec<NodeLink>,
    pub updated: usize,
    pub stale: Vec<u32>,
    pub vanished: usize,
    pub permission_denied: usize,
    pub malformed: usize,
}

impl TreeChanges {
    fn note_added(&mut self, link: NodeLink) {
        self.added.push(link);
    }

    /// Records a removal. A node added earlier in the same pass simply
    /// disappears from `added`; consumers never saw it.
    fn note_removed(&mut self, pid: u32) {
        let was_added = match self.added.iter().position(|l| l.pid == pid) {
            Some(idx) => {
                self.added.remove(idx);
                true
            }
            None => false,
        };
        self.reparented.retain(|l| l.pid != pid);
        self.stale.retain(|&p| p != pid);
        if !was_added && !self.removed.contains(&pid) {
            self.removed.push(pid);
        }
    }

    fn note_reparented(&mut self, link: NodeLink) {
        if let Some(added) = self.added.iter_mut().find(|l| l.pid == link.pid) {
            added.parent = link.parent;
        } else if let Some(moved) = self.reparented.iter_mut().find(|l| l.pid == link.pid) {
            moved.parent = link.parent;
        } else {
            self.reparented.push(link);
        }
    }

    /// Folds the changes of a later step of the same pass into this one.
    pub fn merge(&mut self, later: TreeChanges) {
        for pid in later.removed {
            self.note_removed(pid);
        }
        for link in later.added {
            self.note_added(link);
        }
        for link in later.reparented {
            self.note_reparented(link);
        }
        self.updated += later.updated;
        for pid in later.stale {
            if !self.stale.contains(&pid) {
                self.stale.push(pid);
            }
        }
        self.vanished += later.vanished;
        self.permission_denied += later.permission_denied;
        self.malformed += later.malformed;
    }

    pub fn into_summary(self, generation: u64, live: usize, duration_ms: f64) -> PassSummary {
        PassSummary {
            generation,
            added: self.added,
            removed: self.removed,
            reparented: self.reparented,
            metrics_updated: true,
            stale: self.stale,
            live,
            duration_ms,
        }
    }
}

#[derive(Debug, Clone)]
struct TreeNode {
    info: ProcessInfo,
    /// Current parent; `ROOT_PID` when top-level or not yet linked.
    parent: u32,
    /// Parent id that was not present when this node was linked.
    wanted_parent: Option<u32>,
    children: Vec<u32>,
    /// Insertion sequence; defines hierarchy order when no sort is active.
    seq: u64,
    forced_zombie: bool,
}

pub struct ProcessTree {
    source: Arc<dyn ProcessSource>,
    calculator: MetricCalculator,
    nodes: HashMap<u32, TreeNode>,
    root_children: Vec<u32>,
    sort: Option<SortSpec>,
    next_seq: u64,
    generation: u64,
}

impl ProcessTree {
    pub fn new(source: Arc<dyn ProcessSource>) -> Self {
        Self {
            source,
            calculator: MetricCalculator::new(),
            nodes: HashMap::new(),
            root_children: Vec::new(),
            sort: None,
            next_seq: 0,
            generation: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.nodes.contains_key(&pid)
    }

    /// Number of completed metric passes.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn sort_spec(&self) -> Option<SortSpec> {
        self.sort
    }

    pub fn info(&self, pid: u32) -> Option<&ProcessInfo> {
        self.nodes.get(&pid).map(|n| &n.info)
    }

    /// Parent of a tracked node (`ROOT_PID` for top-level nodes).
    pub fn parent_of(&self, pid: u32) -> Option<u32> {
        self.nodes.get(&pid).map(|n| n.parent)
    }

    /// Ordered children; `ROOT_PID` gives the top-level processes.
    pub fn children_of(&self, pid: u32) -> &[u32] {
        if pid == ROOT_PID {
            return &self.root_children;
        }
        self.nodes
            .get(&pid)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Full initial population from an enumerated id set.
    pub fn build(&mut self, pids: &[u32]) -> TreeChanges {
        self.nodes.clear();
        self.root_children.clear();
        self.calculator.clear();
        self.reconcile(pids)
    }

    /// Applies the current live id set: removes ids no longer observed and
    /// inserts newly observed ones with their freshly read parent.
    pub fn reconcile(&mut self, pids: &[u32]) -> TreeChanges {
        let mut changes = TreeChanges::default();
        let observed: HashSet<u32> = pids.iter().copied().filter(|&p| p != ROOT_PID).collect();

        let mut gone: Vec<u32> = self
            .nodes
            .keys()
            .copied()
            .filter(|p| !observed.contains(p))
            .collect();
        gone.sort_unstable();

        let mut orphans = Vec::new();
        for pid in gone {
            self.remove(pid, &mut orphans);
            changes.note_removed(pid);
        }

        let mut fresh: Vec<u32> = observed
            .into_iter()
            .filter(|p| !self.nodes.contains_key(p))
            .collect();
        fresh.sort_unstable();

        // insert everything first so a child read before its parent still links to it
        let inserted = self.insert_fresh(&fresh, &mut changes);
        for pid in inserted {
            let ppid = self.nodes.get(&pid).map_or(ROOT_PID, |n| n.info.ppid);
            let parent = self.link(pid, ppid);
            changes.note_added(NodeLink { pid, parent });
        }

        self.relink_orphans(orphans, &mut changes);
        self.resolve_pending(&mut changes);
        self.resort();
        changes
    }

    /// Re-reads the dynamic fields of every node and recomputes metrics.
    ///
    /// A node that vanished mid-pass is removed exactly like a reconcile
    /// removal; one that became unreadable keeps its previous values and is
    /// marked stale.
    pub fn update_metrics(&mut self, system: &SystemSample) -> TreeChanges {
        let mut changes = TreeChanges::default();
        self.generation += 1;

        let mut pids: Vec<u32> = self.nodes.keys().copied().collect();
        pids.sort_unstable();

        let source = Arc::clone(&self.source);
        let reads: Vec<(u32, Result<ProcessSample>)> = pids
            .par_iter()
            .map(|&pid| (pid, source.read_sample(pid)))
            .collect();

        let mut vanished = Vec::new();
        let mut reused = Vec::new();
        let mut moved = Vec::new();

        for (pid, res) in reads {
            match res {
                Ok(sample) => {
                    let known_start = match self.nodes.get(&pid) {
                        Some(n) => n.info.start_ticks,
                        None => continue,
                    };
                    if sample.start_ticks != known_start {
                        reused.push(pid);
                        continue;
                    }
                    let metrics = self.calculator.compute(pid, &sample, system);
                    if let Some(node) = self.nodes.get_mut(&pid) {
                        if sample.ppid != node.info.ppid {
                            moved.push((pid, sample.ppid));
                        }
                        apply_sample(&mut node.info, &sample, metrics, node.forced_zombie);
                        changes.updated += 1;
                    }
                }
                Err(ProcError::NotFound { .. }) => {
                    debug!("Process {} exited during metrics pass", pid);
                    changes.vanished += 1;
                    vanished.push(pid);
                }
                Err(e) => {
                    note_read_failure(pid, &e, &mut changes);
                    if let Some(node) = self.nodes.get_mut(&pid) {
                        node.info.stale = true;
                        changes.stale.push(pid);
                    }
                }
            }
        }

        let mut orphans = Vec::new();
        for pid in vanished {
            self.remove(pid, &mut orphans);
            changes.note_removed(pid);
        }

        for pid in reused {
            debug!("Pid {} was reused by a new process", pid);
            self.remove(pid, &mut orphans);
            changes.note_removed(pid);
            let read = self.source.read_process(pid);
            match read {
                Ok(record) => {
                    let sample = record.sample;
                    self.insert_node(record);
                    let metrics = self.calculator.compute(pid, &sample, system);
                    if let Some(node) = self.nodes.get_mut(&pid) {
                        let forced = node.forced_zombie;
                        apply_sample(&mut node.info, &sample, metrics, forced);
                    }
                    let parent = self.link(pid, sample.ppid);
                    changes.note_added(NodeLink { pid, parent });
                }
                Err(e) => note_read_failure(pid, &e, &mut changes),
            }
        }

        for (pid, ppid) in moved {
            let Some(previous) = self.parent_of(pid) else {
                continue;
            };
            orphans.retain(|&o| o != pid);
            let parent = self.link(pid, ppid);
            if parent.unwrap_or(ROOT_PID) != previous {
                changes.note_reparented(NodeLink { pid, parent });
            }
        }

        self.relink_orphans(orphans, &mut changes);
        self.resolve_pending(&mut changes);
        self.resort();
        changes
    }

    /// Orders children lists by `spec`. Sorting is stable, so equal keys keep
    /// their previous relative order.
    pub fn sort_children(&mut self, spec: SortSpec) {
        if self.sort != Some(spec) {
            self.restore_order();
        }
        self.sort = Some(spec);
        self.resort();
    }

    /// Drops any active sort and restores strict hierarchy order.
    pub fn clear_sort(&mut self) {
        self.sort = None;
        self.restore_order();
    }

    /// Point-in-time copy safe to hand to concurrent readers.
    pub fn snapshot(&self) -> TreeSnapshot {
        let nodes = self
            .nodes
            .iter()
            .map(|(&pid, node)| {
                (
                    pid,
                    SnapshotNode {
                        info: node.info.clone(),
                        parent: (node.parent != ROOT_PID).then_some(node.parent),
                        children: node.children.clone(),
                    },
                )
            })
            .collect();

        TreeSnapshot {
            generation: self.generation,
            taken_at: Utc::now(),
            roots: self.root_children.clone(),
            nodes,
        }
    }

    fn insert_fresh(&mut self, fresh: &[u32], changes: &mut TreeChanges) -> Vec<u32> {
        let source = Arc::clone(&self.source);
        let reads: Vec<(u32, Result<ProcessRecord>)> = fresh
            .par_iter()
            .map(|&pid| (pid, source.read_process(pid)))
            .collect();

        let mut inserted = Vec::with_capacity(reads.len());
        for (pid, res) in reads {
            match res {
                Ok(record) => {
                    self.insert_node(record);
                    inserted.push(pid);
                }
                // retried on the next pass
                Err(e) => note_read_failure(pid, &e, changes),
            }
        }
        inserted
    }

    /// Inserts an unlinked node.
    fn insert_node(&mut self, record: ProcessRecord) {
        let pid = record.pid;
        let forced_zombie = record.forced_zombie;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.nodes.insert(
            pid,
            TreeNode {
                info: ProcessInfo::from_record(record),
                parent: ROOT_PID,
                wanted_parent: None,
                children: Vec::new(),
                seq,
                forced_zombie,
            },
        );
    }

    /// Removes a node. Its live children become orphans to be re-linked.
    fn remove(&mut self, pid: u32, orphans: &mut Vec<u32>) {
        self.detach(pid);
        if let Some(node) = self.nodes.remove(&pid) {
            for child in node.children {
                if let Some(c) = self.nodes.get_mut(&child) {
                    c.parent = ROOT_PID;
                    orphans.push(child);
                }
            }
        }
        orphans.retain(|&o| o != pid);
        self.calculator.forget(pid);
    }

    fn relink_orphans(&mut self, orphans: Vec<u32>, changes: &mut TreeChanges) {
        let orphans: Vec<u32> = orphans
            .into_iter()
            .filter(|p| self.nodes.contains_key(p))
            .collect();
        if orphans.is_empty() {
            return;
        }

        let source = Arc::clone(&self.source);
        let reads: Vec<(u32, Result<ProcessSample>)> = orphans
            .par_iter()
            .map(|&pid| (pid, source.read_sample(pid)))
            .collect();

        for (pid, res) in reads {
            let ppid = match res {
                Ok(sample) => {
                    if let Some(node) = self.nodes.get_mut(&pid) {
                        node.info.ppid = sample.ppid;
                    }
                    sample.ppid
                }
                Err(e) => {
                    // the old parent is gone; wait at the root for the next pass
                    debug!("Could not re-resolve parent of orphan {}: {}", pid, e);
                    ROOT_PID
                }
            };
            let parent = self.link(pid, ppid);
            changes.note_reparented(NodeLink { pid, parent });
        }
    }

    /// Re-links top-level nodes whose wanted parent has appeared.
    fn resolve_pending(&mut self, changes: &mut TreeChanges) {
        let pending: Vec<(u32, u32)> = self
            .root_children
            .iter()
            .filter_map(|&pid| {
                let wanted = self.nodes.get(&pid)?.wanted_parent?;
                self.nodes.contains_key(&wanted).then_some((pid, wanted))
            })
            .collect();

        for (pid, wanted) in pending {
            let parent = self.link(pid, wanted);
            if parent.is_some() {
                changes.note_reparented(NodeLink { pid, parent });
            }
        }
    }

    /// Attaches `pid` under `ppid`, or under the root when `ppid` is unknown,
    /// younger than the node, or would close a cycle. Returns the parent
    /// actually used (`None` for the root).
    fn link(&mut self, pid: u32, ppid: u32) -> Option<u32> {
        let start = self.nodes.get(&pid).map_or(0, |n| n.info.start_ticks);
        let usable = ppid != ROOT_PID
            && ppid != pid
            && self
                .nodes
                .get(&ppid)
                .is_some_and(|p| p.info.start_ticks <= start)
            && !self.is_descendant(ppid, pid);
        let target = if usable { ppid } else { ROOT_PID };

        self.detach(pid);
        if let Some(node) = self.nodes.get_mut(&pid) {
            node.parent = target;
            node.wanted_parent =
                (target == ROOT_PID && ppid != ROOT_PID && ppid != pid).then_some(ppid);
        }
        self.attach(pid, target);

        (target != ROOT_PID).then_some(target)
    }

    /// True when `candidate` sits in the subtree of `ancestor`.
    fn is_descendant(&self, candidate: u32, ancestor: u32) -> bool {
        let mut current = candidate;
        for _ in 0..=self.nodes.len() {
            if current == ancestor {
                return true;
            }
            if current == ROOT_PID {
                return false;
            }
            current = self.nodes.get(&current).map_or(ROOT_PID, |n| n.parent);
        }
        // chain longer than the node count means a cycle
        true
    }

    fn detach(&mut self, pid: u32) {
        let Some(parent) = self.nodes.get(&pid).map(|n| n.parent) else {
            return;
        };
        if let Some(list) = self.children_mut(parent) {
            list.retain(|&c| c != pid);
        }
    }

    fn attach(&mut self, pid: u32, parent: u32) {
        let seq = self.nodes.get(&pid).map_or(u64::MAX, |n| n.seq);
        let pos = {
            let list = self.children_of(parent);
            if self.sort.is_some() {
                // placed by the next resort
                list.len()
            } else {
                list.partition_point(|c| self.nodes.get(c).map_or(0, |n| n.seq) < seq)
            }
        };
        if let Some(list) = self.children_mut(parent) {
            list.insert(pos, pid);
        }
    }

    fn children_mut(&mut self, pid: u32) -> Option<&mut Vec<u32>> {
        if pid == ROOT_PID {
            return Some(&mut self.root_children);
        }
        self.nodes.get_mut(&pid).map(|n| &mut n.children)
    }

    fn resort(&mut self) {
        let Some(spec) = self.sort else {
            return;
        };
        let cmp = |nodes: &HashMap<u32, TreeNode>, a: &u32, b: &u32| {
            let ord = match (nodes.get(a), nodes.get(b)) {
                (Some(x), Some(y)) => compare_by(spec.key, &x.info, &y.info),
                _ => Ordering::Equal,
            };
            if spec.ascending {
                ord
            } else {
                ord.reverse()
            }
        };
        self.reorder(spec.scope, cmp);
    }

    fn restore_order(&mut self) {
        let cmp = |nodes: &HashMap<u32, TreeNode>, a: &u32, b: &u32| {
            let seq = |p: &u32| nodes.get(p).map_or(u64::MAX, |n| n.seq);
            seq(a).cmp(&seq(b))
        };
        self.reorder(SortScope::Global, cmp);
    }

    fn reorder<F>(&mut self, scope: SortScope, cmp: F)
    where
        F: Fn(&HashMap<u32, TreeNode>, &u32, &u32) -> Ordering,
    {
        let mut top = std::mem::take(&mut self.root_children);
        top.sort_by(|a, b| cmp(&self.nodes, a, b));
        self.root_children = top;

        if scope == SortScope::Root {
            return;
        }
        let parents: Vec<u32> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.children.len() > 1)
            .map(|(&pid, _)| pid)
            .collect();
        for pid in parents {
            let mut list = match self.nodes.get_mut(&pid) {
                Some(n) => std::mem::take(&mut n.children),
                None => continue,
            };
            list.sort_by(|a, b| cmp(&self.nodes, a, b));
            if let Some(n) = self.nodes.get_mut(&pid) {
                n.children = list;
            }
        }
    }
}

/// Replaces the dynamic field block of a node in one step.
fn apply_sample(info: &mut ProcessInfo, sample: &ProcessSample, metrics: Metrics, forced_zombie: bool) {
    info.ppid = sample.ppid;
    info.state = if forced_zombie {
        ProcessState::Zombie
    } else {
        sample.state
    };
    info.priority = sample.priority;
    info.nice = sample.nice;
    info.rss_bytes = sample.rss_bytes;
    info.vsize_bytes = sample.vsize_bytes;
    info.cpu_ticks = sample.cpu_ticks;
    info.cpu_percent = metrics.cpu_percent;
    info.memory_percent = metrics.memory_percent;
    info.stale = false;
}

fn note_read_failure(pid: u32, err: &ProcError, changes: &mut TreeChanges) {
    match err {
        ProcError::NotFound { .. } => {
            debug!("Process {} exited before it could be read", pid);
            changes.vanished += 1;
        }
        ProcError::PermissionDenied { .. } => {
            debug!("Process {} is not readable: {}", pid, err);
            changes.permission_denied += 1;
        }
        ProcError::MalformedRecord { .. } => {
            warn!("Skipping update of process {}: {}", pid, err);
            changes.malformed += 1;
        }
        _ => debug!("Read of process {} failed: {}", pid, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Field;

    fn info(pid: u32, name: &str, cpu: f64) -> ProcessInfo {
        ProcessInfo {
            pid,
            tid: None,
            ppid: 0,
            name: name.to_string(),
            short_name: name.to_string(),
            cmdline: Field::Unavailable,
            exe: Field::Unavailable,
            cwd: Field::Unavailable,
            owner: Field::Unavailable,
            state: ProcessState::Sleeping,
            priority: 20,
            nice: 0,
            rss_bytes: 0,
            vsize_bytes: 0,
            cpu_ticks: 0,
            start_ticks: 0,
            cpu_percent: cpu,
            memory_percent: 0.0,
            stale: false,
        }
    }

    #[test]
    fn test_sort_key_parsing() {
        assert_eq!("CPU".parse::<SortKey>().unwrap(), SortKey::Cpu);
        assert_eq!("user".parse::<SortKey>().unwrap(), SortKey::Owner);
        assert_eq!("mem".parse::<SortKey>().unwrap(), SortKey::Memory);
        assert!("colour".parse::<SortKey>().is_err());
        assert_eq!("global".parse::<SortScope>().unwrap(), SortScope::Global);
        assert!("everywhere".parse::<SortScope>().is_err());
    }

    #[test]
    fn test_compare_by_name_is_case_insensitive() {
        let a = info(1, "bash", 0.0);
        let b = info(2, "Xorg", 0.0);
        assert_eq!(compare_by(SortKey::Name, &a, &b), Ordering::Less);
        assert_eq!(compare_by(SortKey::Pid, &b, &a), Ordering::Greater);
    }

    #[test]
    fn test_compare_by_cpu() {
        let a = info(1, "a", 12.5);
        let b = info(2, "b", 3.0);
        assert_eq!(compare_by(SortKey::Cpu, &a, &b), Ordering::Greater);
        assert_eq!(compare_by(SortKey::Cpu, &a, &a), Ordering::Equal);
    }

    #[test]
    fn test_changes_added_then_removed_cancels() {
        let mut changes = TreeChanges::default();
        changes.note_added(NodeLink { pid: 5, parent: None });
        changes.note_removed(5);
        assert!(changes.added.is_empty());
        assert!(changes.removed.is_empty());
    }

    #[test]
    fn test_changes_merge_keeps_reuse_as_remove_and_add() {
        let mut first = TreeChanges::default();
        first.note_reparented(NodeLink { pid: 9, parent: Some(1) });

        let mut later = TreeChanges::default();
        later.note_removed(7);
        later.note_added(NodeLink { pid: 7, parent: Some(1) });
        later.note_removed(9);
        first.merge(later);

        assert_eq!(first.removed, vec![7, 9]);
        assert_eq!(first.added, vec![NodeLink { pid: 7, parent: Some(1) }]);
        assert!(first.reparented.is_empty());
    }
}
