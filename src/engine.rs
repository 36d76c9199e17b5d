//! Periodic sampling and publication of the process tree.
//!
//! The `RefreshEngine` owns the live `ProcessTree`. A pass enumerates ids,
//! reads the system counters, reconciles the tree, updates metrics and then
//! publishes an immutable snapshot followed by one change event. Readers
//! only ever see the last published snapshot, never a half-applied pass.
//!
//! Passes can be triggered by the background interval or on demand; a
//! trigger that arrives while a pass is running is coalesced into it.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Notify};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use crate::error::ProcError;
use crate::events::ChangeEvent;
use crate::process::ProcessSource;
use crate::snapshot::TreeSnapshot;
use crate::stats::EngineStats;
use crate::system::SystemSource;
use crate::tree::{ProcessTree, SortKey, SortScope, SortSpec};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(2000);
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineOptions {
    pub refresh_interval: Duration,
    /// Events buffered per subscriber before the slowest one lags.
    pub event_capacity: usize,
    /// Scope applied to every `set_sort` request.
    pub sort_scope: SortScope,
    pub initial_sort: Option<SortSpec>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            sort_scope: SortScope::Root,
            initial_sort: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Sampling,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    Completed { generation: u64 },
    /// A system-wide read failed and the previous snapshot was kept.
    Failed { reason: String },
    /// Another pass was already running.
    Skipped,
}

#[derive(Debug, Clone, Copy)]
enum SortRequest {
    Set(SortSpec),
    Clear,
}

/// Clears the sampling flag even if the pass panics.
struct SamplingGuard<'a>(&'a AtomicBool);

impl Drop for SamplingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct RefreshEngine {
    processes: Arc<dyn ProcessSource>,
    system: Arc<dyn SystemSource>,
    tree: Mutex<ProcessTree>,
    published: RwLock<Arc<TreeSnapshot>>,
    sampling: AtomicBool,
    built: AtomicBool,
    pending_sort: Mutex<Option<SortRequest>>,
    events: broadcast::Sender<ChangeEvent>,
    wake: Notify,
    options: EngineOptions,
    stats: EngineStats,
}

impl RefreshEngine {
    pub fn new(
        processes: Arc<dyn ProcessSource>,
        system: Arc<dyn SystemSource>,
        options: EngineOptions,
    ) -> Self {
        let mut tree = ProcessTree::new(Arc::clone(&processes));
        if let Some(spec) = options.initial_sort {
            tree.sort_children(spec);
        }
        let (events, _) = broadcast::channel(options.event_capacity.max(1));

        Self {
            processes,
            system,
            tree: Mutex::new(tree),
            published: RwLock::new(Arc::new(TreeSnapshot::empty())),
            sampling: AtomicBool::new(false),
            built: AtomicBool::new(false),
            pending_sort: Mutex::new(None),
            events,
            wake: Notify::new(),
            options,
            stats: EngineStats::new(),
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn state(&self) -> EngineState {
        if self.sampling.load(Ordering::Acquire) {
            EngineState::Sampling
        } else {
            EngineState::Idle
        }
    }

    /// The last published snapshot. Cheap; never blocks on a running pass.
    pub fn snapshot(&self) -> Arc<TreeSnapshot> {
        let guard = self.published.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    /// Wakes the background loop for an early pass.
    pub fn request_refresh(&self) {
        self.wake.notify_one();
    }

    /// Runs one pass synchronously on the calling thread.
    #[instrument(skip(self))]
    pub fn run_pass(&self) -> PassOutcome {
        if self
            .sampling
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Refresh pass already in progress, coalescing request");
            self.stats.record_coalesced();
            return PassOutcome::Skipped;
        }
        let _guard = SamplingGuard(&self.sampling);
        self.sample_once()
    }

    /// Runs one pass on the blocking pool.
    pub async fn refresh_now(self: &Arc<Self>) -> PassOutcome {
        let engine = Arc::clone(self);
        match tokio::task::spawn_blocking(move || engine.run_pass()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Refresh pass task failed: {}", e);
                PassOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Samples on the configured interval until `shutdown` resolves.
    ///
    /// The first pass runs immediately. Ticks missed while a slow pass was
    /// running are skipped rather than replayed.
    pub async fn run<F>(self: Arc<Self>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.options.refresh_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(
            "Refresh loop started (interval {} ms)",
            self.options.refresh_interval.as_millis()
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Refresh loop stopping");
                    break;
                }
                _ = interval.tick() => {}
                _ = self.wake.notified() => {
                    debug!("Early refresh requested");
                }
            }

            if let PassOutcome::Failed { reason } = self.refresh_now().await {
                debug!("Pass failed, keeping previous snapshot: {}", reason);
            }
        }
    }

    /// Orders children by `key` starting with the next published snapshot.
    ///
    /// Applied immediately when no pass is running, otherwise at the end of
    /// the running pass. Returns whether it was applied immediately.
    pub fn set_sort(&self, key: SortKey, ascending: bool) -> bool {
        let spec = SortSpec {
            key,
            ascending,
            scope: self.options.sort_scope,
        };
        self.request_sort(SortRequest::Set(spec))
    }

    /// Restores hierarchy order. Same scheduling as `set_sort`.
    pub fn clear_sort(&self) -> bool {
        self.request_sort(SortRequest::Clear)
    }

    fn request_sort(&self, request: SortRequest) -> bool {
        // a pass takes the queue lock before releasing the tree, so a request
        // queued here is always seen by the pass holding the tree
        let mut pending = lock(&self.pending_sort);
        let mut tree = match self.tree.try_lock() {
            Ok(tree) => tree,
            Err(TryLockError::Poisoned(p)) => p.into_inner(),
            Err(TryLockError::WouldBlock) => {
                debug!("Sort request queued behind running pass");
                *pending = Some(request);
                return false;
            }
        };
        *pending = None;
        apply_sort(&mut tree, request);

        let snapshot = Arc::new(tree.snapshot());
        let generation = snapshot.generation;
        self.publish(snapshot);
        drop(tree);
        drop(pending);

        self.send(ChangeEvent::Resorted { generation });
        true
    }

    /// Applies a queued sort request while the pass still holds the tree.
    ///
    /// Returns the queue guard so the caller releases the tree first.
    fn take_pending_sort(
        &self,
        tree: &mut ProcessTree,
    ) -> (MutexGuard<'_, Option<SortRequest>>, bool) {
        let mut pending = lock(&self.pending_sort);
        let applied = match pending.take() {
            Some(request) => {
                apply_sort(tree, request);
                true
            }
            None => false,
        };
        (pending, applied)
    }

    fn sample_once(&self) -> PassOutcome {
        let start = Instant::now();
        let mut tree = lock(&self.tree);

        // system-wide reads come first so a failure leaves the tree untouched
        let pids = match self.processes.pids() {
            Ok(pids) => pids,
            Err(e) => return self.fail(tree, e),
        };
        let system = match self.system.sample() {
            Ok(sample) => sample,
            Err(e) => return self.fail(tree, e),
        };

        let mut changes = if self.built.load(Ordering::Acquire) {
            tree.reconcile(&pids)
        } else {
            debug!("Building initial tree from {} pids", pids.len());
            tree.build(&pids)
        };
        self.built.store(true, Ordering::Release);

        changes.merge(tree.update_metrics(&system));
        let (pending, _) = self.take_pending_sort(&mut tree);

        let snapshot = Arc::new(tree.snapshot());
        let generation = snapshot.generation;
        let live = snapshot.len();
        self.publish(snapshot);
        drop(tree);
        drop(pending);

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        self.stats.record_pass(
            duration_ms,
            live,
            changes.added.len(),
            changes.removed.len(),
            changes.reparented.len(),
            changes.stale.len(),
        );
        self.stats.record_read_failures(
            changes.vanished,
            changes.permission_denied,
            changes.malformed,
        );

        debug!(
            generation,
            live,
            added = changes.added.len(),
            removed = changes.removed.len(),
            reparented = changes.reparented.len(),
            stale = changes.stale.len(),
            "Pass completed in {:.2} ms",
            duration_ms
        );

        self.send(ChangeEvent::Pass(
            changes.into_summary(generation, live, duration_ms),
        ));
        PassOutcome::Completed { generation }
    }

    fn fail(&self, mut tree: MutexGuard<'_, ProcessTree>, err: ProcError) -> PassOutcome {
        warn!("Refresh pass failed: {}", err);
        self.stats.record_pass_failure();

        // sorts queued behind the failed pass still apply to the kept tree
        let (pending, resorted) = self.take_pending_sort(&mut tree);
        let generation = tree.generation();
        if resorted {
            self.publish(Arc::new(tree.snapshot()));
        }
        drop(tree);
        drop(pending);

        let reason = err.to_string();
        self.send(ChangeEvent::PassFailed {
            generation,
            reason: reason.clone(),
        });
        if resorted {
            self.send(ChangeEvent::Resorted { generation });
        }
        PassOutcome::Failed { reason }
    }

    fn publish(&self, snapshot: Arc<TreeSnapshot>) {
        let mut guard = self.published.write().unwrap_or_else(PoisonError::into_inner);
        *guard = snapshot;
    }

    fn send(&self, event: ChangeEvent) {
        if self.events.send(event).is_err() {
            debug!("No change event subscribers");
        }
    }
}

fn apply_sort(tree: &mut ProcessTree, request: SortRequest) {
    match request {
        SortRequest::Set(spec) => {
            debug!(key = %spec.key, ascending = spec.ascending, "Applying sort");
            tree.sort_children(spec);
        }
        SortRequest::Clear => {
            debug!("Clearing sort");
            tree.clear_sort();
        }
    }
}
