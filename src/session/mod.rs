/// Review session engine
///
/// This module drives one scope from first item to deletion:
/// - `prefetch`: bounded look-ahead cache of loaded media
/// - `velocity`: streaks, decision rate and milestones
/// - `writer`: serialized fire-and-forget persistence
/// - `estimate`: storage-freed estimates for deleted items
pub mod error;
pub mod estimate;
pub mod prefetch;
pub mod velocity;
pub mod writer;

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub use error::{Result, SessionError};
pub use estimate::SizeEstimator;
pub use prefetch::{CacheWindow, PrefetchCache};
pub use velocity::{Milestone, Signal, VelocitySummary, VelocityTracker};
pub use writer::PersistWriter;

use crate::config::EngineConfig;
use crate::media::delete::DeletionGateway;
use crate::media::loader::{MediaLoader, TargetSize};
use crate::state::data::{Collection, Decision, DecisionKind, DeletionBatch, MediaRef, ScopeId, ScopeSummary};
use crate::state::decision_log::DecisionLog;
use crate::state::store::PersistenceGateway;

const SIGNAL_CAPACITY: usize = 64;

/// Lifecycle of a review session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No scope started yet
    Loading,
    /// Items remain to be decided
    Active,
    /// Every item has a decision; awaiting deletion
    Finished,
    /// The scope has no items
    Empty,
    /// The scope was completed or abandoned
    Closed,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Loading => "loading",
            SessionPhase::Active => "active",
            SessionPhase::Finished => "finished",
            SessionPhase::Empty => "empty",
            SessionPhase::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Owns the traversal state of one scope.
///
/// Every method is synchronous and updates state before returning. Media
/// loading and persistence happen on background tasks, so the engine must
/// be created and driven inside a tokio runtime.
pub struct SessionEngine<L: MediaLoader, P: PersistenceGateway> {
    loader: Arc<L>,
    gateway: Arc<P>,
    writer: PersistWriter,
    window: CacheWindow,
    cache: PrefetchCache<L::Handle>,
    prefetches: JoinSet<()>,
    target: TargetSize,

    collection: Arc<Collection>,
    log: DecisionLog,
    current_index: usize,
    phase: SessionPhase,

    tracker: VelocityTracker,
    estimator: Box<dyn SizeEstimator>,
    signals: broadcast::Sender<Signal>,
}

impl<L: MediaLoader, P: PersistenceGateway> SessionEngine<L, P> {
    pub fn new(loader: Arc<L>, gateway: Arc<P>, config: &EngineConfig) -> Self {
        let window = CacheWindow::from(&config.cache);
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);

        Self {
            loader,
            writer: PersistWriter::spawn(Arc::clone(&gateway)),
            gateway,
            window,
            cache: PrefetchCache::new(window),
            prefetches: JoinSet::new(),
            target: TargetSize::new(config.cache.target_width, config.cache.target_height),
            collection: Arc::new(Collection::empty("")),
            log: DecisionLog::new(),
            current_index: 0,
            phase: SessionPhase::Loading,
            tracker: VelocityTracker::new(&config.velocity),
            estimator: estimate::estimator_for(config.velocity.size_estimate),
            signals,
        }
    }

    /// Replace the storage-freed estimator
    pub fn with_estimator(mut self, estimator: Box<dyn SizeEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    /// Begin a scope, optionally from a saved position and decision log.
    ///
    /// A position inside `[0, len)` resumes there. A position of `len` with
    /// a full valid log resumes a scope that was decided but never deleted.
    /// Anything else starts over from the first item.
    pub fn start(&mut self, collection: Collection, resume_from: Option<usize>, pending: Option<Vec<Decision>>) {
        self.phase = SessionPhase::Loading;
        self.reset_cache();

        let collection = Arc::new(collection);
        let len = collection.len();

        self.log = match resume_from {
            Some(position) if position < len => {
                let pending = pending.unwrap_or_default();
                let persisted = pending.len();
                let mut log = DecisionLog::restore(pending, &collection);
                log.truncate(position);

                if log.len() != position || log.len() != persisted {
                    debug!(
                        scope = %collection.scope(),
                        position,
                        restored = log.len(),
                        "resume point moved back to the restored log"
                    );
                    self.writer.save_pending(collection.scope(), log.all());
                    self.writer.save_position(collection.scope(), log.len());
                }
                log
            }
            Some(position) if position == len && len > 0 => {
                // Completed scopes have no pending log left
                let log = DecisionLog::restore(pending.unwrap_or_default(), &collection);
                if log.len() == len {
                    debug!(scope = %collection.scope(), "restored a decided scope awaiting deletion");
                    log
                } else {
                    DecisionLog::new()
                }
            }
            _ => DecisionLog::new(),
        };
        self.current_index = self.log.len();
        self.collection = collection;
        self.tracker.reset();

        self.phase = if len == 0 {
            SessionPhase::Empty
        } else if self.current_index == len {
            SessionPhase::Finished
        } else {
            SessionPhase::Active
        };
        info!(
            scope = %self.collection.scope(),
            items = len,
            index = self.current_index,
            phase = %self.phase,
            "session started"
        );

        self.refresh_window();
    }

    /// Begin a scope from whatever the gateway last saved for it.
    ///
    /// Queued writes are applied first so the read sees them.
    pub async fn resume(&mut self, collection: Collection) {
        self.writer.flush().await;
        let scope = collection.scope().clone();

        let position = self.gateway.get_position(&scope).unwrap_or_else(|e| {
            warn!(scope = %scope, error = %e, "could not read saved position");
            0
        });
        let pending = self.gateway.get_pending_decisions(&scope).unwrap_or_else(|e| {
            warn!(scope = %scope, error = %e, "could not read saved decisions");
            Vec::new()
        });

        self.start(collection, Some(position), Some(pending));
    }

    /// Begin a scope from its first item, discarding saved progress.
    pub fn restart(&mut self, collection: Collection) {
        self.writer.clear_pending(collection.scope());
        self.writer.save_position(collection.scope(), 0);
        info!(scope = %collection.scope(), "saved progress discarded");

        self.start(collection, None, None);
    }

    /// The item awaiting a decision, if any
    pub fn current_item(&self) -> Option<&MediaRef> {
        match self.phase {
            SessionPhase::Active => self.collection.get(self.current_index),
            _ => None,
        }
    }

    /// Loaded handle for the current item, if it is ready
    pub fn current_handle(&self) -> Option<L::Handle> {
        self.current_item()?;
        self.cache.get(self.current_index)
    }

    /// Loaded handle for any cached index
    pub fn handle(&self, index: usize) -> Option<L::Handle> {
        self.cache.get(index)
    }

    pub fn decide(&mut self, kind: DecisionKind) -> Result<Decision> {
        self.decide_at(kind, Instant::now())
    }

    /// Record a decision for the current item as made at `at`.
    pub fn decide_at(&mut self, kind: DecisionKind, at: Instant) -> Result<Decision> {
        let media = self.current_item().ok_or(SessionError::NoCurrentItem)?.clone();

        let decision = Decision::new(self.current_index, media.id.clone(), kind);
        self.log.append(decision.clone())?;
        self.current_index += 1;
        self.persist_progress();

        let was_deletion = kind == DecisionKind::Deleted;
        let bytes = if was_deletion {
            self.estimator.estimate(&media)
        } else {
            0
        };
        for signal in self.tracker.observe(at, was_deletion, bytes) {
            debug!(?signal, "velocity signal");
            // No receivers is fine
            let _ = self.signals.send(signal);
        }

        if self.current_index >= self.collection.len() {
            self.phase = SessionPhase::Finished;
            debug!(scope = %self.collection.scope(), "every item decided");
        }

        self.refresh_window();
        Ok(decision)
    }

    /// Take back the most recent decision.
    ///
    /// Velocity counters are not rolled back.
    pub fn undo(&mut self) -> Result<Decision> {
        if !matches!(self.phase, SessionPhase::Active | SessionPhase::Finished) || self.current_index == 0 {
            return Err(SessionError::NothingToUndo);
        }
        let decision = self.log.undo_last().ok_or(SessionError::NothingToUndo)?;

        self.current_index = self.log.len();
        self.phase = SessionPhase::Active;
        self.persist_progress();
        debug!(index = decision.index, kind = %decision.kind, "decision undone");

        self.refresh_window();
        Ok(decision)
    }

    /// Fraction of the scope decided, in `[0, 1]`
    pub fn progress(&self) -> f64 {
        let len = self.collection.len();
        if len == 0 {
            return 0.0;
        }
        self.current_index as f64 / len as f64
    }

    /// Items marked for deletion. Only valid once every item is decided.
    pub fn finalize(&self) -> Result<DeletionBatch> {
        if self.phase != SessionPhase::Finished {
            return Err(SessionError::NotFinished { phase: self.phase });
        }

        let items = self
            .log
            .all()
            .iter()
            .filter(|d| d.kind == DecisionKind::Deleted)
            .filter_map(|d| self.collection.get(d.index).cloned())
            .collect();

        Ok(DeletionBatch {
            scope: self.collection.scope().clone(),
            items,
        })
    }

    /// Record the scope as done once deletion has been carried out.
    pub fn mark_scope_complete(&mut self) -> Result<()> {
        if self.phase != SessionPhase::Finished {
            return Err(SessionError::NotFinished { phase: self.phase });
        }

        let scope = self.collection.scope();
        self.writer.clear_pending(scope);
        self.writer.save_position(scope, self.collection.len());
        info!(scope = %scope, reviewed = self.log.len(), "scope completed");

        self.close();
        Ok(())
    }

    /// Finalize, delete through `gateway`, then complete the scope.
    ///
    /// On failure nothing is completed and the same batch can be retried.
    pub async fn execute_deletion<D: DeletionGateway>(&mut self, gateway: &D) -> Result<ScopeSummary> {
        let batch = self.finalize()?;
        let summary = self.summary();

        if batch.is_empty() {
            debug!(scope = %batch.scope, "nothing to delete");
        } else {
            gateway.delete(&batch).await.map_err(|e| {
                warn!(scope = %batch.scope, items = batch.len(), error = %e, "deletion failed");
                SessionError::DeletionExecutionFailed(e)
            })?;
        }

        self.mark_scope_complete()?;
        Ok(summary)
    }

    /// Discard every decision and reset the scope to its first item.
    pub fn abandon(&mut self) {
        if matches!(self.phase, SessionPhase::Loading | SessionPhase::Closed) {
            return;
        }

        let scope = self.collection.scope();
        self.writer.clear_pending(scope);
        self.writer.save_position(scope, 0);
        info!(scope = %scope, discarded = self.log.len(), "session abandoned");

        self.close();
    }

    /// Decision counts for the current scope
    pub fn summary(&self) -> ScopeSummary {
        ScopeSummary {
            reviewed: self.log.len(),
            kept: self.log.kept_count(),
            deleted: self.log.count_by_kind(DecisionKind::Deleted),
            favourited: self.log.count_by_kind(DecisionKind::Favourited),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.signals.subscribe()
    }

    pub fn velocity(&self) -> &VelocityTracker {
        &self.tracker
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn scope(&self) -> &ScopeId {
        self.collection.scope()
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn decisions(&self) -> &[Decision] {
        self.log.all()
    }

    pub fn cache(&self) -> &PrefetchCache<L::Handle> {
        &self.cache
    }

    /// Wait for outstanding prefetches and persistence writes.
    pub async fn settle(&mut self) {
        while let Some(result) = self.prefetches.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "prefetch task failed");
            }
        }
        // Late prefetches may have filled slots the last eviction missed
        self.cache.evict(self.current_index);
        self.writer.flush().await;
    }

    fn persist_progress(&self) {
        let scope = self.collection.scope();
        self.writer.save_pending(scope, self.log.all());
        self.writer.save_position(scope, self.current_index);
    }

    /// Warm the window ahead of the current index and drop what fell out.
    fn refresh_window(&mut self) {
        while let Some(result) = self.prefetches.try_join_next() {
            if let Err(e) = result {
                warn!(error = %e, "prefetch task failed");
            }
        }

        if self.current_index < self.collection.len() {
            let cache = self.cache.clone();
            let collection = Arc::clone(&self.collection);
            let loader = Arc::clone(&self.loader);
            let center = self.current_index;
            let target = self.target;
            self.prefetches.spawn(async move {
                cache.ensure_window(center, &collection, &loader, target).await;
            });
        }

        self.cache.evict(self.current_index);
    }

    /// A fresh cache; loads still running for the old one land nowhere
    fn reset_cache(&mut self) {
        self.cache = PrefetchCache::new(self.window);
    }

    fn close(&mut self) {
        self.log.clear();
        self.current_index = 0;
        self.reset_cache();
        self.phase = SessionPhase::Closed;
    }
}

impl<L: MediaLoader, P: PersistenceGateway> fmt::Debug for SessionEngine<L, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionEngine")
            .field("scope", self.collection.scope())
            .field("phase", &self.phase)
            .field("current_index", &self.current_index)
            .field("decisions", &self.log.len())
            .finish()
    }
}
