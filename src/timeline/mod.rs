//! Checkpoint timeline controller
//!
//! The controller owns a client-side view of the backend's checkpoint
//! sequence for one `(session, project)` scope: it loads raw checkpoints,
//! orders them, enriches them with incremental diff statistics, and
//! republishes the result through a watch channel whenever a trigger fires
//! (explicit load, debounced message-index advance, push notification).
//! Mutating operations (create, restore, fork, verify, pairwise diff) also
//! go through here.
//!
//! The controller holds no authoritative data and no visibility flags; it is
//! pure reconciliation state. Rendering and conversation ownership stay with
//! the caller.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use futures::future::join_all;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{CheckpointApi, CheckpointInfo, DetailedDiff, DiffOptions};
use crate::config::TimelineConfig;
use crate::error::{Result, RetraceError};
use crate::push::{checkpoint_created_topic, PushBus};

pub mod enrich;
pub use enrich::{
    message_preview, tools_used, DetailedFileChanges, EnrichedCheckpoint, FileChangeSummary,
};

/// Which checkpoint population a controller reconciles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Checkpoints created by one session
    Session,
    /// All checkpoints for the project, across sessions
    Project,
}

/// The `(session, project)` scope one controller instance serves
#[derive(Debug, Clone)]
pub struct TimelineScope {
    /// Session the timeline belongs to
    pub session_id: String,
    /// Project the session operates on
    pub project_path: String,
    /// Checkpoint population to load
    pub mode: LoadMode,
}

impl TimelineScope {
    /// Scope covering a single session's checkpoints
    pub fn session(session_id: impl Into<String>, project_path: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            project_path: project_path.into(),
            mode: LoadMode::Session,
        }
    }

    /// Scope covering every checkpoint in the project
    pub fn project(session_id: impl Into<String>, project_path: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            project_path: project_path.into(),
            mode: LoadMode::Project,
        }
    }
}

/// Published reconciliation state
///
/// Re-entrant: any state may transition back to `Loading`. A failed load
/// replaces the previous view with `Failed`; it never masquerades as
/// Ready-with-stale-data.
#[derive(Debug, Clone, Default)]
pub enum TimelineState {
    /// Nothing loaded yet
    #[default]
    Idle,
    /// A load is in flight
    Loading,
    /// The enriched, filtered timeline, sorted ascending by message index
    Ready(Vec<EnrichedCheckpoint>),
    /// The last load failed; the message is short and human-readable
    Failed(String),
}

/// State of the most recent pairwise detailed diff request
#[derive(Debug, Clone, Default)]
pub enum PairDiffState {
    /// No pairwise diff requested yet
    #[default]
    Idle,
    /// A request is in flight
    Loading,
    /// The last request succeeded
    Ready(DetailedDiff),
    /// The last request failed
    Failed(String),
}

/// Where the conversation currently sits relative to the displayed timeline
#[derive(Debug, Clone)]
pub enum ActivePosition {
    /// The displayed checkpoint with the greatest message index at or below
    /// the current position
    Checkpoint(EnrichedCheckpoint),
    /// No displayed checkpoint at or below the current position: the
    /// conversation is ahead of the timeline with no changes yet
    Current,
}

/// Signal returned by a restore request
///
/// The controller never mutates conversation state; the collaborator that
/// owns session/message state performs the actual restore with this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreRequest {
    /// Checkpoint to restore to
    pub checkpoint_id: String,
    /// Message index the conversation should be trimmed back to
    pub message_index: usize,
}

/// Result of a successful fork
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkResult {
    /// Identifier of the new checkpoint lineage
    pub checkpoint_id: String,
    /// The caller-supplied description, echoed back
    pub description: String,
}

struct Inner {
    api: Arc<dyn CheckpointApi>,
    scope: TimelineScope,
    config: TimelineConfig,
    state_tx: watch::Sender<TimelineState>,
    pair_diff: RwLock<PairDiffState>,
    /// Opaque conversation messages, indexed by message index
    messages: RwLock<Vec<serde_json::Value>>,
    current_index: AtomicUsize,
    /// Checkpoint currently wearing the transient "verified" mark
    verified: RwLock<Option<String>>,
    /// Bumped on every position update; a debounce task only fires if its
    /// generation is still current when the timer expires
    debounce_gen: AtomicU64,
    /// Bumped on every successful verification; stale badge-clear timers
    /// check this before clearing
    verify_gen: AtomicU64,
    push_task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(task) = self.push_task.lock().unwrap_or_else(|e| e.into_inner()).take() {
            task.abort();
        }
    }
}

/// Client-side controller for one scope's checkpoint timeline
///
/// Cheap to clone; clones share the same published state. Spawned helper
/// tasks hold weak references, so dropping the last caller-held clone tears
/// everything down, including an attached push listener.
///
/// Requires a Tokio runtime: [`update_position`](Self::update_position),
/// [`attach`](Self::attach), and [`verify_checkpoint`](Self::verify_checkpoint)
/// spawn tasks and panic when called outside one.
#[derive(Clone)]
pub struct TimelineController {
    inner: Arc<Inner>,
}

impl TimelineController {
    /// Create a controller in the `Idle` state
    ///
    /// # Arguments
    ///
    /// * `api` - Checkpoint backend interface
    /// * `scope` - Session/project scope to reconcile
    /// * `config` - Timeline tuning knobs
    pub fn new(api: Arc<dyn CheckpointApi>, scope: TimelineScope, config: TimelineConfig) -> Self {
        let (state_tx, _) = watch::channel(TimelineState::Idle);
        Self {
            inner: Arc::new(Inner {
                api,
                scope,
                config,
                state_tx,
                pair_diff: RwLock::new(PairDiffState::Idle),
                messages: RwLock::new(Vec::new()),
                current_index: AtomicUsize::new(0),
                verified: RwLock::new(None),
                debounce_gen: AtomicU64::new(0),
                verify_gen: AtomicU64::new(0),
                push_task: Mutex::new(None),
            }),
        }
    }

    /// Snapshot of the published timeline state
    pub fn state(&self) -> TimelineState {
        self.inner.state_tx.borrow().clone()
    }

    /// Subscribe to published state changes
    pub fn subscribe(&self) -> watch::Receiver<TimelineState> {
        self.inner.state_tx.subscribe()
    }

    /// Replace the controller's snapshot of the conversation messages
    ///
    /// Does not trigger a reload; enrichment reads whatever snapshot is
    /// current when a load runs.
    pub fn set_conversation(&self, messages: Vec<serde_json::Value>) {
        *write_lock(&self.inner.messages) = messages;
    }

    /// Record a new current message index and schedule a debounced reload
    ///
    /// A burst of updates inside the debounce window collapses into a single
    /// reload scheduled `reload_debounce_ms` after the last update.
    pub fn update_position(&self, current_index: usize) {
        self.inner
            .current_index
            .store(current_index, Ordering::SeqCst);
        let generation = self.inner.debounce_gen.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = std::time::Duration::from_millis(self.inner.config.reload_debounce_ms);
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else { return };
            if inner.debounce_gen.load(Ordering::SeqCst) == generation {
                debug!(current_index, "Debounced reload firing");
                inner.load().await;
            }
        });
    }

    /// Load, enrich, and publish the timeline for this scope
    ///
    /// Safe to call concurrently; the last load to complete wins.
    pub async fn load(&self) {
        self.inner.load().await;
    }

    /// Start reacting to `checkpoint-created` push events for this scope
    ///
    /// Push-triggered reloads fire immediately, bypassing any pending
    /// debounce. Attaching again first detaches the previous listener, so
    /// repeated open/close cycles never leak subscriptions.
    pub fn attach(&self, bus: &PushBus) {
        self.detach();
        let topic = checkpoint_created_topic(&self.inner.scope.session_id);
        let mut receiver = bus.subscribe(&topic);
        let weak = Arc::downgrade(&self.inner);
        debug!(topic, "Attaching push listener");
        let task = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        let Some(inner) = weak.upgrade() else { break };
                        debug!(
                            checkpoint_id = %event.checkpoint_id,
                            message_index = event.message_index,
                            "Push notification received; reloading timeline"
                        );
                        inner.load().await;
                    }
                    // Missed events still mean a reload is due
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        let Some(inner) = weak.upgrade() else { break };
                        inner.load().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        *self.inner.push_task.lock().unwrap_or_else(|e| e.into_inner()) = Some(task);
    }

    /// Stop reacting to push events; idempotent
    pub fn detach(&self) {
        if let Some(task) = self
            .inner
            .push_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            debug!("Detaching push listener");
            task.abort();
        }
    }

    /// Create a checkpoint at `message_index`, then reload unconditionally
    ///
    /// Concurrent creates are not coalesced; the caller is responsible for
    /// disabling repeat invocation while one is pending.
    ///
    /// # Errors
    ///
    /// Returns `RetraceError::Api` context if the backend rejects the
    /// checkpoint; the published view is left untouched in that case.
    pub async fn create_checkpoint(&self, message_index: usize, label: &str) -> Result<()> {
        self.inner
            .api
            .checkpoint_message(&self.inner.scope.session_id, message_index, label)
            .await?;
        info!(message_index, "Checkpoint created; reloading timeline");
        self.inner.load().await;
        Ok(())
    }

    /// Request a restore to a displayed checkpoint
    ///
    /// The controller validates the id against its working view and returns
    /// the signal; the collaborator owning session/message state performs
    /// the restore, and closing the view is the caller's job.
    ///
    /// # Errors
    ///
    /// Returns `RetraceError::InvalidInput` if the checkpoint is not in the
    /// currently displayed timeline.
    pub fn restore_checkpoint(&self, checkpoint_id: &str) -> Result<RestoreRequest> {
        let TimelineState::Ready(checkpoints) = self.state() else {
            return Err(RetraceError::InvalidInput(
                "No timeline loaded to restore from".to_string(),
            )
            .into());
        };
        let checkpoint = checkpoints
            .iter()
            .find(|cp| cp.info.checkpoint_id == checkpoint_id)
            .ok_or_else(|| {
                RetraceError::InvalidInput(format!(
                    "Checkpoint {} is not in the displayed timeline",
                    checkpoint_id
                ))
            })?;
        Ok(RestoreRequest {
            checkpoint_id: checkpoint.info.checkpoint_id.clone(),
            message_index: checkpoint.info.message_index,
        })
    }

    /// Fork a new lineage from a checkpoint, then reload
    ///
    /// # Errors
    ///
    /// Returns `RetraceError::InvalidInput` for an empty description before
    /// any remote call is issued, or the backend's error if the fork fails.
    pub async fn fork_checkpoint(
        &self,
        checkpoint_id: &str,
        description: &str,
    ) -> Result<ForkResult> {
        if description.trim().is_empty() {
            return Err(RetraceError::InvalidInput(
                "Fork description must not be empty".to_string(),
            )
            .into());
        }
        let new_id = self
            .inner
            .api
            .fork_checkpoint(&self.inner.scope.session_id, checkpoint_id, description)
            .await?;
        info!(
            from = checkpoint_id,
            to = %new_id,
            "Forked checkpoint; reloading timeline"
        );
        self.inner.load().await;
        Ok(ForkResult {
            checkpoint_id: new_id,
            description: description.to_string(),
        })
    }

    /// Verify a checkpoint's integrity
    ///
    /// On success the checkpoint wears a transient "verified" mark for
    /// `verify_badge_ms`, then the mark clears. The mark is working-view
    /// state only; it is never persisted.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if verification cannot run at all.
    pub async fn verify_checkpoint(&self, checkpoint_id: &str) -> Result<bool> {
        let valid = self
            .inner
            .api
            .verify_checkpoint(&self.inner.scope.session_id, checkpoint_id)
            .await?;
        if !valid {
            return Ok(false);
        }

        *write_lock(&self.inner.verified) = Some(checkpoint_id.to_string());
        let generation = self.inner.verify_gen.fetch_add(1, Ordering::SeqCst) + 1;
        let window = std::time::Duration::from_millis(self.inner.config.verify_badge_ms);
        let weak = Arc::downgrade(&self.inner);
        let sleep = tokio::time::sleep(window);
        tokio::spawn(async move {
            sleep.await;
            let Some(inner) = weak.upgrade() else { return };
            if inner.verify_gen.load(Ordering::SeqCst) == generation {
                *write_lock(&inner.verified) = None;
            }
        });
        Ok(true)
    }

    /// The checkpoint currently wearing the verified mark, if any
    pub fn verified_checkpoint(&self) -> Option<String> {
        read_lock(&self.inner.verified).clone()
    }

    /// Request a detailed, line-level diff between two checkpoints
    ///
    /// Pure pass-through to the backend with the configured context window
    /// and whitespace handling; tracked in [`PairDiffState`]. A failure here
    /// never touches the published timeline view.
    ///
    /// # Errors
    ///
    /// Returns the backend's error; the same message lands in
    /// `PairDiffState::Failed` for callers that poll state instead.
    pub async fn diff_pair(&self, from_id: &str, to_id: &str) -> Result<DetailedDiff> {
        *write_lock(&self.inner.pair_diff) = PairDiffState::Loading;
        let options = DiffOptions {
            context_lines: self.inner.config.diff_context_lines,
            ignore_whitespace: self.inner.config.diff_ignore_whitespace,
        };
        match self
            .inner
            .api
            .diff_checkpoints_detailed(&self.inner.scope.session_id, from_id, to_id, options)
            .await
        {
            Ok(diff) => {
                *write_lock(&self.inner.pair_diff) = PairDiffState::Ready(diff.clone());
                Ok(diff)
            }
            Err(e) => {
                let message = format!("Failed to compute diff: {}", e);
                warn!(from_id, to_id, error = %e, "Pairwise diff failed");
                *write_lock(&self.inner.pair_diff) = PairDiffState::Failed(message);
                Err(e)
            }
        }
    }

    /// Snapshot of the pairwise diff tracking state
    pub fn pair_diff_state(&self) -> PairDiffState {
        read_lock(&self.inner.pair_diff).clone()
    }

    /// Locate the conversation's position within the displayed timeline
    ///
    /// Returns the displayed checkpoint with the greatest message index at
    /// or below the current position, or the synthetic current-position
    /// marker when none qualifies. Never an error.
    pub fn active_checkpoint(&self) -> ActivePosition {
        let current_index = self.inner.current_index.load(Ordering::SeqCst);
        let TimelineState::Ready(checkpoints) = self.state() else {
            return ActivePosition::Current;
        };
        checkpoints
            .into_iter()
            .filter(|cp| cp.info.message_index <= current_index)
            .max_by_key(|cp| cp.info.message_index)
            .map(ActivePosition::Checkpoint)
            .unwrap_or(ActivePosition::Current)
    }
}

impl Inner {
    async fn load(&self) {
        self.state_tx.send_replace(TimelineState::Loading);

        let listed = match self.scope.mode {
            LoadMode::Session => self.api.list_checkpoints(&self.scope.session_id).await,
            LoadMode::Project => self.api.list_all_checkpoints(&self.scope.project_path).await,
        };
        let mut checkpoints = match listed {
            Ok(checkpoints) => checkpoints,
            Err(e) => {
                let message = format!("Failed to load checkpoints: {}", e);
                warn!(session_id = %self.scope.session_id, error = %e, "Checkpoint load failed");
                self.state_tx.send_replace(TimelineState::Failed(message));
                return;
            }
        };

        // Stable sort: message-index ties keep the order the API returned
        checkpoints.sort_by_key(|cp| cp.message_index);

        let enriched = self.enrich_all(checkpoints).await;
        let displayed: Vec<EnrichedCheckpoint> = enriched
            .into_iter()
            .filter(EnrichedCheckpoint::has_changes)
            .collect();

        info!(
            session_id = %self.scope.session_id,
            displayed = displayed.len(),
            "Published checkpoint timeline"
        );
        self.state_tx.send_replace(TimelineState::Ready(displayed));
    }

    /// Enrich sorted checkpoints, diffing each against its predecessor
    ///
    /// Diff requests run concurrently; `join_all` reassembles results in
    /// input (index) order, so display order never depends on completion
    /// order. An individual diff failure degrades only that checkpoint.
    async fn enrich_all(&self, checkpoints: Vec<CheckpointInfo>) -> Vec<EnrichedCheckpoint> {
        let display: Vec<(String, Vec<String>)> = {
            let messages = read_lock(&self.messages);
            checkpoints
                .iter()
                .map(|cp| match messages.get(cp.message_index) {
                    Some(message) => (message_preview(message), tools_used(message)),
                    None => (String::new(), Vec::new()),
                })
                .collect()
        };

        let prev_ids: Vec<Option<String>> = std::iter::once(None)
            .chain(
                checkpoints
                    .iter()
                    .map(|cp| Some(cp.checkpoint_id.clone())),
            )
            .take(checkpoints.len())
            .collect();

        let tasks = checkpoints
            .into_iter()
            .zip(display)
            .zip(prev_ids)
            .map(|((info, (preview, tools)), prev_id)| async move {
                let Some(prev_id) = prev_id else {
                    return EnrichedCheckpoint::baseline(info, preview, tools);
                };
                match self
                    .api
                    .diff_checkpoints(&self.scope.session_id, &prev_id, &info.checkpoint_id)
                    .await
                {
                    Ok(diff) => EnrichedCheckpoint::from_diff(info, preview, tools, diff),
                    Err(e) => {
                        warn!(
                            checkpoint_id = %info.checkpoint_id,
                            error = %e,
                            "Diff failed; treating checkpoint as unchanged"
                        );
                        EnrichedCheckpoint::without_changes(info, preview, tools)
                    }
                }
            });

        join_all(tasks).await
    }
}

/// Lock helpers that shrug off poisoning: a panicked writer leaves display
/// state that is still safe to read or overwrite
fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}
