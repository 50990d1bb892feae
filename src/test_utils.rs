//! Test utilities for Retrace
//!
//! Provides a scripted, call-recording fake of the checkpoint backend for
//! unit tests, plus small builders for wire types.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::api::{
    CheckpointApi, CheckpointDiff, CheckpointInfo, DetailedDiff, DiffOptions, FileRef,
};
use crate::error::{Result, RetraceError};

/// Build a checkpoint with a deterministic timestamp derived from its index
pub fn checkpoint(id: &str, message_index: usize, file_count: usize) -> CheckpointInfo {
    CheckpointInfo {
        checkpoint_id: id.to_string(),
        message_index,
        timestamp: Utc
            .timestamp_opt(1_700_000_000 + message_index as i64, 0)
            .single()
            .expect("Invalid test timestamp"),
        file_count,
    }
}

/// Build a coarse diff with one modified file, the smallest non-empty change
pub fn modified_diff(path: &str) -> CheckpointDiff {
    CheckpointDiff {
        added_files: vec![],
        modified_files: vec![FileRef::new(path)],
        deleted_files: vec![],
    }
}

/// Counters and captures for backend calls made during a test
#[derive(Default)]
pub struct CallLog {
    list: AtomicUsize,
    diff: AtomicUsize,
    create: AtomicUsize,
    fork: AtomicUsize,
    verify: AtomicUsize,
    detailed_options: Mutex<Option<DiffOptions>>,
}

impl CallLog {
    /// Number of list (session or project) calls
    pub fn list_calls(&self) -> usize {
        self.list.load(Ordering::SeqCst)
    }

    /// Number of coarse diff calls
    pub fn diff_calls(&self) -> usize {
        self.diff.load(Ordering::SeqCst)
    }

    /// Number of checkpoint-create calls
    pub fn create_calls(&self) -> usize {
        self.create.load(Ordering::SeqCst)
    }

    /// Number of fork calls
    pub fn fork_calls(&self) -> usize {
        self.fork.load(Ordering::SeqCst)
    }

    /// Number of verify calls
    pub fn verify_calls(&self) -> usize {
        self.verify.load(Ordering::SeqCst)
    }

    /// Options sent with the most recent detailed diff request
    pub fn last_detailed_options(&self) -> Option<DiffOptions> {
        *self
            .detailed_options
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

/// Scripted fake of the checkpoint backend
///
/// Returns the programmed checkpoint list and per-pair diffs; unprogrammed
/// pairs get a default one-file modification so checkpoints stay visible
/// unless a test opts into an empty diff.
pub struct ScriptedApi {
    checkpoints: Mutex<Vec<CheckpointInfo>>,
    diffs: Mutex<HashMap<(String, String), CheckpointDiff>>,
    list_failure: Mutex<Option<String>>,
    verify_results: Mutex<HashMap<String, bool>>,
    calls: Arc<CallLog>,
}

impl Default for ScriptedApi {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedApi {
    /// Create a fake with no checkpoints and all-default behavior
    pub fn new() -> Self {
        Self {
            checkpoints: Mutex::new(Vec::new()),
            diffs: Mutex::new(HashMap::new()),
            list_failure: Mutex::new(None),
            verify_results: Mutex::new(HashMap::new()),
            calls: Arc::new(CallLog::default()),
        }
    }

    /// Script the checkpoint list both list operations return
    pub fn with_checkpoints(self, checkpoints: Vec<CheckpointInfo>) -> Self {
        *self.checkpoints.lock().unwrap_or_else(|e| e.into_inner()) = checkpoints;
        self
    }

    /// Script the coarse diff for one `(from, to)` pair
    pub fn with_diff(self, from_id: &str, to_id: &str, diff: CheckpointDiff) -> Self {
        self.diffs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((from_id.to_string(), to_id.to_string()), diff);
        self
    }

    /// Make both list operations fail with the given message
    pub fn with_list_failure(self, message: &str) -> Self {
        *self.list_failure.lock().unwrap_or_else(|e| e.into_inner()) =
            Some(message.to_string());
        self
    }

    /// Script the verification outcome for a checkpoint (default is `true`)
    pub fn with_verify_result(self, checkpoint_id: &str, valid: bool) -> Self {
        self.verify_results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(checkpoint_id.to_string(), valid);
        self
    }

    /// Shared handle to the call log, usable after the fake is moved
    pub fn calls(&self) -> Arc<CallLog> {
        self.calls.clone()
    }

    /// Replace the scripted checkpoint list mid-test
    pub fn set_checkpoints(&self, checkpoints: Vec<CheckpointInfo>) {
        *self.checkpoints.lock().unwrap_or_else(|e| e.into_inner()) = checkpoints;
    }

    fn list(&self) -> Result<Vec<CheckpointInfo>> {
        self.calls.list.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self
            .list_failure
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
        {
            return Err(RetraceError::Api(message).into());
        }
        Ok(self
            .checkpoints
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }
}

#[async_trait]
impl CheckpointApi for ScriptedApi {
    async fn list_checkpoints(&self, _session_id: &str) -> Result<Vec<CheckpointInfo>> {
        self.list()
    }

    async fn list_all_checkpoints(&self, _project_path: &str) -> Result<Vec<CheckpointInfo>> {
        self.list()
    }

    async fn diff_checkpoints(
        &self,
        _session_id: &str,
        from_id: &str,
        to_id: &str,
    ) -> Result<CheckpointDiff> {
        self.calls.diff.fetch_add(1, Ordering::SeqCst);
        let pair = (from_id.to_string(), to_id.to_string());
        let scripted = self
            .diffs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&pair)
            .cloned();
        Ok(scripted.unwrap_or_else(|| modified_diff(&format!("{}.rs", to_id))))
    }

    async fn diff_checkpoints_detailed(
        &self,
        _session_id: &str,
        _from_id: &str,
        _to_id: &str,
        options: DiffOptions,
    ) -> Result<DetailedDiff> {
        *self
            .calls
            .detailed_options
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(options);
        Ok(DetailedDiff::default())
    }

    async fn checkpoint_message(
        &self,
        _session_id: &str,
        _message_index: usize,
        _label: &str,
    ) -> Result<()> {
        self.calls.create.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn fork_checkpoint(
        &self,
        _session_id: &str,
        checkpoint_id: &str,
        _description: &str,
    ) -> Result<String> {
        self.calls.fork.fetch_add(1, Ordering::SeqCst);
        Ok(format!("fork-of-{}", checkpoint_id))
    }

    async fn verify_checkpoint(&self, _session_id: &str, checkpoint_id: &str) -> Result<bool> {
        self.calls.verify.fetch_add(1, Ordering::SeqCst);
        Ok(*self
            .verify_results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(checkpoint_id)
            .unwrap_or(&true))
    }
}
