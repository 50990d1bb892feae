//! Shared helpers for integration tests
//!
//! Provides a scripted fake of the checkpoint backend with call recording,
//! mirroring what the host application would implement against its real
//! versioning engine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use retrace::api::{
    CheckpointApi, CheckpointDiff, CheckpointInfo, DetailedDiff, DiffOptions, FileRef,
};
use retrace::error::Result;
use retrace::RetraceError;

/// Install a log subscriber for test output, honoring `RUST_LOG`
///
/// Safe to call from every test; only the first call in a binary wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

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

/// Build a diff that only adds the given paths
pub fn added(paths: &[&str]) -> CheckpointDiff {
    CheckpointDiff {
        added_files: paths.iter().map(|p| FileRef::new(*p)).collect(),
        modified_files: vec![],
        deleted_files: vec![],
    }
}

/// Scripted fake of the checkpoint backend with call recording
#[derive(Default)]
pub struct FakeCheckpointApi {
    checkpoints: Mutex<Vec<CheckpointInfo>>,
    diffs: Mutex<HashMap<(String, String), CheckpointDiff>>,
    failing_diffs: Mutex<Vec<(String, String)>>,
    list_calls: AtomicUsize,
    fork_calls: AtomicUsize,
    create_calls: AtomicUsize,
}

impl FakeCheckpointApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Replace the checkpoint list both list operations return
    pub fn set_checkpoints(&self, checkpoints: Vec<CheckpointInfo>) {
        *self.checkpoints.lock().expect("checkpoints poisoned") = checkpoints;
    }

    /// Script the coarse diff for one `(from, to)` pair
    ///
    /// Unprogrammed pairs yield a default one-file modification, so
    /// checkpoints stay visible unless a test scripts an empty diff.
    pub fn set_diff(&self, from_id: &str, to_id: &str, diff: CheckpointDiff) {
        self.diffs
            .lock()
            .expect("diffs poisoned")
            .insert((from_id.to_string(), to_id.to_string()), diff);
    }

    /// Make the coarse diff for one `(from, to)` pair fail
    pub fn fail_diff(&self, from_id: &str, to_id: &str) {
        self.failing_diffs
            .lock()
            .expect("failing_diffs poisoned")
            .push((from_id.to_string(), to_id.to_string()));
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn fork_calls(&self) -> usize {
        self.fork_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    fn list(&self) -> Vec<CheckpointInfo> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.checkpoints.lock().expect("checkpoints poisoned").clone()
    }
}

#[async_trait]
impl CheckpointApi for FakeCheckpointApi {
    async fn list_checkpoints(&self, _session_id: &str) -> Result<Vec<CheckpointInfo>> {
        Ok(self.list())
    }

    async fn list_all_checkpoints(&self, _project_path: &str) -> Result<Vec<CheckpointInfo>> {
        Ok(self.list())
    }

    async fn diff_checkpoints(
        &self,
        _session_id: &str,
        from_id: &str,
        to_id: &str,
    ) -> Result<CheckpointDiff> {
        let pair = (from_id.to_string(), to_id.to_string());
        if self
            .failing_diffs
            .lock()
            .expect("failing_diffs poisoned")
            .contains(&pair)
        {
            return Err(
                RetraceError::Api(format!("Diff {} -> {} unavailable", from_id, to_id)).into(),
            );
        }
        let scripted = self.diffs.lock().expect("diffs poisoned").get(&pair).cloned();
        Ok(scripted.unwrap_or_else(|| CheckpointDiff {
            added_files: vec![],
            modified_files: vec![FileRef::new(format!("{}.rs", to_id))],
            deleted_files: vec![],
        }))
    }

    async fn diff_checkpoints_detailed(
        &self,
        _session_id: &str,
        _from_id: &str,
        _to_id: &str,
        _options: DiffOptions,
    ) -> Result<DetailedDiff> {
        Ok(DetailedDiff::default())
    }

    async fn checkpoint_message(
        &self,
        _session_id: &str,
        _message_index: usize,
        _label: &str,
    ) -> Result<()> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn fork_checkpoint(
        &self,
        _session_id: &str,
        checkpoint_id: &str,
        _description: &str,
    ) -> Result<String> {
        self.fork_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("fork-of-{}", checkpoint_id))
    }

    async fn verify_checkpoint(&self, _session_id: &str, _checkpoint_id: &str) -> Result<bool> {
        Ok(true)
    }
}
