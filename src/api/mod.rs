//! Checkpoint backend API boundary
//!
//! This module defines the [`CheckpointApi`] trait that the enclosing
//! application implements against its versioning backend, along with the
//! normalized wire types. The crate consumes this interface; it never
//! creates, stores, or diffs checkpoint content itself.

use crate::error::Result;
use async_trait::async_trait;

pub mod types;
pub use types::{
    CheckpointCreated, CheckpointDiff, CheckpointInfo, DetailedDiff, DiffHunk, DiffOptions,
    FileDiff, FileRef, LineChange,
};

/// Request/response interface to the checkpoint backend
///
/// All operations are non-blocking requests that suspend only the calling
/// operation. Implementations must be shareable across tasks.
///
/// # Examples
///
/// ```no_run
/// use retrace::api::{CheckpointApi, CheckpointDiff, CheckpointInfo, DetailedDiff, DiffOptions};
/// use retrace::error::Result;
/// use async_trait::async_trait;
///
/// struct MyBackend;
///
/// #[async_trait]
/// impl CheckpointApi for MyBackend {
///     async fn list_checkpoints(&self, _session_id: &str) -> Result<Vec<CheckpointInfo>> {
///         Ok(vec![])
///     }
///
///     async fn list_all_checkpoints(&self, _project_path: &str) -> Result<Vec<CheckpointInfo>> {
///         Ok(vec![])
///     }
///
///     async fn diff_checkpoints(
///         &self,
///         _session_id: &str,
///         _from_id: &str,
///         _to_id: &str,
///     ) -> Result<CheckpointDiff> {
///         Ok(CheckpointDiff::default())
///     }
///
///     async fn diff_checkpoints_detailed(
///         &self,
///         _session_id: &str,
///         _from_id: &str,
///         _to_id: &str,
///         _options: DiffOptions,
///     ) -> Result<DetailedDiff> {
///         Ok(DetailedDiff::default())
///     }
///
///     async fn checkpoint_message(
///         &self,
///         _session_id: &str,
///         _message_index: usize,
///         _label: &str,
///     ) -> Result<()> {
///         Ok(())
///     }
///
///     async fn fork_checkpoint(
///         &self,
///         _session_id: &str,
///         _checkpoint_id: &str,
///         _description: &str,
///     ) -> Result<String> {
///         Ok("new-checkpoint".to_string())
///     }
///
///     async fn verify_checkpoint(&self, _session_id: &str, _checkpoint_id: &str) -> Result<bool> {
///         Ok(true)
///     }
/// }
/// ```
#[async_trait]
pub trait CheckpointApi: Send + Sync {
    /// List all checkpoints belonging to one session
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable or the session is
    /// unknown.
    async fn list_checkpoints(&self, session_id: &str) -> Result<Vec<CheckpointInfo>>;

    /// List all checkpoints for a project, across every session
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable.
    async fn list_all_checkpoints(&self, project_path: &str) -> Result<Vec<CheckpointInfo>>;

    /// Compute a coarse, path-level diff between two checkpoints
    ///
    /// # Errors
    ///
    /// Returns an error if either checkpoint is unknown or the diff fails.
    async fn diff_checkpoints(
        &self,
        session_id: &str,
        from_id: &str,
        to_id: &str,
    ) -> Result<CheckpointDiff>;

    /// Compute a detailed, line-level diff between two checkpoints
    ///
    /// # Errors
    ///
    /// Returns an error if either checkpoint is unknown or the diff fails.
    async fn diff_checkpoints_detailed(
        &self,
        session_id: &str,
        from_id: &str,
        to_id: &str,
        options: DiffOptions,
    ) -> Result<DetailedDiff>;

    /// Create a checkpoint for the message at `message_index`
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the checkpoint.
    async fn checkpoint_message(
        &self,
        session_id: &str,
        message_index: usize,
        label: &str,
    ) -> Result<()>;

    /// Fork a new checkpoint lineage from an existing checkpoint
    ///
    /// # Returns
    ///
    /// The identifier of the newly created checkpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the source checkpoint is unknown or the fork
    /// fails.
    async fn fork_checkpoint(
        &self,
        session_id: &str,
        checkpoint_id: &str,
        description: &str,
    ) -> Result<String>;

    /// Verify the integrity of a checkpoint
    ///
    /// # Returns
    ///
    /// `true` if the checkpoint content verifies against its recorded state.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot run the verification at all;
    /// a completed-but-failed verification is `Ok(false)`.
    async fn verify_checkpoint(&self, session_id: &str, checkpoint_id: &str) -> Result<bool>;
}
