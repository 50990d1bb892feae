//! Pure enrichment helpers for the checkpoint timeline
//!
//! Raw checkpoints carry no display data; this module derives it. The
//! conversation messages are opaque JSON records, so extraction here is the
//! only place their shape is interpreted, and it is deliberately forgiving:
//! anything unrecognized degrades to an empty preview or tool list.

use serde::Serialize;

use crate::api::{CheckpointDiff, CheckpointInfo, FileRef};

/// Maximum preview length in characters before ellipsis truncation
pub const PREVIEW_MAX_CHARS: usize = 150;

/// Per-checkpoint change counts, relative to the preceding checkpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FileChangeSummary {
    /// Files added by this step
    pub added: usize,
    /// Files modified by this step
    pub modified: usize,
    /// Files deleted by this step
    pub deleted: usize,
}

impl FileChangeSummary {
    /// Total change count across all three categories
    pub fn total(&self) -> usize {
        self.added + self.modified + self.deleted
    }
}

/// Per-file change detail, partitioned by change kind
#[derive(Debug, Clone, Default, Serialize)]
pub struct DetailedFileChanges {
    /// Files added by this step
    pub added: Vec<FileRef>,
    /// Files modified by this step
    pub modified: Vec<FileRef>,
    /// Files deleted by this step
    pub deleted: Vec<FileRef>,
}

/// A checkpoint augmented with derived display data
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedCheckpoint {
    /// The raw backend checkpoint
    pub info: CheckpointInfo,
    /// Preview of the conversation message at this checkpoint's index,
    /// truncated to [`PREVIEW_MAX_CHARS`] characters
    pub message_content: String,
    /// Tool names invoked by that message, in order, duplicates preserved
    pub tools_used: Vec<String>,
    /// Incremental change counts against the preceding checkpoint
    pub files_changed: FileChangeSummary,
    /// Incremental per-file detail against the preceding checkpoint
    pub detailed_file_changes: DetailedFileChanges,
}

impl EnrichedCheckpoint {
    /// Enrich the first checkpoint in sorted order
    ///
    /// There is no prior baseline to diff against, so every captured file
    /// counts as added and the detailed lists stay empty.
    pub fn baseline(info: CheckpointInfo, message_content: String, tools_used: Vec<String>) -> Self {
        let files_changed = FileChangeSummary {
            added: info.file_count,
            modified: 0,
            deleted: 0,
        };
        Self {
            info,
            message_content,
            tools_used,
            files_changed,
            detailed_file_changes: DetailedFileChanges::default(),
        }
    }

    /// Enrich a checkpoint from its diff against the preceding checkpoint
    pub fn from_diff(
        info: CheckpointInfo,
        message_content: String,
        tools_used: Vec<String>,
        diff: CheckpointDiff,
    ) -> Self {
        let files_changed = FileChangeSummary {
            added: diff.added_files.len(),
            modified: diff.modified_files.len(),
            deleted: diff.deleted_files.len(),
        };
        Self {
            info,
            message_content,
            tools_used,
            files_changed,
            detailed_file_changes: DetailedFileChanges {
                added: diff.added_files,
                modified: diff.modified_files,
                deleted: diff.deleted_files,
            },
        }
    }

    /// Degrade a checkpoint whose diff lookup failed to "no detected changes"
    ///
    /// Zero-change checkpoints are filtered out of the published timeline,
    /// so this is how a failed diff excludes a single checkpoint without
    /// aborting the batch.
    pub fn without_changes(
        info: CheckpointInfo,
        message_content: String,
        tools_used: Vec<String>,
    ) -> Self {
        Self {
            info,
            message_content,
            tools_used,
            files_changed: FileChangeSummary::default(),
            detailed_file_changes: DetailedFileChanges::default(),
        }
    }

    /// Whether this checkpoint changed anything relative to its predecessor
    pub fn has_changes(&self) -> bool {
        self.files_changed.total() > 0
    }
}

/// Extract a short preview string from an opaque message record
///
/// Handles the common layouts: a plain `content` string, a `content` array
/// of text blocks, and either wrapped in a `message` envelope. Unrecognized
/// shapes yield an empty preview.
pub fn message_preview(message: &serde_json::Value) -> String {
    truncate_preview(&collect_text(payload(message)))
}

/// Extract the tool names invoked by an opaque message record
///
/// Order follows the message's block order; duplicate invocations of the
/// same tool are preserved.
pub fn tools_used(message: &serde_json::Value) -> Vec<String> {
    let Some(blocks) = payload(message).get("content").and_then(|c| c.as_array()) else {
        return Vec::new();
    };
    blocks
        .iter()
        .filter(|block| block.get("type").and_then(|t| t.as_str()) == Some("tool_use"))
        .filter_map(|block| block.get("name").and_then(|n| n.as_str()))
        .map(str::to_string)
        .collect()
}

/// Unwrap an optional `message` envelope
fn payload(message: &serde_json::Value) -> &serde_json::Value {
    message.get("message").unwrap_or(message)
}

fn collect_text(payload: &serde_json::Value) -> String {
    match payload.get("content") {
        Some(serde_json::Value::String(text)) => text.trim().to_string(),
        Some(serde_json::Value::Array(blocks)) => blocks
            .iter()
            .filter(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))
            .filter_map(|block| block.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string(),
        _ => String::new(),
    }
}

fn truncate_preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_MAX_CHARS {
        return text.to_string();
    }
    let truncated: String = text.chars().take(PREVIEW_MAX_CHARS).collect();
    format!("{}...", truncated)
}
