//! Wire types for the checkpoint backend API
//!
//! Everything in this module mirrors the backend's JSON wire shapes. The one
//! deliberate divergence is [`FileRef`]: the backend emits file references in
//! several shapes (a bare path string, or an object with one of a few path and
//! size field spellings), and `FileRef` normalizes all of them exactly once at
//! this boundary so nothing downstream has to sniff payload shapes again.

use chrono::{DateTime, Utc};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};

/// A backend-owned checkpoint, as returned by the list operations
///
/// Read-only to this crate: checkpoints are immutable snapshots tied to a
/// message index in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointInfo {
    /// Unique checkpoint identifier
    pub checkpoint_id: String,
    /// Conversation message index this checkpoint corresponds to
    pub message_index: usize,
    /// When the checkpoint was created
    pub timestamp: DateTime<Utc>,
    /// Number of files captured in the checkpoint
    pub file_count: usize,
}

/// A normalized file reference
///
/// Decoded once at the API boundary from whichever shape the backend chose
/// to emit; see the module docs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRef {
    /// Project-relative file path
    pub path: String,
    /// File size in bytes, when the backend reported one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Alternative field spellings the backend uses for the path
const PATH_FIELDS: &[&str] = &["path", "file_path", "filePath", "name"];
/// Alternative field spellings the backend uses for the size
const SIZE_FIELDS: &[&str] = &["size", "file_size", "fileSize", "bytes"];

impl FileRef {
    /// Build a reference from a bare path with no size metadata
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            size: None,
        }
    }

    /// Build a reference with size metadata
    pub fn with_size(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            size: Some(size),
        }
    }

    /// Normalize a raw JSON value into a `FileRef`
    ///
    /// Accepts a bare string or an object carrying any of the known path
    /// field spellings. Returns `None` for anything else.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(path) => Some(Self::new(path.clone())),
            serde_json::Value::Object(map) => {
                let path = PATH_FIELDS
                    .iter()
                    .find_map(|key| map.get(*key).and_then(serde_json::Value::as_str))?;
                let size = SIZE_FIELDS
                    .iter()
                    .find_map(|key| map.get(*key).and_then(serde_json::Value::as_u64));
                Some(Self {
                    path: path.to_string(),
                    size,
                })
            }
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for FileRef {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        FileRef::from_value(&value)
            .ok_or_else(|| D::Error::custom("unrecognized file reference shape"))
    }
}

/// Coarse, path-level diff between two checkpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointDiff {
    /// Files present in the target but not the source
    #[serde(default)]
    pub added_files: Vec<FileRef>,
    /// Files present in both but with different content
    #[serde(default)]
    pub modified_files: Vec<FileRef>,
    /// Files present in the source but not the target
    #[serde(default)]
    pub deleted_files: Vec<FileRef>,
}

impl CheckpointDiff {
    /// Total number of changed paths across all three categories
    pub fn total_changes(&self) -> usize {
        self.added_files.len() + self.modified_files.len() + self.deleted_files.len()
    }
}

/// Options for a detailed, line-level diff request
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffOptions {
    /// Number of unchanged context lines around each hunk
    pub context_lines: usize,
    /// Whether whitespace-only changes are ignored
    pub ignore_whitespace: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            context_lines: 3,
            ignore_whitespace: false,
        }
    }
}

/// One line within a diff hunk
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "changeType", rename_all = "camelCase")]
pub enum LineChange {
    /// Line present only in the target
    #[serde(rename_all = "camelCase")]
    Added {
        /// Line number in the target file
        line_number: usize,
        /// Line content
        content: String,
    },
    /// Line present only in the source
    #[serde(rename_all = "camelCase")]
    Deleted {
        /// Line number in the source file
        line_number: usize,
        /// Line content
        content: String,
    },
    /// Unchanged line included for context
    #[serde(rename_all = "camelCase")]
    Context {
        /// Line number in the target file
        line_number: usize,
        /// Line content
        content: String,
    },
}

/// A contiguous group of line changes within one file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffHunk {
    /// Starting line in the source file
    pub from_line: usize,
    /// Number of lines covered in the source file
    pub from_count: usize,
    /// Starting line in the target file
    pub to_line: usize,
    /// Number of lines covered in the target file
    pub to_count: usize,
    /// The line changes in this hunk
    pub changes: Vec<LineChange>,
}

/// Line-level diff for a single file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDiff {
    /// Project-relative file path
    pub path: String,
    /// Whether the file is binary (no hunks are produced for binary files)
    pub is_binary: bool,
    /// Hunks of line changes
    pub hunks: Vec<DiffHunk>,
}

/// Detailed, line-level diff between two checkpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedDiff {
    /// Per-file line-level diffs
    #[serde(default)]
    pub files: Vec<FileDiff>,
    /// Total lines added across all files
    #[serde(default)]
    pub total_lines_added: usize,
    /// Total lines deleted across all files
    #[serde(default)]
    pub total_lines_deleted: usize,
}

/// Payload delivered on the `checkpoint-created:<session_id>` push topic
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointCreated {
    /// Identifier of the freshly created checkpoint
    pub checkpoint_id: String,
    /// Message index the checkpoint was created at
    pub message_index: usize,
}
