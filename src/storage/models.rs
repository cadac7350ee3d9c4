use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of an uploaded clip.
///
/// `Processing` is the only non-terminal state. The only legal transitions are
/// `Processing -> Completed` and `Processing -> Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadStatus {
    Processing,
    Completed,
    Failed,
}

impl UploadStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, UploadStatus::Processing)
    }

    pub fn can_transition_to(self, next: UploadStatus) -> bool {
        self == UploadStatus::Processing && next.is_terminal()
    }
}

/// Per-account policy for naming new uploads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentifierStrategy {
    /// e.g. `123e4567-e89b-12d3-a456-426614174000`
    RandomUuid,
    /// e.g. `a3f0bK3s`
    #[default]
    RandomAlphanumeric,
    /// e.g. `19102026-141503`
    Timestamp,
}

/// An uploading account, as far as this service cares about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub owner_id: String,
    pub identifier_strategy: IdentifierStrategy,
    pub created_at: DateTime<Utc>,
}

/// One submitted clip, stored in redb
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRecord {
    pub owner_id: String,
    pub file_identifier: String,
    pub title: String,
    /// Size of the raw upload. The stored object is authoritative for playback length.
    pub size_bytes: u64,
    /// Extension of the staged input file, needed to rebuild its temp path
    pub source_extension: String,
    pub source_mime_type: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub status: UploadStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl UploadRecord {
    /// Composite redb key, `{owner}/{identifier}`.
    pub fn key(&self) -> String {
        upload_key(&self.owner_id, &self.file_identifier)
    }
}

pub fn upload_key(owner_id: &str, file_identifier: &str) -> String {
    format!("{owner_id}/{file_identifier}")
}
