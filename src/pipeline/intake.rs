use std::path::Path;

use bytes::Bytes;
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::worker::TranscodeJob;
use crate::identifier;
use crate::media::ClipWindow;
use crate::storage::models::{UploadRecord, UploadStatus};
use crate::storage::{Database, DatabaseError};
use crate::AppState;

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("{0}")]
    Validation(String),
    #[error("Could not create a file identifier after {attempts} attempts")]
    Capacity { attempts: u32 },
    #[error("Failed to stage upload: {0}")]
    Staging(#[from] std::io::Error),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error("Transcode queue is closed")]
    QueueClosed,
}

impl IntakeError {
    fn validation(message: impl Into<String>) -> Self {
        IntakeError::Validation(message.into())
    }
}

/// A submitted clip, as read off the wire.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub data: Bytes,
    pub original_filename: Option<String>,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub title: String,
}

/// Container details derived from the original filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMedia {
    pub extension: String,
    pub mime_type: String,
}

/// Check a request in a fixed order; the first failing check wins.
pub fn validate(request: &UploadRequest) -> Result<SourceMedia, IntakeError> {
    if request.data.is_empty() {
        return Err(IntakeError::validation("video input stream is empty"));
    }

    let filename = request
        .original_filename
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| IntakeError::validation("file name is empty"))?;

    if request.title.trim().is_empty() {
        return Err(IntakeError::validation("video title is empty"));
    }

    let (start, end) = (request.start_seconds, request.end_seconds);
    if !(start.is_finite() && end.is_finite() && start >= 0.0 && start <= end) {
        return Err(IntakeError::validation("invalid start or end time"));
    }

    video_type(filename)
        .ok_or_else(|| IntakeError::validation(format!("unsupported video type: {filename}")))
}

/// Map a filename's extension to a video MIME type, if it names one.
pub fn video_type(filename: &str) -> Option<SourceMedia> {
    let extension = Path::new(filename)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();

    let mime = mime_guess::from_ext(&extension).first()?;
    if mime.type_() != mime_guess::mime::VIDEO {
        return None;
    }

    Some(SourceMedia {
        extension,
        mime_type: mime.essence_str().to_string(),
    })
}

/// Claim an identifier by persisting `record` under the first free candidate.
///
/// Each candidate is written with a create-only insert, so two uploads racing
/// for the same candidate cannot both win; the loser moves on to the next one.
pub fn reserve_identifier(
    db: &Database,
    mut record: UploadRecord,
    max_attempts: u32,
    mut generate: impl FnMut() -> String,
) -> Result<UploadRecord, IntakeError> {
    let owner_id = record.owner_id.clone();
    for attempt in 1..=max_attempts {
        record.file_identifier = generate();
        if db.insert_upload(&record)? {
            debug!(owner = %owner_id, file_id = %record.file_identifier, attempt, "Reserved file identifier");
            return Ok(record);
        }
        debug!(owner = %owner_id, file_id = %record.file_identifier, attempt, "Identifier collision");
    }

    error!(owner = %owner_id, attempts = max_attempts, "Exhausted identifier attempts");
    Err(IntakeError::Capacity {
        attempts: max_attempts,
    })
}

/// Accept an upload: validate, reserve an identifier with a PROCESSING record,
/// stage the raw bytes and queue the transcode. Never waits for the transcode
/// itself.
pub async fn intake(
    state: &AppState,
    owner_id: &str,
    request: UploadRequest,
) -> Result<String, IntakeError> {
    let source = match validate(&request) {
        Ok(source) => source,
        Err(e) => {
            warn!(owner = %owner_id, error = %e, "Rejected upload");
            return Err(e);
        }
    };

    let window = ClipWindow {
        start_seconds: request.start_seconds,
        end_seconds: request.end_seconds,
    };
    let pending = UploadRecord {
        owner_id: owner_id.to_string(),
        file_identifier: String::new(),
        title: request.title.trim().to_string(),
        size_bytes: request.data.len() as u64,
        source_extension: source.extension.clone(),
        source_mime_type: source.mime_type.clone(),
        start_seconds: window.start_seconds,
        end_seconds: window.end_seconds,
        status: UploadStatus::Processing,
        created_at: Utc::now(),
        finished_at: None,
    };

    let account = state.db.get_or_create_account(owner_id)?;
    let strategy = account.identifier_strategy;
    let record = reserve_identifier(
        &state.db,
        pending,
        state.config.identifier_attempts,
        || identifier::generate(strategy),
    )?;
    let file_identifier = record.file_identifier.clone();

    let paths = state
        .temp
        .paths(owner_id, &file_identifier, &source.extension);
    if let Err(e) = state.temp.stage_input(&paths, &request.data).await {
        state.temp.remove_artifacts(&paths).await;
        fail_upload(state, owner_id, &file_identifier);
        return Err(e.into());
    }

    let job = TranscodeJob {
        owner_id: owner_id.to_string(),
        file_identifier: file_identifier.clone(),
        source_extension: source.extension,
        source_mime_type: source.mime_type,
        window,
    };

    if state.jobs.submit(job).is_err() {
        error!(owner = %owner_id, file_id = %file_identifier, "Transcode queue closed, failing upload");
        state.temp.remove_artifacts(&paths).await;
        fail_upload(state, owner_id, &file_identifier);
        return Err(IntakeError::QueueClosed);
    }

    info!(
        owner = %owner_id,
        file_id = %file_identifier,
        size_bytes = record.size_bytes,
        start = window.start_seconds,
        end = window.end_seconds,
        "Upload accepted"
    );
    Ok(file_identifier)
}

/// Settle a reserved upload that never reached the queue.
fn fail_upload(state: &AppState, owner_id: &str, file_identifier: &str) {
    if let Err(e) = state
        .db
        .finish_upload(owner_id, file_identifier, UploadStatus::Failed)
    {
        error!(owner = %owner_id, file_id = %file_identifier, error = %e, "Failed to record upload status");
    }
}
