use axum::body::Body;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::object_store_error;
use crate::api::owner::Owner;
use crate::api::range::{self, ByteRange};
use crate::api::response::{ApiError, AppQuery, JSend, JSendPaginated, Pagination};
use crate::object_store::video_key;
use crate::pipeline::{self, UploadRequest};
use crate::storage::models::{UploadRecord, UploadStatus};
use crate::AppState;

/// Finished clips are never rewritten under the same identifier.
const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000";
const VIDEO_CONTENT_TYPE: &str = "video/mp4";

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct UploadAccepted {
    pub file_identifier: String,
    pub status: UploadStatus,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct VideoResponse {
    pub created_at: String,
    pub end_seconds: f64,
    pub file_identifier: String,
    pub finished_at: Option<String>,
    pub size_bytes: u64,
    pub start_seconds: f64,
    pub status: UploadStatus,
    pub thumbnail_url: Option<String>,
    pub title: String,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListVideosParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    20
}

// ============================================================================
// Handlers
// ============================================================================

/// Accept a clip for background processing.
/// Route: POST /v
pub async fn upload_video(
    State(state): State<Arc<AppState>>,
    Owner(owner_id): Owner,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut data: Option<Bytes> = None;
    let mut original_filename: Option<String> = None;
    let mut start_seconds: Option<f64> = None;
    let mut end_seconds: Option<f64> = None;
    let mut title: Option<String> = None;

    let max_upload_size = state.config.max_upload_size;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_upload_size))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "videoInput" => {
                original_filename = field.file_name().map(|s| s.to_string());

                let bytes = field.bytes().await.map_err(|e| {
                    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                        return too_large(max_upload_size);
                    }
                    tracing::error!(owner = %owner_id, error = %e, "Failed to read upload body");
                    ApiError::internal(format!("Failed to read video input: {e}"))
                })?;

                if bytes.len() as u64 > max_upload_size {
                    return Err(too_large(max_upload_size));
                }
                data = Some(bytes);
            }
            "startTimeSeconds" => {
                start_seconds = Some(parse_seconds(&read_text(field, max_upload_size).await?));
            }
            "endTimeSeconds" => {
                end_seconds = Some(parse_seconds(&read_text(field, max_upload_size).await?));
            }
            "videoTitle" => {
                title = Some(read_text(field, max_upload_size).await?);
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    // Missing fields flow into intake validation so its check order holds.
    let request = UploadRequest {
        data: data.unwrap_or_default(),
        original_filename,
        start_seconds: start_seconds.unwrap_or(f64::NAN),
        end_seconds: end_seconds.unwrap_or(f64::NAN),
        title: title.unwrap_or_default(),
    };

    let file_identifier = pipeline::intake(&state, &owner_id, request).await?;
    let url = video_url(&file_identifier);

    let mut response = (
        StatusCode::ACCEPTED,
        JSend::success(UploadAccepted {
            file_identifier,
            status: UploadStatus::Processing,
            url: url.clone(),
        }),
    )
        .into_response();

    if let Ok(location) = HeaderValue::from_str(&url) {
        response.headers_mut().insert(header::LOCATION, location);
    }

    Ok(response)
}

/// The owner's finished clips, newest first.
/// Route: GET /v
pub async fn list_videos(
    State(state): State<Arc<AppState>>,
    Owner(owner_id): Owner,
    AppQuery(params): AppQuery<ListVideosParams>,
) -> Result<Json<JSendPaginated<VideoResponse>>, ApiError> {
    if params.limit == 0 {
        return Err(ApiError::bad_request("limit must be greater than 0"));
    }

    let uploads = state
        .db
        .list_uploads(&owner_id, Some(UploadStatus::Completed))?;
    let total = uploads.len() as u64;
    let items: Vec<VideoResponse> = uploads
        .iter()
        .skip(params.offset as usize)
        .take(params.limit as usize)
        .map(upload_to_response)
        .collect();

    Ok(JSendPaginated::success(
        items,
        Pagination {
            limit: params.limit,
            offset: params.offset,
            total,
        },
    ))
}

/// `{id}.mp4` streams the clip; a bare `{id}` returns its record.
/// Route: GET /v/:file
pub async fn get_video(
    State(state): State<Arc<AppState>>,
    Owner(owner_id): Owner,
    Path(file): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    match file.strip_suffix(".mp4") {
        Some(file_identifier) => {
            let range = headers
                .get(header::RANGE)
                .and_then(|value| value.to_str().ok());
            serve_video(&state, &owner_id, file_identifier, range).await
        }
        None => {
            let upload = state
                .db
                .get_upload(&owner_id, &file)?
                .ok_or_else(|| ApiError::not_found("Video not found"))?;
            Ok(JSend::success(upload_to_response(&upload)).into_response())
        }
    }
}

/// Stream a finished clip, honouring a single `Range: bytes=` request.
async fn serve_video(
    state: &AppState,
    owner_id: &str,
    file_identifier: &str,
    range_header: Option<&str>,
) -> Result<Response, ApiError> {
    // Only COMPLETED uploads are visible, whatever the object store holds.
    match state.db.get_upload(owner_id, file_identifier)? {
        Some(upload) if upload.status == UploadStatus::Completed => {}
        _ => return Err(ApiError::not_found("Video not found")),
    }

    let key = video_key(owner_id, file_identifier);
    let total_size = state
        .object_store
        .head_size(&key)
        .await
        .map_err(object_store_error)?;

    let byte_range = range::resolve(range_header, total_size).map_err(|e| {
        tracing::debug!(key = %key, range = ?range_header, error = %e, "Rejected range");
        ApiError::from(e)
    })?;

    let (status, start, end) = match byte_range {
        ByteRange::Full => (StatusCode::OK, 0, total_size.saturating_sub(1)),
        ByteRange::Partial { start, end } => (StatusCode::PARTIAL_CONTENT, start, end),
    };

    let body = if total_size == 0 {
        Body::empty()
    } else {
        let stream = state
            .object_store
            .get_range(&key, start, end)
            .await
            .map_err(object_store_error)?;
        Body::from_stream(stream)
    };

    let content_length = if total_size == 0 { 0 } else { end - start + 1 };

    let mut response = (status, body).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(VIDEO_CONTENT_TYPE),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(content_length));
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(IMMUTABLE_CACHE_CONTROL),
    );
    if status == StatusCode::PARTIAL_CONTENT {
        if let Ok(value) = HeaderValue::from_str(&format!("bytes {start}-{end}/{total_size}")) {
            headers.insert(header::CONTENT_RANGE, value);
        }
    }

    Ok(response)
}

// ============================================================================
// Helpers
// ============================================================================

async fn read_text(
    field: axum::extract::multipart::Field<'_>,
    max_upload_size: u64,
) -> Result<String, ApiError> {
    let name = field.name().unwrap_or("field").to_string();
    field.text().await.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return too_large(max_upload_size);
        }
        ApiError::bad_request(format!("Invalid {name}: {e}"))
    })
}

/// Unparsable times become NaN and are rejected by intake validation in order.
fn parse_seconds(value: &str) -> f64 {
    value.trim().parse::<f64>().unwrap_or(f64::NAN)
}

fn multipart_error(e: MultipartError, max_upload_size: u64) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return too_large(max_upload_size);
    }
    ApiError::bad_request(format!("Invalid multipart data: {e}"))
}

fn too_large(max_upload_size: u64) -> ApiError {
    ApiError::payload_too_large(format!(
        "Video exceeds maximum upload size of {max_upload_size} bytes"
    ))
}

fn video_url(file_identifier: &str) -> String {
    format!("/v/{file_identifier}.mp4")
}

fn upload_to_response(upload: &UploadRecord) -> VideoResponse {
    let completed = upload.status == UploadStatus::Completed;
    VideoResponse {
        created_at: upload.created_at.to_rfc3339(),
        end_seconds: upload.end_seconds,
        file_identifier: upload.file_identifier.clone(),
        finished_at: upload.finished_at.map(|t| t.to_rfc3339()),
        size_bytes: upload.size_bytes,
        start_seconds: upload.start_seconds,
        status: upload.status,
        thumbnail_url: completed
            .then(|| format!("/thumbnails/v-{}.png", upload.file_identifier)),
        title: upload.title.clone(),
        url: completed.then(|| video_url(&upload.file_identifier)),
    }
}
