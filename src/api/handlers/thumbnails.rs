use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use super::object_store_error;
use crate::api::owner::Owner;
use crate::api::response::ApiError;
use crate::object_store::thumbnail_key;
use crate::storage::models::UploadStatus;
use crate::AppState;

/// Serve the thumbnail of a finished clip.
/// Route: GET /thumbnails/:file, where file is `v-{identifier}.png`
pub async fn get_thumbnail(
    State(state): State<Arc<AppState>>,
    Owner(owner_id): Owner,
    Path(file): Path<String>,
) -> Result<Response, ApiError> {
    let file_identifier = file
        .strip_prefix("v-")
        .and_then(|rest| rest.strip_suffix(".png"))
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::not_found("Thumbnail not found"))?;

    match state.db.get_upload(&owner_id, file_identifier)? {
        Some(upload) if upload.status == UploadStatus::Completed => {}
        _ => return Err(ApiError::not_found("Thumbnail not found")),
    }

    // Small and immutable; goes through the read cache.
    let data = state
        .object_store
        .get(&thumbnail_key(&owner_id, file_identifier))
        .await
        .map_err(object_store_error)?;

    let mut response = (StatusCode::OK, data).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000"),
    );

    Ok(response)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    use crate::api::create_router;
    use crate::api::owner::OWNER_HEADER;
    use crate::object_store::thumbnail_key;
    use crate::storage::models::UploadStatus;
    use crate::testutil::{sample_upload, test_harness, FAKE_THUMBNAIL};

    fn request(owner: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(OWNER_HEADER, owner)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_serves_completed_thumbnail() {
        let temp_dir = tempfile::tempdir().unwrap();
        let harness = test_harness(&temp_dir, false);
        let state = &harness.state;

        state
            .object_store
            .put(&thumbnail_key("alice", "clip1"), FAKE_THUMBNAIL.into(), "image/png")
            .await
            .unwrap();
        let mut upload = sample_upload("alice", "clip1");
        upload.status = UploadStatus::Completed;
        state.db.put_upload(&upload).unwrap();

        let response = create_router(state.clone())
            .oneshot(request("alice", "/thumbnails/v-clip1.png"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body.as_ref(), FAKE_THUMBNAIL);
    }

    #[tokio::test]
    async fn test_hides_unfinished_and_malformed() {
        let temp_dir = tempfile::tempdir().unwrap();
        let harness = test_harness(&temp_dir, false);
        let state = &harness.state;

        state
            .object_store
            .put(&thumbnail_key("alice", "clip2"), FAKE_THUMBNAIL.into(), "image/png")
            .await
            .unwrap();
        state.db.put_upload(&sample_upload("alice", "clip2")).unwrap();

        for uri in [
            "/thumbnails/v-clip2.png",
            "/thumbnails/clip2.png",
            "/thumbnails/v-.png",
            "/thumbnails/v-unknown.png",
        ] {
            let response = create_router(state.clone())
                .oneshot(request("alice", uri))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        }
    }
}
