use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::api::response::{ApiError, JSend};
use crate::object_store::{thumbnail_key, video_key};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub accounts_deleted: u64,
    pub objects_deleted: u64,
    pub uploads_deleted: u64,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health() -> Json<JSend<HealthResponse>> {
    JSend::success(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Remove every object and record. Only routed in test mode.
pub async fn admin_purge(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<PurgeResponse>>, ApiError> {
    let uploads = state.db.all_uploads()?;

    let mut objects_deleted = 0;
    for upload in &uploads {
        for key in [
            video_key(&upload.owner_id, &upload.file_identifier),
            thumbnail_key(&upload.owner_id, &upload.file_identifier),
        ] {
            match state.object_store.exists(&key).await {
                Ok(true) => match state.object_store.delete(&key).await {
                    Ok(()) => objects_deleted += 1,
                    Err(e) => tracing::warn!(key = %key, error = %e, "Failed to delete object"),
                },
                Ok(false) => {}
                Err(e) => tracing::warn!(key = %key, error = %e, "Failed to check object"),
            }
        }
    }

    let stats = state.db.purge_all()?;

    tracing::warn!(
        uploads = stats.uploads,
        accounts = stats.accounts,
        objects = objects_deleted,
        "Purged all data"
    );

    Ok(JSend::success(PurgeResponse {
        accounts_deleted: stats.accounts,
        objects_deleted,
        uploads_deleted: stats.uploads,
    }))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::api::create_router;
    use crate::object_store::video_key;
    use crate::testutil::{sample_upload, test_harness};

    #[tokio::test]
    async fn test_health() {
        let temp_dir = tempfile::tempdir().unwrap();
        let harness = test_harness(&temp_dir, false);

        let request = Request::builder()
            .uri("/_internal/health")
            .body(Body::empty())
            .unwrap();
        let response = create_router(harness.state.clone())
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_purge_removes_records_and_objects() {
        let temp_dir = tempfile::tempdir().unwrap();
        let harness = test_harness(&temp_dir, false);
        let state = &harness.state;

        let key = video_key("alice", "gone");
        state
            .object_store
            .put(&key, vec![1u8; 16].into(), "video/mp4")
            .await
            .unwrap();
        state.db.put_upload(&sample_upload("alice", "gone")).unwrap();
        state.db.get_or_create_account("alice").unwrap();

        let request = Request::builder()
            .method("DELETE")
            .uri("/admin/purge")
            .body(Body::empty())
            .unwrap();
        let response = create_router(state.clone())
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["data"]["uploads_deleted"], 1);
        assert_eq!(json["data"]["accounts_deleted"], 1);
        assert_eq!(json["data"]["objects_deleted"], 1);

        assert!(!state.object_store.exists(&key).await.unwrap());
        assert!(state.db.get_upload("alice", "gone").unwrap().is_none());
    }
}
