mod accounts;
mod admin;
mod thumbnails;
mod videos;

use crate::api::response::ApiError;
use crate::object_store::ObjectStoreError;
use crate::pipeline::IntakeError;
use crate::storage::DatabaseError;

pub use accounts::{get_account, update_account};
pub use admin::{admin_purge, health};
pub use thumbnails::get_thumbnail;
pub use videos::{get_video, list_videos, upload_video};

impl From<IntakeError> for ApiError {
    fn from(e: IntakeError) -> Self {
        match e {
            IntakeError::Validation(message) => ApiError::bad_request(message),
            IntakeError::Capacity { .. } => ApiError::internal(e.to_string()),
            IntakeError::Staging(_) | IntakeError::Database(_) | IntakeError::QueueClosed => {
                tracing::error!(error = %e, "Upload intake failed");
                ApiError::internal("Failed to accept upload")
            }
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(e: DatabaseError) -> Self {
        ApiError::internal(e.to_string())
    }
}

/// Map an object store failure for a resource the database says exists
fn object_store_error(e: ObjectStoreError) -> ApiError {
    match e {
        ObjectStoreError::NotFound(_) => ApiError::not_found("Video not found"),
        _ => {
            tracing::error!(error = %e, "Object store read failed");
            ApiError::internal(format!("Failed to retrieve object: {e}"))
        }
    }
}
