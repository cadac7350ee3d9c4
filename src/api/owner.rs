use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::api::response::ApiError;

pub const OWNER_HEADER: &str = "x-owner-id";

const MAX_OWNER_ID_LEN: usize = 128;

/// The caller's owner id, taken from the `X-Owner-Id` header set by the
/// authenticating proxy in front of this service.
///
/// Owner ids become path segments in object keys and temp file names, so
/// only `[A-Za-z0-9_-]` is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner(pub String);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, ApiError> {
        let value = parts
            .headers
            .get(OWNER_HEADER)
            .ok_or_else(|| ApiError::unauthorized("missing X-Owner-Id header"))?;

        let owner_id = value
            .to_str()
            .map_err(|_| ApiError::bad_request("X-Owner-Id header is not valid text"))?
            .trim();

        if owner_id.is_empty() {
            return Err(ApiError::unauthorized("missing X-Owner-Id header"));
        }
        if !is_valid_owner_id(owner_id) {
            return Err(ApiError::bad_request(
                "X-Owner-Id may only contain letters, digits, '-' and '_'",
            ));
        }

        Ok(Owner(owner_id.to_string()))
    }
}

pub fn is_valid_owner_id(owner_id: &str) -> bool {
    !owner_id.is_empty()
        && owner_id.len() <= MAX_OWNER_ID_LEN
        && owner_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};
    use axum::response::IntoResponse;

    async fn extract(header: Option<&str>) -> Result<Owner, ApiError> {
        let mut builder = Request::builder().uri("/v");
        if let Some(value) = header {
            builder = builder.header(OWNER_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Owner::from_request_parts(&mut parts, &()).await
    }

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[tokio::test]
    async fn test_extracts_owner() {
        assert_eq!(extract(Some("user_42")).await.unwrap(), Owner("user_42".into()));
        assert_eq!(extract(Some(" abc-1 ")).await.unwrap(), Owner("abc-1".into()));
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        assert_eq!(status_of(extract(None).await.unwrap_err()), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(extract(Some("  ")).await.unwrap_err()), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_rejects_path_characters() {
        for bad in ["../etc", "a/b", "user.name", "a b"] {
            let err = extract(Some(bad)).await.unwrap_err();
            assert_eq!(status_of(err), StatusCode::BAD_REQUEST, "{bad}");
        }
    }

    #[test]
    fn test_length_limit() {
        assert!(is_valid_owner_id(&"a".repeat(MAX_OWNER_ID_LEN)));
        assert!(!is_valid_owner_id(&"a".repeat(MAX_OWNER_ID_LEN + 1)));
    }
}
