//! Request-level error type for the catalog API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::import::ImportError;
use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid song id")]
    InvalidId,

    #[error("Song not found")]
    SongNotFound,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// Failure reported by the external import source, passed through as-is.
    #[error("{0}")]
    Upstream(String),

    #[error("Import source unavailable: {0}")]
    Unavailable(String),

    #[error("Catalog error: {0}")]
    Store(StoreError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => ApiError::SongNotFound,
            other => ApiError::Store(other),
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Unavailable(msg) => ApiError::Unavailable(msg),
            ImportError::Upstream(msg) => ApiError::Upstream(msg),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidId | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::SongNotFound | ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Store(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::debug!("request rejected: {} ({})", self, status);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::InvalidId.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::SongNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Upstream("boom".into()).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_store_not_found_becomes_song_not_found() {
        let err: ApiError = StoreError::NotFound(7).into();
        assert!(matches!(err, ApiError::SongNotFound));
        assert_eq!(err.to_string(), "Song not found");
    }

    #[test]
    fn test_upstream_message_is_unmodified() {
        let err: ApiError = ImportError::Upstream("ERROR: video unavailable".into()).into();
        assert_eq!(err.to_string(), "ERROR: video unavailable");
    }
}
