//! Error handling for the protocol store.
//!
//! One domain error type covers every route and repository; the axum
//! `IntoResponse` impl maps each variant onto the HTTP status the API
//! contract promises (400 validation, 404 not-found, 403 forbidden,
//! 500 storage).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Domain errors for store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Missing or malformed caller input (required field, bad enum value).
    #[error("{0}")]
    Validation(String),

    /// No row matches the (id, owner) pair. Deliberately indistinguishable
    /// from "exists but not yours" so ownership checks never leak data.
    #[error("not found")]
    NotFound,

    /// Owner mismatch on a project that is not an orphan, or a lost
    /// ownership claim.
    #[error("forbidden")]
    Forbidden,

    /// A denormalized JSON column failed to parse on read. Surfaced instead
    /// of being silently replaced with an empty document.
    #[error("corrupt {column} column on project {project_id}: {source}")]
    CorruptColumn {
        project_id: String,
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    fn status(&self) -> StatusCode {
        match self {
            StoreError::Validation(_) => StatusCode::BAD_REQUEST,
            StoreError::NotFound => StatusCode::NOT_FOUND,
            StoreError::Forbidden => StatusCode::FORBIDDEN,
            StoreError::CorruptColumn { .. }
            | StoreError::Serialization(_)
            | StoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Storage failures get logged server-side and a generic message
        // goes to the caller; domain errors are surfaced verbatim.
        let message = match &self {
            StoreError::CorruptColumn { .. } => {
                error!("corrupt stored document: {self}");
                "stored document is corrupt".to_string()
            }
            StoreError::Database(e) => {
                error!("database error: {e}");
                "internal storage error".to_string()
            }
            StoreError::Serialization(e) => {
                error!("serialization error: {e}");
                "internal storage error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_taxonomy() {
        assert_eq!(
            StoreError::Validation("name is required".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(StoreError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(StoreError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            StoreError::Database(sqlx::Error::PoolClosed).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
