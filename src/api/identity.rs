//! Caller identity extraction.
//!
//! One identity mechanism for every route: the `x-user-id` header,
//! supplied out-of-band and not cryptographically verified. Absent or
//! empty values are rejected before any handler runs.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::StoreError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Typed caller identity, extracted once per request.
#[derive(Debug, Clone)]
pub struct CallerIdentity(pub String);

impl CallerIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CallerIdentity {
    type Rejection = StoreError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .unwrap_or_default();

        if value.is_empty() {
            return Err(StoreError::Validation(format!(
                "{USER_ID_HEADER} header is required"
            )));
        }
        Ok(CallerIdentity(value.to_string()))
    }
}
