//! Caller identity extraction.
//!
//! Authentication happens upstream; the gateway forwards the resolved
//! identity as `X-User-Id` and `X-User-Role` headers.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use common::{Role, UserId};
use domain::Caller;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Extractor yielding the [`Caller`] for the current request.
///
/// Rejects with 401 when either header is missing or malformed.
#[derive(Debug, Clone, Copy)]
pub struct CallerIdentity(pub Caller);

impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        caller_from_headers(&parts.headers).map(CallerIdentity)
    }
}

fn caller_from_headers(headers: &HeaderMap) -> Result<Caller, ApiError> {
    let user_id = header_str(headers, USER_ID_HEADER)?;
    let user_id = uuid::Uuid::parse_str(user_id)
        .map(UserId::from_uuid)
        .map_err(|e| ApiError::Unauthorized(format!("Invalid {USER_ID_HEADER}: {e}")))?;

    let role = header_str(headers, USER_ROLE_HEADER)?;
    let role = Role::parse(role)
        .ok_or_else(|| ApiError::Unauthorized(format!("Invalid {USER_ROLE_HEADER}: {role}")))?;

    Ok(Caller::new(user_id, role))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, ApiError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Unauthorized(format!("Missing {name} header")))
}
