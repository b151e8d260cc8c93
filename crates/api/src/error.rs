//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Caller identity missing or unreadable.
    Unauthorized(String),
    /// Domain logic error.
    Domain(DomainError),
}

impl ApiError {
    /// Returns the HTTP status and client-facing message for this error.
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ApiError::Domain(err) => (domain_error_status(err), err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        metrics::counter!("http_error_responses_total", "status" => status.as_u16().to_string())
            .increment(1);
        if status.is_server_error() {
            tracing::error!(error = %message, "internal server error");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::UserNotFound(_)
        | DomainError::ProductNotFound(_)
        | DomainError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        DomainError::InsufficientStock { .. }
        | DomainError::InvalidStateTransition { .. }
        | DomainError::DuplicateEmail(_)
        | DomainError::DuplicateProductName(_) => StatusCode::CONFLICT,
        DomainError::InvalidQuantity { .. }
        | DomainError::InvalidShippingAddress
        | DomainError::InvalidPrice { .. } => StatusCode::BAD_REQUEST,
        DomainError::InvalidAdminSecret | DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
        DomainError::StockOverflow(_) | DomainError::Store(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}
