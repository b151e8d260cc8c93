//! HTTP route handlers.

pub mod health;
pub mod metrics;
pub mod orders;
pub mod products;
pub mod users;

use domain::{OrderService, ProductCatalog, UserDirectory};
use store::Store;
use uuid::Uuid;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub order_service: OrderService<S>,
    pub catalog: ProductCatalog<S>,
    pub users: UserDirectory<S>,
}

/// Parses a path segment as a UUID-backed identifier.
pub(crate) fn parse_id<T: From<Uuid>>(raw: &str, what: &str) -> Result<T, ApiError> {
    Uuid::parse_str(raw)
        .map(T::from)
        .map_err(|e| ApiError::BadRequest(format!("Invalid {what} id: {e}")))
}
