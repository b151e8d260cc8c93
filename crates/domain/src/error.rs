//! Domain error types.

use common::{DeliveryStatus, OrderId, ProductId, UserId};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during domain operations.
///
/// Every error aborts the operation that produced it in full: no stock is
/// taken without an order, and no status flips without its stock effect.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The requested quantity exceeds what is on hand.
    #[error("Insufficient stock for {product_name}: {current_stock} available")]
    InsufficientStock {
        product_name: String,
        current_stock: u32,
    },

    /// Cancellation attempted outside the `ORDERED` status.
    #[error("Invalid state transition: cannot cancel from {current_status}")]
    InvalidStateTransition { current_status: DeliveryStatus },

    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    #[error("Shipping address is required")]
    InvalidShippingAddress,

    #[error("Invalid price: {price} (must not be negative)")]
    InvalidPrice { price: i64 },

    /// Restoring stock would overflow the counter.
    #[error("Stock overflow for product {0}")]
    StockOverflow(ProductId),

    #[error("Email already registered: {0}")]
    DuplicateEmail(String),

    #[error("Product name already exists: {0}")]
    DuplicateProductName(String),

    #[error("Admin secret key is invalid")]
    InvalidAdminSecret,

    /// The caller may not act on the requested resource.
    #[error("Forbidden: {0}")]
    Forbidden(&'static str),

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl DomainError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::UserNotFound(_) => "user_not_found",
            DomainError::ProductNotFound(_) => "product_not_found",
            DomainError::OrderNotFound(_) => "order_not_found",
            DomainError::InsufficientStock { .. } => "insufficient_stock",
            DomainError::InvalidStateTransition { .. } => "invalid_state_transition",
            DomainError::InvalidQuantity { .. } => "invalid_quantity",
            DomainError::InvalidShippingAddress => "invalid_shipping_address",
            DomainError::InvalidPrice { .. } => "invalid_price",
            DomainError::StockOverflow(_) => "stock_overflow",
            DomainError::DuplicateEmail(_) => "duplicate_email",
            DomainError::DuplicateProductName(_) => "duplicate_product_name",
            DomainError::InvalidAdminSecret => "invalid_admin_secret",
            DomainError::Forbidden(_) => "forbidden",
            DomainError::Store(_) => "store",
        }
    }
}
