use common::ProductId;
use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: &'static str },

    /// Stock was written without first locking the product row.
    #[error("Stock update for product {0} attempted without holding its lock")]
    LockNotHeld(ProductId),

    /// The row targeted by an update does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A stored row could not be mapped back to a record.
    #[error("Invalid row: {0}")]
    InvalidRow(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Unique constraint guarding user emails.
pub const USERS_EMAIL_KEY: &str = "users_email_key";

/// Unique constraint guarding product names.
pub const PRODUCTS_NAME_KEY: &str = "products_name_key";

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
