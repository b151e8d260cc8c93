//! Shared types for the order-fulfillment system.
//!
//! Identifiers, the delivery status lifecycle, and the plain records that
//! the store persists and the domain layer operates on.

pub mod model;
pub mod status;
pub mod types;

pub use model::{Order, Product, Role, User};
pub use status::{DeliveryStatus, ParseStatusError};
pub use types::{OrderId, ProductId, UserId};
