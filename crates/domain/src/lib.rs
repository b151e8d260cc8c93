//! Domain layer for the order-fulfillment system.
//!
//! This crate provides:
//! - The stock ledger, the only path by which product stock changes
//! - Order placement under an exclusive per-product lock
//! - Delivery status reads and unrestricted updates
//! - Guarded cancellation with stock restitution
//! - Product catalog and user directory

pub mod cancellation;
pub mod catalog;
pub mod delivery;
pub mod error;
pub mod ledger;
pub mod placement;
pub mod service;
pub mod users;

pub use cancellation::CancellationHandler;
pub use catalog::ProductCatalog;
pub use common::{DeliveryStatus, Order, OrderId, Product, ProductId, Role, User, UserId};
pub use delivery::{DeliveryStatusInfo, DeliveryStatusManager};
pub use error::DomainError;
pub use ledger::LockedStock;
pub use placement::{OrderPlacementCoordinator, PlaceOrder};
pub use service::OrderService;
pub use users::{Caller, UserDeliveries, UserDirectory, UserOrders};
