//! Persistent records.
//!
//! Records reference each other by id only; nothing here holds a live
//! reference to another entity.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::{DeliveryStatus, OrderId, ProductId, UserId};

/// Role assigned to a user at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "USER" => Some(Role::User),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    /// Unique across all users.
    pub email: String,
    /// Opaque credential handed over at registration. Never serialized out.
    #[serde(skip_serializing, default)]
    pub credential_secret: String,
    pub role: Role,
}

impl User {
    /// Creates a new user with a fresh id.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        credential_secret: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            id: UserId::new(),
            name: name.into(),
            email: email.into(),
            credential_secret: credential_secret.into(),
            role,
        }
    }
}

/// A catalog product with its sellable stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    /// Unique across the catalog.
    pub name: String,
    pub price: i64,
    pub stock: u32,
}

impl Product {
    /// Creates a new product with a fresh id.
    pub fn new(name: impl Into<String>, price: i64, stock: u32) -> Self {
        Self {
            id: ProductId::new(),
            name: name.into(),
            price,
            stock,
        }
    }
}

/// An order against a single product.
///
/// Everything except `status` is fixed at placement time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub product_id: ProductId,
    /// Product name as it was when the order was placed.
    pub product_name: String,
    pub quantity: u32,
    pub shipping_address: String,
    pub status: DeliveryStatus,
    pub ordered_at: DateTime<Utc>,
}

impl Order {
    /// Builds a freshly placed order: status `Ordered`, timestamped now.
    ///
    /// The timestamp is truncated to microseconds, the precision a
    /// PostgreSQL `TIMESTAMPTZ` column keeps.
    pub fn place(
        user_id: UserId,
        product: &Product,
        quantity: u32,
        shipping_address: impl Into<String>,
    ) -> Self {
        Self {
            id: OrderId::new(),
            user_id,
            product_id: product.id,
            product_name: product.name.clone(),
            quantity,
            shipping_address: shipping_address.into(),
            status: DeliveryStatus::Ordered,
            ordered_at: Utc::now().trunc_subsecs(6),
        }
    }
}
