//! Delivery status lifecycle.

use serde::{Deserialize, Serialize};

/// The delivery status of an order.
///
/// Transitions:
/// ```text
/// Ordered ──► Cancelled            (cancel, restores stock)
///
/// any ──► Ordered | Preparing | Shipped | Delivered | Cancelled
///                                  (status update, no side effects)
/// ```
///
/// Cancellation is the only guarded transition: it is legal from `Ordered`
/// alone. Status updates are deliberately unrestricted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    /// Order placed, stock taken.
    #[default]
    Ordered,

    /// Order is being packed.
    Preparing,

    /// Order has left the warehouse.
    Shipped,

    /// Order reached the customer.
    Delivered,

    /// Order was cancelled and its stock restored.
    Cancelled,
}

impl DeliveryStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [DeliveryStatus; 5] = [
        DeliveryStatus::Ordered,
        DeliveryStatus::Preparing,
        DeliveryStatus::Shipped,
        DeliveryStatus::Delivered,
        DeliveryStatus::Cancelled,
    ];

    /// Returns true if an order in this status may be cancelled.
    pub fn can_cancel(&self) -> bool {
        matches!(self, DeliveryStatus::Ordered)
    }

    /// Returns true if the order's stock has been handed back.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DeliveryStatus::Cancelled)
    }

    /// Returns the status name as stored and transmitted.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Ordered => "ORDERED",
            DeliveryStatus::Preparing => "PREPARING",
            DeliveryStatus::Shipped => "SHIPPED",
            DeliveryStatus::Delivered => "DELIVERED",
            DeliveryStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown status name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError(pub String);

impl std::fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown delivery status: {}", self.0)
    }
}

impl std::error::Error for ParseStatusError {}

impl std::str::FromStr for DeliveryStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeliveryStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}
