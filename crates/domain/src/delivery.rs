//! Delivery status reads and updates.

use chrono::{DateTime, Utc};
use common::{DeliveryStatus, Order, OrderId};
use serde::Serialize;
use store::{Store, Transaction};

use crate::DomainError;

/// An order's current delivery status and placement time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeliveryStatusInfo {
    pub order_id: OrderId,
    pub status: DeliveryStatus,
    pub ordered_at: DateTime<Utc>,
}

impl From<&Order> for DeliveryStatusInfo {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id,
            status: order.status,
            ordered_at: order.ordered_at,
        }
    }
}

/// Reads and overwrites delivery statuses.
///
/// Updates are unrestricted: any status may follow any other. The guarded
/// path to `CANCELLED`, with its stock restitution, lives in
/// [`CancellationHandler`](crate::CancellationHandler).
pub struct DeliveryStatusManager<S: Store> {
    store: S,
}

impl<S: Store> DeliveryStatusManager<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the order's status and placement time.
    #[tracing::instrument(skip(self))]
    pub async fn check_status(&self, order_id: OrderId) -> Result<DeliveryStatusInfo, DomainError> {
        let order = self
            .store
            .find_order(order_id)
            .await?
            .ok_or(DomainError::OrderNotFound(order_id))?;
        Ok(DeliveryStatusInfo::from(&order))
    }

    /// Sets the order's status unconditionally.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        new_status: DeliveryStatus,
    ) -> Result<DeliveryStatusInfo, DomainError> {
        let mut tx = self.store.begin().await?;

        let mut order = tx
            .find_order_for_update(order_id)
            .await?
            .ok_or(DomainError::OrderNotFound(order_id))?;

        tx.update_order_status(order_id, new_status).await?;
        tx.commit().await?;

        metrics::counter!("order_status_updates_total", "status" => new_status.as_str())
            .increment(1);
        tracing::debug!(from = %order.status, to = %new_status, "delivery status updated");

        order.status = new_status;
        Ok(DeliveryStatusInfo::from(&order))
    }
}
