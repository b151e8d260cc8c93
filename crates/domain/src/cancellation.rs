//! Order cancellation with stock restitution.

use common::{DeliveryStatus, OrderId};
use store::{Store, Transaction};

use crate::{DeliveryStatusInfo, DomainError, ledger};

/// Cancels orders and hands their stock back.
///
/// Cancellation is legal only from `ORDERED`. The status flip and the
/// stock increase commit in one transaction. The order row is locked before
/// the status check, so two racing cancellations of the same order restore
/// stock once; the loser sees `CANCELLED` and fails.
///
/// Lock order is always order row, then product row.
pub struct CancellationHandler<S: Store> {
    store: S,
}

impl<S: Store> CancellationHandler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<DeliveryStatusInfo, DomainError> {
        let result = self.cancel(order_id).await;

        match &result {
            Ok(_) => {
                metrics::counter!("orders_cancelled_total").increment(1);
                tracing::debug!("order cancelled, stock restored");
            }
            Err(e) => {
                metrics::counter!("order_cancellations_rejected_total", "reason" => e.kind())
                    .increment(1);
            }
        }

        result
    }

    async fn cancel(&self, order_id: OrderId) -> Result<DeliveryStatusInfo, DomainError> {
        let mut tx = self.store.begin().await?;

        let mut order = tx
            .find_order_for_update(order_id)
            .await?
            .ok_or(DomainError::OrderNotFound(order_id))?;

        if !order.status.can_cancel() {
            return Err(DomainError::InvalidStateTransition {
                current_status: order.status,
            });
        }

        tx.update_order_status(order_id, DeliveryStatus::Cancelled)
            .await?;

        let mut stock = ledger::acquire_exclusive(&mut tx, order.product_id).await?;
        ledger::increase(&mut tx, &mut stock, order.quantity).await?;

        tx.commit().await?;

        order.status = DeliveryStatus::Cancelled;
        Ok(DeliveryStatusInfo::from(&order))
    }
}
