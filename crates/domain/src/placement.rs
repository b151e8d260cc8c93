//! Order placement.

use std::time::Instant;

use common::{Order, ProductId, UserId};
use store::{Store, Transaction};

use crate::{DomainError, ledger};

/// Request to place an order for a single product.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub shipping_address: String,
}

impl PlaceOrder {
    pub fn new(
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
        shipping_address: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            product_id,
            quantity,
            shipping_address: shipping_address.into(),
        }
    }

    fn validate(&self) -> Result<(), DomainError> {
        if self.quantity == 0 {
            return Err(DomainError::InvalidQuantity {
                quantity: self.quantity,
            });
        }
        if self.shipping_address.trim().is_empty() {
            return Err(DomainError::InvalidShippingAddress);
        }
        Ok(())
    }
}

/// Places orders against locked stock.
///
/// Each placement runs as one transaction:
/// 1. Resolve the user
/// 2. Lock the product row
/// 3. Check and decrement stock
/// 4. Insert the order in `ORDERED`
/// 5. Commit
///
/// Because step 2 serializes every placement on the same product, the
/// stock seen in step 3 is never stale. Any failure drops the transaction,
/// which releases the lock and discards the decrement.
pub struct OrderPlacementCoordinator<S: Store> {
    store: S,
}

impl<S: Store> OrderPlacementCoordinator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(
        skip(self, cmd),
        fields(user_id = %cmd.user_id, product_id = %cmd.product_id, quantity = cmd.quantity)
    )]
    pub async fn place_order(&self, cmd: PlaceOrder) -> Result<Order, DomainError> {
        let started = Instant::now();
        let result = self.place(cmd).await;

        match &result {
            Ok(order) => {
                metrics::counter!("orders_placed_total").increment(1);
                metrics::histogram!("order_placement_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                tracing::debug!(order_id = %order.id, "order placed");
            }
            Err(e) => {
                metrics::counter!("orders_rejected_total", "reason" => e.kind()).increment(1);
            }
        }

        result
    }

    async fn place(&self, cmd: PlaceOrder) -> Result<Order, DomainError> {
        cmd.validate()?;

        let mut tx = self.store.begin().await?;

        let user = tx
            .find_user(cmd.user_id)
            .await?
            .ok_or(DomainError::UserNotFound(cmd.user_id))?;

        let mut stock = ledger::acquire_exclusive(&mut tx, cmd.product_id).await?;
        ledger::decrease(&mut tx, &mut stock, cmd.quantity).await?;

        let order = Order::place(
            user.id,
            stock.product(),
            cmd.quantity,
            cmd.shipping_address,
        );
        tx.insert_order(&order).await?;

        tx.commit().await?;
        Ok(order)
    }
}
