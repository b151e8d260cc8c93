//! Stock ledger.
//!
//! All stock mutations go through a [`LockedStock`] handle, and the only
//! way to get one is [`acquire_exclusive`], which takes the product's row
//! lock inside the caller's transaction. Mutations become visible when the
//! transaction commits and vanish if it is dropped.

use std::time::Instant;

use common::{Product, ProductId};
use store::Transaction;

use crate::DomainError;

/// A product row held under its exclusive lock.
#[derive(Debug)]
pub struct LockedStock {
    product: Product,
}

impl LockedStock {
    pub fn product_id(&self) -> ProductId {
        self.product.id
    }

    /// Stock as seen by this transaction.
    pub fn stock(&self) -> u32 {
        self.product.stock
    }

    pub fn product(&self) -> &Product {
        &self.product
    }
}

/// Locks a product's stock for the rest of the transaction.
///
/// Blocks while another in-flight transaction holds the same product.
pub async fn acquire_exclusive<T: Transaction>(
    tx: &mut T,
    product_id: ProductId,
) -> Result<LockedStock, DomainError> {
    let started = Instant::now();
    let product = tx
        .find_product_for_update(product_id)
        .await?
        .ok_or(DomainError::ProductNotFound(product_id))?;

    metrics::histogram!("stock_lock_wait_seconds").record(started.elapsed().as_secs_f64());
    tracing::debug!(%product_id, stock = product.stock, "stock lock acquired");

    Ok(LockedStock { product })
}

/// Takes `quantity` units out of stock.
///
/// Fails with `InsufficientStock` and leaves the handle untouched if fewer
/// than `quantity` units are on hand.
pub async fn decrease<T: Transaction>(
    tx: &mut T,
    handle: &mut LockedStock,
    quantity: u32,
) -> Result<(), DomainError> {
    let current_stock = handle.stock();
    let Some(remaining) = current_stock.checked_sub(quantity) else {
        return Err(DomainError::InsufficientStock {
            product_name: handle.product.name.clone(),
            current_stock,
        });
    };

    tx.update_product_stock(handle.product_id(), remaining)
        .await?;
    handle.product.stock = remaining;
    Ok(())
}

/// Puts `quantity` units back into stock.
pub async fn increase<T: Transaction>(
    tx: &mut T,
    handle: &mut LockedStock,
    quantity: u32,
) -> Result<(), DomainError> {
    let restored = handle
        .stock()
        .checked_add(quantity)
        .ok_or(DomainError::StockOverflow(handle.product_id()))?;

    tx.update_product_stock(handle.product_id(), restored)
        .await?;
    handle.product.stock = restored;
    Ok(())
}
