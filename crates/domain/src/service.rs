//! Order service providing the public order operations.

use common::{DeliveryStatus, Order, OrderId};
use store::Store;

use crate::{
    CancellationHandler, DeliveryStatusInfo, DeliveryStatusManager, DomainError,
    OrderPlacementCoordinator, PlaceOrder,
};

/// Service for placing and tracking orders.
///
/// Wraps the placement coordinator, the delivery status manager, and the
/// cancellation handler behind one handle sharing a single store.
pub struct OrderService<S: Store> {
    placement: OrderPlacementCoordinator<S>,
    delivery: DeliveryStatusManager<S>,
    cancellation: CancellationHandler<S>,
}

impl<S: Store> OrderService<S> {
    /// Creates a new order service with the given store.
    pub fn new(store: S) -> Self {
        Self {
            placement: OrderPlacementCoordinator::new(store.clone()),
            delivery: DeliveryStatusManager::new(store.clone()),
            cancellation: CancellationHandler::new(store),
        }
    }

    /// Places an order, taking its quantity out of stock.
    pub async fn place_order(&self, cmd: PlaceOrder) -> Result<Order, DomainError> {
        self.placement.place_order(cmd).await
    }

    /// Returns an order's delivery status.
    pub async fn check_delivery_status(
        &self,
        order_id: OrderId,
    ) -> Result<DeliveryStatusInfo, DomainError> {
        self.delivery.check_status(order_id).await
    }

    /// Overwrites an order's delivery status.
    pub async fn update_delivery_status(
        &self,
        order_id: OrderId,
        new_status: DeliveryStatus,
    ) -> Result<DeliveryStatusInfo, DomainError> {
        self.delivery.update_status(order_id, new_status).await
    }

    /// Cancels an `ORDERED` order and restores its stock.
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<DeliveryStatusInfo, DomainError> {
        self.cancellation.cancel_order(order_id).await
    }
}
