//! Order placement, delivery status, and cancellation endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{DeliveryStatus, Order, OrderId, ProductId, UserId};
use domain::{DeliveryStatusInfo, PlaceOrder};
use serde::{Deserialize, Serialize};
use store::Store;

use super::{AppState, parse_id};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub shipping_address: String,
}

#[derive(Deserialize)]
pub struct UpdateDeliveryStatusRequest {
    pub delivery_status: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub shipping_address: String,
    pub delivery_status: DeliveryStatus,
    pub ordered_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.id,
            user_id: order.user_id,
            product_id: order.product_id,
            product_name: order.product_name,
            quantity: order.quantity,
            shipping_address: order.shipping_address,
            delivery_status: order.status,
            ordered_at: order.ordered_at,
        }
    }
}

#[derive(Serialize)]
pub struct DeliveryStatusResponse {
    pub order_id: OrderId,
    pub delivery_status: DeliveryStatus,
    pub ordered_at: DateTime<Utc>,
}

impl From<DeliveryStatusInfo> for DeliveryStatusResponse {
    fn from(info: DeliveryStatusInfo) -> Self {
        Self {
            order_id: info.order_id,
            delivery_status: info.status,
            ordered_at: info.ordered_at,
        }
    }
}

// -- Handlers --

/// POST /api/orders — place an order against product stock.
#[tracing::instrument(skip(state, req), fields(user_id = %req.user_id, product_id = %req.product_id))]
pub async fn place<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let order = state
        .order_service
        .place_order(PlaceOrder::new(
            req.user_id,
            req.product_id,
            req.quantity,
            req.shipping_address,
        ))
        .await?;

    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /api/orders/{id}/delivery — current delivery status.
#[tracing::instrument(skip(state))]
pub async fn delivery_status<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<DeliveryStatusResponse>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order")?;
    let info = state.order_service.check_delivery_status(order_id).await?;
    Ok(Json(info.into()))
}

/// PATCH /api/orders/{id}/delivery — overwrite the delivery status.
#[tracing::instrument(skip(state, req))]
pub async fn update_delivery_status<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateDeliveryStatusRequest>,
) -> Result<Json<DeliveryStatusResponse>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order")?;
    let status = req
        .delivery_status
        .parse::<DeliveryStatus>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let info = state
        .order_service
        .update_delivery_status(order_id, status)
        .await?;
    Ok(Json(info.into()))
}

/// POST /api/orders/{id}/cancel — cancel an `ORDERED` order and restore stock.
#[tracing::instrument(skip(state))]
pub async fn cancel<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<DeliveryStatusResponse>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order")?;
    let info = state.order_service.cancel_order(order_id).await?;
    Ok(Json(info.into()))
}
