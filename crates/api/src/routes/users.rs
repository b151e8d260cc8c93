//! User registration and per-user order views.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{Role, User, UserId};
use serde::{Deserialize, Serialize};
use store::Store;

use super::orders::{DeliveryStatusResponse, OrderResponse};
use super::{AppState, parse_id};
use crate::caller::CallerIdentity;
use crate::error::ApiError;

const MIN_PASSWORD_LEN: usize = 4;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct CreateAdminRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub admin_secret_key: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct UserResponse {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        }
    }
}

#[derive(Serialize)]
pub struct UserOrdersResponse {
    pub user_id: UserId,
    pub user_name: String,
    pub total_orders: usize,
    pub orders: Vec<OrderResponse>,
}

#[derive(Serialize)]
pub struct UserDeliveriesResponse {
    pub user_id: UserId,
    pub user_name: String,
    pub email: String,
    pub total_orders: usize,
    pub deliveries: Vec<DeliveryStatusResponse>,
}

fn validate_registration(name: &str, email: &str, password: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::BadRequest("name: must not be blank".to_string()));
    }
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::BadRequest(
            "email: must be a well-formed email address".to_string(),
        ));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "password: must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

// -- Handlers --

/// POST /api/users — register a regular user.
#[tracing::instrument(skip(state, req), fields(email = %req.email))]
pub async fn register<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    validate_registration(&req.name, &req.email, &req.password)?;

    let user = state
        .users
        .register_user(req.name.trim(), req.email.trim(), &req.password)
        .await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// POST /api/users/admin — register an admin with the configured secret.
#[tracing::instrument(skip(state, req), fields(email = %req.email))]
pub async fn register_admin<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateAdminRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    validate_registration(&req.name, &req.email, &req.password)?;

    let user = state
        .users
        .register_admin(
            req.name.trim(),
            req.email.trim(),
            &req.password,
            &req.admin_secret_key,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// GET /api/users/{id}/orders — a user's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn orders<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    CallerIdentity(caller): CallerIdentity,
    Path(id): Path<String>,
) -> Result<Json<UserOrdersResponse>, ApiError> {
    let user_id: UserId = parse_id(&id, "user")?;
    let view = state.users.user_orders(caller, user_id).await?;

    Ok(Json(UserOrdersResponse {
        user_id: view.user.id,
        user_name: view.user.name,
        total_orders: view.orders.len(),
        orders: view.orders.into_iter().map(Into::into).collect(),
    }))
}

/// GET /api/users/admin/deliveries — every user's delivery statuses.
#[tracing::instrument(skip(state))]
pub async fn all_deliveries<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    CallerIdentity(caller): CallerIdentity,
) -> Result<Json<Vec<UserDeliveriesResponse>>, ApiError> {
    let overview = state.users.all_deliveries(caller).await?;

    Ok(Json(
        overview
            .into_iter()
            .map(|entry| UserDeliveriesResponse {
                user_id: entry.user.id,
                user_name: entry.user.name,
                email: entry.user.email,
                total_orders: entry.deliveries.len(),
                deliveries: entry.deliveries.into_iter().map(Into::into).collect(),
            })
            .collect(),
    ))
}
