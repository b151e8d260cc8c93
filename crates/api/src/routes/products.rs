//! Product catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{Product, ProductId};
use serde::{Deserialize, Serialize};
use store::Store;

use super::{AppState, parse_id};
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub price: i64,
    pub stock: u32,
}

#[derive(Serialize)]
pub struct ProductResponse {
    pub product_id: ProductId,
    pub name: String,
    pub price: i64,
    pub stock: u32,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            product_id: product.id,
            name: product.name,
            price: product.price,
            stock: product.stock,
        }
    }
}

/// POST /api/products — add a product to the catalog.
#[tracing::instrument(skip(state, req), fields(name = %req.name))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("name: must not be blank".to_string()));
    }

    let product = state.catalog.add_product(name, req.price, req.stock).await?;
    Ok((StatusCode::CREATED, Json(product.into())))
}

/// GET /api/products — list every product.
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let products = state.catalog.list_products().await?;
    Ok(Json(products.into_iter().map(Into::into).collect()))
}

/// GET /api/products/{id} — a single product.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product_id: ProductId = parse_id(&id, "product")?;
    let product = state.catalog.get_product(product_id).await?;
    Ok(Json(product.into()))
}
