//! Admin catalog handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use cartwright_core::ProductId;

use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::{NewProduct, Product, ProductUpdate};
use crate::services::catalog::CatalogService;
use crate::state::AppState;

/// `POST /admin/products`
pub async fn create_product(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Json(product): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>)> {
    let product = CatalogService::new(state.store()).create(product).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// `PATCH /admin/products/{id}`
pub async fn update_product(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(update): Json<ProductUpdate>,
) -> Result<Json<Product>> {
    Ok(Json(
        CatalogService::new(state.store()).update(id, update).await?,
    ))
}
