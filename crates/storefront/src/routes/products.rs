//! Catalog route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use cartwright_core::ProductId;
use cartwright_core::stock::Availability;

use crate::error::Result;
use crate::models::Product;
use crate::services::catalog::CatalogService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

const fn default_quantity() -> u32 {
    1
}

/// `GET /products`
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    Ok(Json(CatalogService::new(state.store()).list().await?))
}

/// `GET /products/{id}`
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    Ok(Json(CatalogService::new(state.store()).get(id).await?))
}

/// `GET /products/{id}/availability?quantity=n`
pub async fn availability(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Availability>> {
    let availability = CatalogService::new(state.store())
        .check_availability(id, query.quantity)
        .await?;
    Ok(Json(availability))
}
