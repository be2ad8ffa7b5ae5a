//! Cart route handlers.
//!
//! Work for both guests and logged-in users; see [`CartIdentity`].

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use cartwright_core::ProductId;

use crate::error::Result;
use crate::middleware::CartIdentity;
use crate::models::CartView;
use crate::services::cart::CartService;
use crate::state::AppState;

/// Body of `POST /cart` and `PATCH /cart`.
#[derive(Debug, Deserialize)]
pub struct CartLineInput {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// `GET /cart`
pub async fn show(State(state): State<AppState>, identity: CartIdentity) -> Result<Json<CartView>> {
    Ok(Json(CartService::new(state.store()).view(&identity.owner).await?))
}

/// `POST /cart` - add units to a line.
pub async fn add(
    State(state): State<AppState>,
    identity: CartIdentity,
    Json(input): Json<CartLineInput>,
) -> Result<Json<CartView>> {
    let view = CartService::new(state.store())
        .add(&identity.owner, input.product_id, input.quantity)
        .await?;
    Ok(Json(view))
}

/// `PATCH /cart` - set a line's quantity (zero or less removes it).
pub async fn update(
    State(state): State<AppState>,
    identity: CartIdentity,
    Json(input): Json<CartLineInput>,
) -> Result<Json<CartView>> {
    let view = CartService::new(state.store())
        .set_quantity(&identity.owner, input.product_id, input.quantity)
        .await?;
    Ok(Json(view))
}

/// `DELETE /cart/{product_id}`
pub async fn remove(
    State(state): State<AppState>,
    identity: CartIdentity,
    Path(product_id): Path<ProductId>,
) -> Result<StatusCode> {
    CartService::new(state.store())
        .remove(&identity.owner, product_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /cart`
pub async fn clear(State(state): State<AppState>, identity: CartIdentity) -> Result<StatusCode> {
    CartService::new(state.store()).clear(&identity.owner).await?;
    Ok(StatusCode::NO_CONTENT)
}
