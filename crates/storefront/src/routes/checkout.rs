//! Checkout route handlers.

use axum::{Json, extract::State, http::StatusCode};
use tower_sessions::Session;

use crate::error::Result;
use crate::middleware::{OptionalAuth, RequireAuth, guest_token};
use crate::models::Order;
use crate::services::checkout::{
    Buyer, CheckoutService, ManualCheckoutRequest, ShippingRequest,
};
use crate::services::payment::CheckoutSessionHandle;
use crate::state::AppState;

/// `POST /checkout/manual` - place an order immediately.
pub async fn manual(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Json(request): Json<ManualCheckoutRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    let token = match &user {
        Some(_) => None,
        None => guest_token(&session).await?,
    };
    let buyer = user
        .as_ref()
        .map_or(Buyer::Guest(token.as_ref()), Buyer::Customer);

    let order = CheckoutService::new(state.store(), state.notifier())
        .place_manual(buyer, request)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// `POST /checkout/session` - start a hosted gateway checkout.
pub async fn session(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(shipping): Json<ShippingRequest>,
) -> Result<(StatusCode, Json<CheckoutSessionHandle>)> {
    let handle = CheckoutService::new(state.store(), state.notifier())
        .start_session(&user, shipping, state.gateway(), state.session_settings())
        .await?;
    Ok((StatusCode::CREATED, Json(handle)))
}
