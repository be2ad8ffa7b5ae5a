//! Order route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use cartwright_core::{OrderId, OrderStatus};

use crate::error::Result;
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::Order;
use crate::services::orders::OrderService;
use crate::state::AppState;

/// `GET /orders` - the caller's orders.
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(OrderService::new(state.store()).list_for(user.id).await?))
}

/// `GET /orders/{id}`
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(OrderService::new(state.store()).get_for(&user, id).await?))
}

/// `PATCH /orders/{id}/cancel`
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(OrderService::new(state.store()).cancel(&user, id).await?))
}

#[derive(Debug, Deserialize)]
pub struct StatusInput {
    pub status: OrderStatus,
}

/// `PATCH /orders/{id}/status` (admin)
pub async fn set_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(input): Json<StatusInput>,
) -> Result<Json<Order>> {
    tracing::info!(admin_id = %admin.id, order_id = %id, status = %input.status, "Admin status change");
    let order = OrderService::new(state.store())
        .set_status(id, input.status)
        .await?;
    Ok(Json(order))
}

/// `DELETE /orders/{id}` (admin)
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
) -> Result<StatusCode> {
    tracing::info!(admin_id = %admin.id, order_id = %id, "Admin order delete");
    OrderService::new(state.store()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct OrderFilter {
    #[serde(default)]
    pub status: Option<OrderStatus>,
}

/// `GET /admin/orders?status=`
pub async fn admin_index(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(
        OrderService::new(state.store())
            .list_all(filter.status)
            .await?,
    ))
}
