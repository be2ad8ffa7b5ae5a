//! Order reads and lifecycle changes.
//!
//! Customers may read their own orders and cancel them while pending.
//! Admins may set any status or delete an order outright; admin checks happen
//! at the route layer.

use tracing::instrument;

use cartwright_core::lifecycle::authorize_cancel;
use cartwright_core::{OrderId, OrderStatus, UserId};

use crate::db::Store;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::models::{CurrentUser, Order, StatusUpdate};

pub struct OrderService<'a> {
    store: &'a dyn Store,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// The caller's orders, newest first.
    pub async fn list_for(&self, user: UserId) -> Result<Vec<Order>> {
        Ok(self.store.list_orders_for_user(user).await?)
    }

    /// Every order, newest first, optionally filtered by status.
    pub async fn list_all(&self, status: Option<OrderStatus>) -> Result<Vec<Order>> {
        Ok(self.store.list_orders(status).await?)
    }

    /// An order visible to `caller` (its owner, or any admin).
    pub async fn get_for(&self, caller: &CurrentUser, id: OrderId) -> Result<Order> {
        let order = self.find(id).await?;
        if order.owner_id != Some(caller.id) && !caller.is_admin() {
            return Err(AppError::Forbidden("order does not belong to you".to_owned()));
        }
        Ok(order)
    }

    /// Customer cancellation. Only the owner, only while pending.
    ///
    /// The write is conditional on the order still being pending, so a
    /// concurrent admin change is never overwritten.
    #[instrument(skip(self, caller), fields(user_id = %caller.id))]
    pub async fn cancel(&self, caller: &CurrentUser, id: OrderId) -> Result<Order> {
        let order = self.find(id).await?;
        authorize_cancel(order.owner_id, order.status, caller.id)?;

        match self
            .store
            .update_order_status(id, Some(OrderStatus::Pending), OrderStatus::Cancelled)
            .await?
        {
            StatusUpdate::Updated(order) => {
                tracing::info!(order_id = %id, "Order cancelled by customer");
                add_breadcrumb("order", "Order cancelled", &[("order_id", id.to_string())]);
                Ok(order)
            }
            StatusUpdate::NotFound => Err(not_found(id)),
            StatusUpdate::Conflict(status) => {
                tracing::info!(order_id = %id, %status, "Cancel lost race with status change");
                Err(AppError::InvalidTransition(
                    "cannot cancel an order in progress".to_owned(),
                ))
            }
        }
    }

    /// Admin status override. Any status may follow any other.
    #[instrument(skip(self))]
    pub async fn set_status(&self, id: OrderId, status: OrderStatus) -> Result<Order> {
        match self.store.update_order_status(id, None, status).await? {
            StatusUpdate::Updated(order) => {
                tracing::info!(order_id = %id, %status, "Order status set");
                Ok(order)
            }
            StatusUpdate::NotFound => Err(not_found(id)),
            StatusUpdate::Conflict(actual) => Err(AppError::Internal(format!(
                "unconditional status update of order {id} conflicted with {actual}"
            ))),
        }
    }

    /// Admin hard delete. Stock is left as is.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: OrderId) -> Result<()> {
        if !self.store.delete_order(id).await? {
            return Err(not_found(id));
        }
        tracing::info!(order_id = %id, "Order deleted");
        Ok(())
    }

    async fn find(&self, id: OrderId) -> Result<Order> {
        self.store
            .get_order(id)
            .await?
            .ok_or_else(|| not_found(id))
    }
}

fn not_found(id: OrderId) -> AppError {
    AppError::NotFound(format!("order {id}"))
}
