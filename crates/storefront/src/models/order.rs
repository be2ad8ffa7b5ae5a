//! Order types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cartwright_core::stock::StockPolicy;
use cartwright_core::{CartOwner, Email, Money, OrderId, OrderItemId, OrderStatus, ProductId, UserId};

/// Shipping snapshot copied onto an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingInfo {
    pub name: String,
    pub email: Email,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// A persisted order with its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    /// `None` for guest orders until claimed.
    pub owner_id: Option<UserId>,
    pub status: OrderStatus,
    /// Sum of item price × quantity, computed at creation.
    pub total: Money,
    pub shipping: ShippingInfo,
    /// Gateway payment identifier for orders created from a webhook.
    pub payment_reference: Option<String>,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order line. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: ProductId,
    /// Product name at order time.
    pub product_name: String,
    pub quantity: u32,
    /// Unit price at order time.
    pub price: Money,
}

/// Input to order placement.
///
/// Lines are `(product, quantity)` pairs; prices are looked up inside the
/// placement transaction.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub owner_id: Option<UserId>,
    pub shipping: ShippingInfo,
    pub lines: Vec<(ProductId, u32)>,
    pub payment_reference: Option<String>,
    pub stock_policy: StockPolicy,
    /// Cart lines removed in the same transaction as the insert.
    pub clear_cart: Option<CartClear>,
    /// Checkout session marked completed in the same transaction.
    pub checkout_session: Option<String>,
}

/// Which cart lines an order consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartClear {
    /// Every line in the cart.
    All(CartOwner),
    /// Only the lines for these products; anything added since is kept.
    Products(CartOwner, Vec<ProductId>),
}

/// A line that was accepted beyond available stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backorder {
    pub product_id: ProductId,
    pub shortfall: u32,
}

/// Result of order placement.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order: Order,
    /// `false` when an order with the same payment reference already existed.
    pub created: bool,
    pub backorders: Vec<Backorder>,
}

/// Result of a status change.
#[derive(Debug, Clone)]
pub enum StatusUpdate {
    Updated(Order),
    NotFound,
    /// The order was not in the expected status; carries the actual one.
    Conflict(OrderStatus),
}
