//! Stock ledger rules.
//!
//! Availability is a read of the product's current stock. Units are taken out
//! of stock only when an order is placed, via [`reserve`].

use serde::{Deserialize, Serialize};

use crate::ProductId;

/// Outcome of an availability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    /// Whether the requested quantity can be supplied.
    pub ok: bool,
    /// Units currently in stock.
    pub available: u32,
}

impl Availability {
    /// Check a requested quantity against current stock.
    #[must_use]
    pub const fn check(stock: u32, requested: u32) -> Self {
        Self {
            ok: requested <= stock,
            available: stock,
        }
    }

    /// Availability of a product that is missing or not for sale.
    #[must_use]
    pub const fn unavailable() -> Self {
        Self {
            ok: false,
            available: 0,
        }
    }
}

/// Raised when a quantity would exceed the units in stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
pub struct StockError {
    /// Product that is short.
    pub product_id: ProductId,
    /// Quantity that was asked for.
    pub requested: u32,
    /// Units actually in stock.
    pub available: u32,
}

/// How order placement treats a line that exceeds stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StockPolicy {
    /// Reject the whole order.
    #[default]
    Enforce,
    /// Accept the line and floor stock at zero. Used for orders that were
    /// already paid for, where refusing would drop a captured payment.
    AllowBackorder,
}

/// Result of taking units out of stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    /// Stock level after the reservation.
    pub remaining: u32,
    /// Units that could not be covered (non-zero only for backorders).
    pub shortfall: u32,
}

/// Take `quantity` units out of `stock` according to `policy`.
///
/// # Errors
///
/// Returns [`StockError`] when `policy` is [`StockPolicy::Enforce`] and the
/// quantity exceeds stock.
pub const fn reserve(
    product_id: ProductId,
    stock: u32,
    quantity: u32,
    policy: StockPolicy,
) -> Result<Reservation, StockError> {
    if quantity <= stock {
        return Ok(Reservation {
            remaining: stock - quantity,
            shortfall: 0,
        });
    }
    match policy {
        StockPolicy::Enforce => Err(StockError {
            product_id,
            requested: quantity,
            available: stock,
        }),
        StockPolicy::AllowBackorder => Ok(Reservation {
            remaining: 0,
            shortfall: quantity - stock,
        }),
    }
}
