//! Persisted checkout sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cartwright_core::{OrderId, ProductId, UserId};

use super::ShippingInfo;

/// Cart snapshot taken when a gateway checkout session is created.
///
/// The webhook builds the order from this snapshot rather than the live cart,
/// so edits made while the customer is paying cannot change what was paid for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSessionRecord {
    /// Gateway session ID.
    pub id: String,
    pub user_id: UserId,
    pub lines: Vec<SnapshotLine>,
    pub shipping: ShippingInfo,
    pub created_at: DateTime<Utc>,
    pub completed_order_id: Option<OrderId>,
}

/// One `(product, quantity)` pair in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl CheckoutSessionRecord {
    /// Snapshot lines as `(product, quantity)` pairs.
    #[must_use]
    pub fn line_pairs(&self) -> Vec<(ProductId, u32)> {
        self.lines
            .iter()
            .map(|l| (l.product_id, l.quantity))
            .collect()
    }
}
