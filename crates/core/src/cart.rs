//! Cart admission control and merge arithmetic.
//!
//! Every cart mutation funnels through these functions while the caller holds
//! the product row lock, so the quantity stored for a line never exceeds the
//! stock observed at the time of the write.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ProductId;
use crate::stock::StockError;

/// What a "set quantity" request means for the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityChange {
    /// Quantity of zero or less: drop the line.
    Remove,
    /// Overwrite with this quantity.
    Set(u32),
}

impl QuantityChange {
    /// Interpret a client-supplied quantity.
    #[must_use]
    pub fn from_requested(quantity: i64) -> Self {
        if quantity <= 0 {
            return Self::Remove;
        }
        Self::Set(u32::try_from(quantity).unwrap_or(u32::MAX))
    }
}

/// Admit an `add` of `quantity` units on top of `current`.
///
/// The add is all-or-nothing: on failure the caller must leave the line as is.
///
/// # Errors
///
/// Returns [`StockError`] if `current + quantity` exceeds `stock`.
pub fn admit_add(
    product_id: ProductId,
    current: u32,
    quantity: u32,
    stock: u32,
) -> Result<u32, StockError> {
    let wanted = current.saturating_add(quantity);
    if wanted > stock {
        return Err(StockError {
            product_id,
            requested: wanted,
            available: stock,
        });
    }
    Ok(wanted)
}

/// Admit overwriting a line with `quantity` units.
///
/// # Errors
///
/// Returns [`StockError`] if `quantity` exceeds `stock`.
pub fn admit_set(product_id: ProductId, quantity: u32, stock: u32) -> Result<u32, StockError> {
    admit_add(product_id, 0, quantity, stock)
}

/// Quantity a merged line ends up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergedQuantity {
    /// Resulting quantity (may be zero when the product is out of stock).
    pub quantity: u32,
    /// Whether the sum was cut down to stock.
    pub capped: bool,
}

/// Sum an incoming guest line into an existing user line, capped at stock.
///
/// Merges never fail; an over-stock sum is silently reduced.
#[must_use]
pub fn merge_quantity(existing: u32, incoming: u32, stock: u32) -> MergedQuantity {
    let sum = existing.saturating_add(incoming);
    MergedQuantity {
        quantity: sum.min(stock),
        capped: sum > stock,
    }
}

/// Outcome of merging a guest cart into a user cart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    /// Guest lines that landed in the user cart.
    pub merged: u32,
    /// Of those, lines reduced to stock.
    pub capped: u32,
    /// Guest lines dropped (product gone, inactive or out of stock).
    pub skipped: u32,
}

/// Requested (product, quantity) pair from a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRequest {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Sum duplicate products and drop non-positive quantities.
///
/// Sums saturate, so a total past `u32::MAX` comes out as `u32::MAX` and
/// fails stock admission downstream. Output is sorted by product ID, which is also the order rows get locked in.
#[must_use]
pub fn consolidate_lines(lines: &[LineRequest]) -> Vec<(ProductId, u32)> {
    let mut totals: BTreeMap<ProductId, i64> = BTreeMap::new();
    for line in lines.iter().filter(|l| l.quantity > 0) {
        let total = totals.entry(line.product_id).or_insert(0);
        *total = total.saturating_add(line.quantity);
    }
    totals
        .into_iter()
        .map(|(id, qty)| (id, u32::try_from(qty).unwrap_or(u32::MAX)))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PID: ProductId = ProductId::new(9);

    #[test]
    fn test_add_within_stock() {
        assert_eq!(admit_add(PID, 2, 3, 5), Ok(5));
    }

    #[test]
    fn test_add_over_stock_is_rejected_whole() {
        // qty 2 in cart, stock 5, add 4 -> 6 > 5
        let err = admit_add(PID, 2, 4, 5).unwrap_err();
        assert_eq!(err.requested, 6);
        assert_eq!(err.available, 5);
    }

    #[test]
    fn test_add_does_not_overflow() {
        assert!(admit_add(PID, u32::MAX, 1, u32::MAX).is_err());
    }

    #[test]
    fn test_large_add_is_bounded_by_stock_only() {
        assert_eq!(admit_add(PID, 0, 15_000, 20_000), Ok(15_000));
        assert_eq!(admit_set(PID, 20_000, 20_000), Ok(20_000));

        let err = admit_add(PID, 15_000, 5_001, 20_000).unwrap_err();
        assert_eq!(err.requested, 20_001);
        assert_eq!(err.available, 20_000);
    }

    #[test]
    fn test_set() {
        assert_eq!(admit_set(PID, 5, 5), Ok(5));
        assert!(admit_set(PID, 6, 5).is_err());
    }

    #[test]
    fn test_quantity_change() {
        assert_eq!(QuantityChange::from_requested(0), QuantityChange::Remove);
        assert_eq!(QuantityChange::from_requested(-3), QuantityChange::Remove);
        assert_eq!(QuantityChange::from_requested(4), QuantityChange::Set(4));
    }

    #[test]
    fn test_merge_sums_then_caps() {
        assert_eq!(
            merge_quantity(2, 2, 10),
            MergedQuantity { quantity: 4, capped: false }
        );
        assert_eq!(
            merge_quantity(3, 4, 5),
            MergedQuantity { quantity: 5, capped: true }
        );
        assert_eq!(merge_quantity(0, 1, 0).quantity, 0);
        assert_eq!(
            merge_quantity(12_000, 3_000, 50_000),
            MergedQuantity { quantity: 15_000, capped: false }
        );
    }

    #[test]
    fn test_admission_invariant_over_sequences() {
        // Any sequence of adds and sets keeps the line within stock.
        let stock = 7;
        let mut qty = 0;
        for step in [3_i64, 5, -1, 2, 9, 4, 0, 7, 1] {
            if step % 2 == 0 {
                if let QuantityChange::Set(q) = QuantityChange::from_requested(step) {
                    if let Ok(q) = admit_set(PID, q, stock) {
                        qty = q;
                    }
                } else {
                    qty = 0;
                }
            } else if let Ok(q) = admit_add(PID, qty, u32::try_from(step.max(0)).unwrap(), stock) {
                qty = q;
            }
            assert!(qty <= stock);
        }
    }

    #[test]
    fn test_consolidate_lines() {
        let lines = [
            LineRequest { product_id: ProductId::new(2), quantity: 1 },
            LineRequest { product_id: ProductId::new(1), quantity: 2 },
            LineRequest { product_id: ProductId::new(2), quantity: 3 },
            LineRequest { product_id: ProductId::new(3), quantity: 0 },
            LineRequest { product_id: ProductId::new(4), quantity: -2 },
        ];
        assert_eq!(
            consolidate_lines(&lines),
            vec![(ProductId::new(1), 2), (ProductId::new(2), 4)]
        );
    }

    #[test]
    fn test_consolidate_lines_saturates() {
        let lines = [
            LineRequest { product_id: PID, quantity: i64::MAX },
            LineRequest { product_id: PID, quantity: 1 },
            LineRequest { product_id: ProductId::new(1), quantity: i64::from(u32::MAX) + 5 },
        ];
        assert_eq!(
            consolidate_lines(&lines),
            vec![(ProductId::new(1), u32::MAX), (PID, u32::MAX)]
        );
    }
}
