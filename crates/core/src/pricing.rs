//! Server-side order pricing.
//!
//! Totals are always derived from product snapshots taken inside the order
//! transaction. Nothing a client sends is trusted as a price.

use serde::{Deserialize, Serialize};

use crate::{Money, ProductId};

/// Product state observed at pricing time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: u32,
    pub active: bool,
}

/// A priced order line, copied onto the order item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub line_total: Money,
}

/// Priced lines and their total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedOrder {
    pub lines: Vec<PricedLine>,
    pub total: Money,
}

impl PricedOrder {
    /// Number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }
}

/// Pricing failures.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PricingError {
    /// No priceable lines.
    #[error("cart is empty")]
    Empty,
    /// A line references a product that is not for sale.
    #[error("product {0} is not available")]
    Unavailable(ProductId),
}

/// Price `(snapshot, quantity)` pairs.
///
/// Lines with a zero quantity are ignored. Stock is not checked here; the
/// caller applies its [`crate::stock::StockPolicy`] separately.
///
/// # Errors
///
/// Returns [`PricingError::Unavailable`] for an inactive product and
/// [`PricingError::Empty`] when no line remains.
pub fn price_order<'a, I>(lines: I) -> Result<PricedOrder, PricingError>
where
    I: IntoIterator<Item = (&'a ProductSnapshot, u32)>,
{
    let mut priced = Vec::new();
    for (product, quantity) in lines {
        if quantity == 0 {
            continue;
        }
        if !product.active {
            return Err(PricingError::Unavailable(product.id));
        }
        priced.push(PricedLine {
            product_id: product.id,
            name: product.name.clone(),
            unit_price: product.price,
            quantity,
            line_total: product.price.times(quantity),
        });
    }
    if priced.is_empty() {
        return Err(PricingError::Empty);
    }
    let total = priced.iter().map(|l| l.line_total).sum();
    Ok(PricedOrder {
        lines: priced,
        total,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn product(id: i32, cents: i64, active: bool) -> ProductSnapshot {
        ProductSnapshot {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            price: Money::price(Decimal::new(cents, 2)).unwrap(),
            stock: 10,
            active,
        }
    }

    #[test]
    fn test_total_is_sum_of_line_totals() {
        let a = product(1, 1250, true);
        let b = product(2, 399, true);
        let order = price_order([(&a, 2), (&b, 3)]).unwrap();

        assert_eq!(order.lines.len(), 2);
        assert_eq!(order.lines[0].line_total.amount(), Decimal::new(2500, 2));
        assert_eq!(order.total.amount(), Decimal::new(3697, 2));
        assert_eq!(order.item_count(), 5);
    }

    #[test]
    fn test_zero_quantity_lines_are_skipped() {
        let a = product(1, 100, true);
        let b = product(2, 100, true);
        let order = price_order([(&a, 0), (&b, 1)]).unwrap();
        assert_eq!(order.lines.len(), 1);
        assert_eq!(order.lines[0].product_id, ProductId::new(2));
    }

    #[test]
    fn test_empty_is_an_error() {
        assert_eq!(price_order([]), Err(PricingError::Empty));
        let a = product(1, 100, true);
        assert_eq!(price_order([(&a, 0)]), Err(PricingError::Empty));
    }

    #[test]
    fn test_inactive_product_rejected() {
        let a = product(7, 100, false);
        assert_eq!(
            price_order([(&a, 1)]),
            Err(PricingError::Unavailable(ProductId::new(7)))
        );
    }
}
