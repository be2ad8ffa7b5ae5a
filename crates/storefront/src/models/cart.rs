//! Cart types.

use serde::Serialize;

use cartwright_core::{Money, ProductId};

/// A cart line joined with the live product.
///
/// Price, stock and the active flag are read at listing time; they only get
/// frozen when an order is placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub stock: u32,
    pub active: bool,
}

impl CartLine {
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }

    /// Whether this line would survive checkout.
    #[must_use]
    pub const fn is_orderable(&self) -> bool {
        self.active && self.quantity > 0
    }
}

/// A cart as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    /// Sum of line totals for orderable lines.
    pub subtotal: Money,
    /// Units across orderable lines.
    pub item_count: u64,
}

impl CartView {
    #[must_use]
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        let orderable = lines.iter().filter(|l| l.is_orderable());
        let subtotal = orderable.clone().map(CartLine::line_total).sum();
        let item_count = orderable.map(|l| u64::from(l.quantity)).sum();
        Self {
            lines,
            subtotal,
            item_count,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.item_count == 0
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn line(id: i32, cents: i64, quantity: u32, active: bool) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            name: format!("p{id}"),
            unit_price: Money::new(Decimal::new(cents, 2)),
            quantity,
            stock: 10,
            active,
        }
    }

    #[test]
    fn test_view_totals_skip_inactive_lines() {
        let view = CartView::from_lines(vec![line(1, 250, 2, true), line(2, 1000, 1, false)]);
        assert_eq!(view.lines.len(), 2);
        assert_eq!(view.subtotal.amount(), Decimal::new(500, 2));
        assert_eq!(view.item_count, 2);
        assert!(!view.is_empty());
    }

    #[test]
    fn test_empty_view() {
        let view = CartView::from_lines(vec![line(2, 1000, 1, false)]);
        assert!(view.is_empty());
        assert_eq!(view.subtotal, Money::ZERO);
    }
}
