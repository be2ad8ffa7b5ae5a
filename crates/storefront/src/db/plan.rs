//! Store-agnostic planning of writes.
//!
//! Each store locks the rows it needs, hands the snapshots to these
//! functions, and applies the returned plan. Keeping the decisions here means
//! [`super::PgStore`] and [`super::MemoryStore`] cannot disagree on a rule.

use std::collections::{BTreeMap, HashMap};

use cartwright_core::cart::{self, MergeReport};
use cartwright_core::lifecycle;
use cartwright_core::pricing::{self, PricedOrder, ProductSnapshot};
use cartwright_core::stock::{self, StockPolicy};
use cartwright_core::{OrderStatus, ProductId};

use super::RepositoryError;
use crate::models::Backorder;

/// A requested cart mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartChange {
    /// Add units on top of the current quantity.
    Add(u32),
    /// Overwrite the quantity.
    Set(u32),
}

/// Decide the new quantity for a cart line.
///
/// `product` is the locked product row, `None` if it does not exist.
///
/// # Errors
///
/// Fails for a missing or inactive product, or when the result would exceed
/// stock. The caller must then leave the line untouched.
pub fn admit_cart_change(
    product_id: ProductId,
    product: Option<&ProductSnapshot>,
    current: u32,
    change: CartChange,
) -> Result<u32, RepositoryError> {
    let product = product.ok_or(RepositoryError::ProductNotFound(product_id))?;
    if !product.active {
        return Err(RepositoryError::ProductUnavailable(product_id));
    }
    let quantity = match change {
        CartChange::Add(qty) => cart::admit_add(product_id, current, qty, product.stock)?,
        CartChange::Set(qty) => cart::admit_set(product_id, qty, product.stock)?,
    };
    Ok(quantity)
}

/// Everything order placement writes.
#[derive(Debug, Clone)]
pub struct OrderPlan {
    pub priced: PricedOrder,
    /// New stock level per product, in ID order.
    pub stock_levels: Vec<(ProductId, u32)>,
    pub backorders: Vec<Backorder>,
}

/// Plan an order from requested lines and locked product rows.
///
/// Duplicate products are summed. Zero quantities and missing or inactive
/// products are dropped.
///
/// # Errors
///
/// Returns [`RepositoryError::InsufficientStock`] when `policy` enforces
/// stock and a line exceeds it, and [`RepositoryError::EmptyOrder`] when no
/// line survives.
pub fn plan_order(
    lines: &[(ProductId, u32)],
    products: &HashMap<ProductId, ProductSnapshot>,
    policy: StockPolicy,
) -> Result<OrderPlan, RepositoryError> {
    let mut wanted: BTreeMap<ProductId, u32> = BTreeMap::new();
    for &(product_id, quantity) in lines.iter().filter(|(_, q)| *q > 0) {
        let entry = wanted.entry(product_id).or_insert(0);
        *entry = entry.saturating_add(quantity);
    }

    let mut usable = Vec::with_capacity(wanted.len());
    let mut stock_levels = Vec::with_capacity(wanted.len());
    let mut backorders = Vec::new();
    for (product_id, quantity) in wanted {
        let Some(product) = products.get(&product_id).filter(|p| p.active) else {
            tracing::debug!(%product_id, "Dropping unorderable line");
            continue;
        };
        let reservation = stock::reserve(product_id, product.stock, quantity, policy)?;
        if reservation.shortfall > 0 {
            backorders.push(Backorder {
                product_id,
                shortfall: reservation.shortfall,
            });
        }
        stock_levels.push((product_id, reservation.remaining));
        usable.push((product, quantity));
    }

    let priced = pricing::price_order(usable)?;
    Ok(OrderPlan {
        priced,
        stock_levels,
        backorders,
    })
}

/// Stock movement caused by a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockMove {
    /// Give ordered units back.
    Restore,
    /// Take ordered units out again (an admin revived a cancelled order).
    Reclaim,
}

#[must_use]
pub const fn stock_move(from: OrderStatus, to: OrderStatus) -> Option<StockMove> {
    if lifecycle::restores_stock(from, to) {
        Some(StockMove::Restore)
    } else if lifecycle::reclaims_stock(from, to) {
        Some(StockMove::Reclaim)
    } else {
        None
    }
}

/// Apply a [`StockMove`] of `quantity` units to `stock`.
///
/// Reclaiming floors at zero: the order already exists and an admin asked
/// for it.
#[must_use]
pub const fn moved_stock(stock: u32, quantity: u32, movement: StockMove) -> u32 {
    match movement {
        StockMove::Restore => stock.saturating_add(quantity),
        StockMove::Reclaim => stock.saturating_sub(quantity),
    }
}

/// Result of planning a guest cart merge.
#[derive(Debug, Clone, Default)]
pub struct MergePlan {
    /// Final user cart quantity per product.
    pub upserts: Vec<(ProductId, u32)>,
    pub report: MergeReport,
}

/// Plan folding guest lines into a user cart.
#[must_use]
pub fn plan_merge(
    guest_lines: &[(ProductId, u32)],
    user_lines: &HashMap<ProductId, u32>,
    products: &HashMap<ProductId, ProductSnapshot>,
) -> MergePlan {
    let mut plan = MergePlan::default();
    for &(product_id, incoming) in guest_lines {
        let Some(product) = products.get(&product_id).filter(|p| p.active) else {
            plan.report.skipped += 1;
            continue;
        };
        let existing = user_lines.get(&product_id).copied().unwrap_or(0);
        let merged = cart::merge_quantity(existing, incoming, product.stock);
        if merged.quantity == 0 {
            plan.report.skipped += 1;
            continue;
        }
        if merged.capped {
            plan.report.capped += 1;
        }
        plan.report.merged += 1;
        plan.upserts.push((product_id, merged.quantity));
    }
    plan
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cartwright_core::Money;
    use rust_decimal::Decimal;

    use super::*;

    fn catalog(items: &[(i32, i64, u32, bool)]) -> HashMap<ProductId, ProductSnapshot> {
        items
            .iter()
            .map(|&(id, cents, stock, active)| {
                let id = ProductId::new(id);
                (
                    id,
                    ProductSnapshot {
                        id,
                        name: format!("p{id}"),
                        price: Money::new(Decimal::new(cents, 2)),
                        stock,
                        active,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_admit_missing_and_inactive() {
        let products = catalog(&[(1, 100, 5, false)]);
        assert!(matches!(
            admit_cart_change(ProductId::new(2), None, 0, CartChange::Add(1)),
            Err(RepositoryError::ProductNotFound(_))
        ));
        assert!(matches!(
            admit_cart_change(
                ProductId::new(1),
                products.get(&ProductId::new(1)),
                0,
                CartChange::Add(1)
            ),
            Err(RepositoryError::ProductUnavailable(_))
        ));
    }

    #[test]
    fn test_plan_order_sums_and_drops() {
        let products = catalog(&[(1, 500, 10, true), (2, 100, 10, false)]);
        let lines = [
            (ProductId::new(1), 2),
            (ProductId::new(2), 1),
            (ProductId::new(1), 1),
            (ProductId::new(3), 4),
        ];
        let plan = plan_order(&lines, &products, StockPolicy::Enforce).unwrap();

        assert_eq!(plan.priced.lines.len(), 1);
        assert_eq!(plan.priced.lines[0].quantity, 3);
        assert_eq!(plan.priced.total.amount(), Decimal::new(1500, 2));
        assert_eq!(plan.stock_levels, vec![(ProductId::new(1), 7)]);
        assert!(plan.backorders.is_empty());
    }

    #[test]
    fn test_plan_order_enforces_stock() {
        let products = catalog(&[(1, 500, 2, true)]);
        let err = plan_order(&[(ProductId::new(1), 3)], &products, StockPolicy::Enforce)
            .unwrap_err();
        assert!(matches!(err, RepositoryError::InsufficientStock(e) if e.available == 2));
    }

    #[test]
    fn test_plan_order_backorder() {
        let products = catalog(&[(1, 500, 2, true)]);
        let plan = plan_order(
            &[(ProductId::new(1), 3)],
            &products,
            StockPolicy::AllowBackorder,
        )
        .unwrap();
        assert_eq!(plan.stock_levels, vec![(ProductId::new(1), 0)]);
        assert_eq!(
            plan.backorders,
            vec![Backorder {
                product_id: ProductId::new(1),
                shortfall: 1
            }]
        );
    }

    #[test]
    fn test_plan_order_empty() {
        let products = catalog(&[(1, 500, 2, false)]);
        assert!(matches!(
            plan_order(&[(ProductId::new(1), 1)], &products, StockPolicy::Enforce),
            Err(RepositoryError::EmptyOrder)
        ));
        assert!(matches!(
            plan_order(&[], &products, StockPolicy::Enforce),
            Err(RepositoryError::EmptyOrder)
        ));
    }

    #[test]
    fn test_plan_merge() {
        let products = catalog(&[(1, 100, 5, true), (2, 100, 0, true), (3, 100, 9, false)]);
        let user_lines = HashMap::from([(ProductId::new(1), 3)]);
        let guest = [
            (ProductId::new(1), 4),
            (ProductId::new(2), 1),
            (ProductId::new(3), 1),
            (ProductId::new(4), 1),
        ];
        let plan = plan_merge(&guest, &user_lines, &products);

        assert_eq!(plan.upserts, vec![(ProductId::new(1), 5)]);
        assert_eq!(
            plan.report,
            MergeReport {
                merged: 1,
                capped: 1,
                skipped: 3
            }
        );
    }

    #[test]
    fn test_stock_move() {
        assert_eq!(
            stock_move(OrderStatus::Pending, OrderStatus::Cancelled),
            Some(StockMove::Restore)
        );
        assert_eq!(
            stock_move(OrderStatus::Cancelled, OrderStatus::Processing),
            Some(StockMove::Reclaim)
        );
        assert_eq!(stock_move(OrderStatus::Pending, OrderStatus::Shipped), None);
        assert_eq!(moved_stock(0, 3, StockMove::Reclaim), 0);
        assert_eq!(moved_stock(2, 3, StockMove::Restore), 5);
    }
}
