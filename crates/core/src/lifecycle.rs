//! Order lifecycle guards.
//!
//! Admins may set any status. Customers may only cancel their own order while
//! it is still pending.

use crate::{OrderStatus, UserId};

/// Why a customer cancellation was refused.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelError {
    /// Caller does not own the order (guest orders have no owner).
    #[error("order does not belong to the caller")]
    NotOwner,
    /// Order has left `PENDING`.
    #[error("cannot cancel an order in progress (status {0})")]
    InvalidTransition(OrderStatus),
}

/// Check that `caller` may cancel an order owned by `owner` in `status`.
///
/// # Errors
///
/// Returns [`CancelError::NotOwner`] for a foreign or guest order, otherwise
/// [`CancelError::InvalidTransition`] if the order is not pending. Ownership
/// is checked first so a non-owner learns nothing about the order's progress.
pub fn authorize_cancel(
    owner: Option<UserId>,
    status: OrderStatus,
    caller: UserId,
) -> Result<(), CancelError> {
    if owner != Some(caller) {
        return Err(CancelError::NotOwner);
    }
    if status != OrderStatus::Pending {
        return Err(CancelError::InvalidTransition(status));
    }
    Ok(())
}

/// Whether moving from `from` to `to` returns ordered units to stock.
#[must_use]
pub const fn restores_stock(from: OrderStatus, to: OrderStatus) -> bool {
    from.holds_stock() && !to.holds_stock()
}

/// Whether moving from `from` to `to` takes units out of stock again.
///
/// Happens when an admin revives a cancelled order.
#[must_use]
pub const fn reclaims_stock(from: OrderStatus, to: OrderStatus) -> bool {
    !from.holds_stock() && to.holds_stock()
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: UserId = UserId::new(1);
    const OTHER: UserId = UserId::new(2);

    #[test]
    fn test_owner_can_cancel_pending() {
        assert_eq!(authorize_cancel(Some(OWNER), OrderStatus::Pending, OWNER), Ok(()));
    }

    #[test]
    fn test_non_pending_is_invalid_transition() {
        for status in [
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(
                authorize_cancel(Some(OWNER), status, OWNER),
                Err(CancelError::InvalidTransition(status))
            );
        }
    }

    #[test]
    fn test_non_owner_and_guest_orders_are_refused() {
        assert_eq!(
            authorize_cancel(Some(OWNER), OrderStatus::Pending, OTHER),
            Err(CancelError::NotOwner)
        );
        assert_eq!(
            authorize_cancel(None, OrderStatus::Pending, OWNER),
            Err(CancelError::NotOwner)
        );
        // ownership wins over status
        assert_eq!(
            authorize_cancel(Some(OWNER), OrderStatus::Shipped, OTHER),
            Err(CancelError::NotOwner)
        );
    }

    #[test]
    fn test_stock_movement_on_status_change() {
        assert!(restores_stock(OrderStatus::Shipped, OrderStatus::Cancelled));
        assert!(!restores_stock(OrderStatus::Cancelled, OrderStatus::Cancelled));
        assert!(!restores_stock(OrderStatus::Pending, OrderStatus::Processing));
        assert!(reclaims_stock(OrderStatus::Cancelled, OrderStatus::Pending));
        assert!(!reclaims_stock(OrderStatus::Pending, OrderStatus::Shipped));
    }
}
