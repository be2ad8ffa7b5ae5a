//! Reconciling anonymous activity with an account after login.
//!
//! Runs once per anonymous to authenticated transition. Both steps are
//! best-effort: failures are logged and the login still succeeds.

use serde::Serialize;
use tracing::instrument;

use cartwright_core::GuestToken;
use cartwright_core::cart::MergeReport;

use crate::db::Store;
use crate::models::CurrentUser;

/// What reconciliation achieved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkReport {
    /// Guest cart merge result, if a guest cart was merged.
    pub cart: Option<MergeReport>,
    /// Guest orders attached to the account.
    pub claimed_orders: u64,
}

pub struct AccountLinker<'a> {
    store: &'a dyn Store,
}

impl<'a> AccountLinker<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Merge the guest cart into the user's cart and claim guest orders
    /// placed with the user's email.
    #[instrument(skip(self, user, guest), fields(user_id = %user.id))]
    pub async fn link(&self, user: &CurrentUser, guest: Option<&GuestToken>) -> LinkReport {
        let mut report = LinkReport::default();

        if let Some(token) = guest {
            match self.store.merge_guest_cart(token, user.id).await {
                Ok(merge) => {
                    if merge != MergeReport::default() {
                        tracing::info!(
                            merged = merge.merged,
                            capped = merge.capped,
                            skipped = merge.skipped,
                            "Guest cart merged"
                        );
                    }
                    report.cart = Some(merge);
                }
                Err(e) => tracing::warn!(error = %e, "Guest cart merge failed"),
            }
        }

        match self.store.claim_guest_orders(user.id, &user.email).await {
            Ok(claimed) => {
                if claimed > 0 {
                    tracing::info!(claimed, "Guest orders claimed");
                }
                report.claimed_orders = claimed;
            }
            Err(e) => tracing::warn!(error = %e, "Guest order claim failed"),
        }

        report
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cartwright_core::stock::StockPolicy;
    use cartwright_core::{CartOwner, Email};

    use super::*;
    use crate::db::{CartStore, CatalogStore, MemoryStore, OrderStore};
    use crate::models::{NewOrder, ProductUpdate, ShippingInfo};
    use crate::services::testing;

    fn shipping(email: &str) -> ShippingInfo {
        ShippingInfo {
            name: "Guest".to_owned(),
            email: Email::parse(email).unwrap(),
            phone: None,
            address: None,
            city: None,
            postal_code: None,
            country: None,
        }
    }

    #[tokio::test]
    async fn test_guest_cart_merges_capped_at_stock() {
        let store = MemoryStore::new();
        let mug = testing::product(&store, "Mug", 1250, 5).await;
        let tea = testing::product(&store, "Tea", 400, 5).await;
        let gone = testing::product(&store, "Gone", 100, 5).await;
        let user = testing::customer(&store, "ann@example.com").await;
        let token = GuestToken::generate();
        let guest = CartOwner::Guest(token.clone());
        let mine = CartOwner::User(user.id);

        store.add_to_cart(&mine, mug.id, 3).await.unwrap();
        store.add_to_cart(&guest, mug.id, 4).await.unwrap();
        store.add_to_cart(&guest, tea.id, 1).await.unwrap();
        store.add_to_cart(&guest, gone.id, 1).await.unwrap();
        store
            .update_product(
                gone.id,
                ProductUpdate {
                    active: Some(false),
                    ..ProductUpdate::default()
                },
            )
            .await
            .unwrap();

        let report = AccountLinker::new(&store).link(&user, Some(&token)).await;

        assert_eq!(
            report.cart,
            Some(MergeReport {
                merged: 2,
                capped: 1,
                skipped: 1
            })
        );
        let lines = store.cart_lines(&mine).await.unwrap();
        let quantities: Vec<_> = lines.iter().map(|l| (l.product_id, l.quantity)).collect();
        assert_eq!(quantities, vec![(mug.id, 5), (tea.id, 1)]);
        assert!(store.cart_lines(&guest).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_guest_orders_claimed_once() {
        let store = MemoryStore::new();
        let mug = testing::product(&store, "Mug", 1250, 5).await;
        let placed = store
            .place_order(NewOrder {
                owner_id: None,
                shipping: shipping("A@B.com"),
                lines: vec![(mug.id, 1)],
                payment_reference: None,
                stock_policy: StockPolicy::Enforce,
                clear_cart: None,
                checkout_session: None,
            })
            .await
            .unwrap();

        let user = testing::customer(&store, "a@b.com").await;
        let linker = AccountLinker::new(&store);

        assert_eq!(linker.link(&user, None).await.claimed_orders, 1);
        assert_eq!(linker.link(&user, None).await.claimed_orders, 0);

        let order = store.get_order(placed.order.id).await.unwrap().unwrap();
        assert_eq!(order.owner_id, Some(user.id));
    }

    #[tokio::test]
    async fn test_other_emails_are_not_claimed() {
        let store = MemoryStore::new();
        let mug = testing::product(&store, "Mug", 1250, 5).await;
        store
            .place_order(NewOrder {
                owner_id: None,
                shipping: shipping("someone@else.com"),
                lines: vec![(mug.id, 1)],
                payment_reference: None,
                stock_policy: StockPolicy::Enforce,
                clear_cart: None,
                checkout_session: None,
            })
            .await
            .unwrap();

        let user = testing::customer(&store, "a@b.com").await;
        let report = AccountLinker::new(&store).link(&user, None).await;
        assert_eq!(report.claimed_orders, 0);
        assert_eq!(report.cart, None);
    }
}
