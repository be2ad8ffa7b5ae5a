//! Cart operations for users and guests.
//!
//! Every mutation returns the refreshed cart so handlers can answer with it
//! directly.

use tracing::instrument;

use cartwright_core::cart::QuantityChange;
use cartwright_core::{CartOwner, ProductId};

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::models::CartView;

pub struct CartService<'a> {
    store: &'a dyn Store,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// The cart joined with live product data.
    pub async fn view(&self, owner: &CartOwner) -> Result<CartView> {
        let lines = self.store.cart_lines(owner).await?;
        Ok(CartView::from_lines(lines))
    }

    /// Add `quantity` units of a product.
    ///
    /// # Errors
    ///
    /// `BadRequest` for a quantity below one, `InsufficientStock` if the line
    /// would exceed stock (the line is left unchanged).
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn add(
        &self,
        owner: &CartOwner,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<CartView> {
        let quantity = u32::try_from(quantity)
            .ok()
            .filter(|q| *q >= 1)
            .ok_or_else(|| AppError::BadRequest("quantity must be at least 1".to_owned()))?;

        let line = self.store.add_to_cart(owner, product_id, quantity).await?;
        tracing::debug!(quantity = line, "Cart line updated");
        self.view(owner).await
    }

    /// Overwrite a line's quantity. Zero or less removes the line.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn set_quantity(
        &self,
        owner: &CartOwner,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<CartView> {
        match QuantityChange::from_requested(quantity) {
            QuantityChange::Remove => {
                self.store.remove_from_cart(owner, product_id).await?;
            }
            QuantityChange::Set(quantity) => {
                self.store
                    .set_cart_quantity(owner, product_id, quantity)
                    .await?;
            }
        }
        self.view(owner).await
    }

    /// Remove a line. Removing a missing line is not an error.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn remove(&self, owner: &CartOwner, product_id: ProductId) -> Result<CartView> {
        self.store.remove_from_cart(owner, product_id).await?;
        self.view(owner).await
    }

    /// Empty the cart, returning the number of removed lines.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn clear(&self, owner: &CartOwner) -> Result<u64> {
        Ok(self.store.clear_cart(owner).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cartwright_core::GuestToken;

    use super::*;
    use crate::db::{CatalogStore, MemoryStore};
    use crate::models::ProductUpdate;
    use crate::services::testing;

    fn guest() -> CartOwner {
        CartOwner::Guest(GuestToken::generate())
    }

    #[tokio::test]
    async fn test_add_beyond_stock_leaves_line_unchanged() {
        let store = MemoryStore::new();
        let mug = testing::product(&store, "Mug", 1250, 5).await;
        let owner = guest();
        let carts = CartService::new(&store);

        carts.add(&owner, mug.id, 2).await.unwrap();
        let err = carts.add(&owner, mug.id, 4).await.unwrap_err();

        match err {
            AppError::InsufficientStock(e) => {
                assert_eq!(e.requested, 6);
                assert_eq!(e.available, 5);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
        let view = carts.view(&owner).await.unwrap();
        assert_eq!(view.lines[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_add_rejects_non_positive_quantity() {
        let store = MemoryStore::new();
        let mug = testing::product(&store, "Mug", 1250, 5).await;
        let carts = CartService::new(&store);

        for quantity in [0, -3] {
            let result = carts.add(&guest(), mug.id, quantity).await;
            assert!(matches!(result, Err(AppError::BadRequest(_))));
        }
    }

    #[tokio::test]
    async fn test_add_missing_and_inactive_products() {
        let store = MemoryStore::new();
        let mug = testing::product(&store, "Mug", 1250, 5).await;
        store
            .update_product(
                mug.id,
                ProductUpdate {
                    active: Some(false),
                    ..ProductUpdate::default()
                },
            )
            .await
            .unwrap();
        let carts = CartService::new(&store);

        let missing = carts.add(&guest(), ProductId::new(404), 1).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));

        let inactive = carts.add(&guest(), mug.id, 1).await;
        assert!(matches!(inactive, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_stock_admission_holds_over_sequences() {
        let store = MemoryStore::new();
        let mug = testing::product(&store, "Mug", 1250, 4).await;
        let owner = guest();
        let carts = CartService::new(&store);

        let steps: [(bool, i64); 7] = [
            (true, 1),
            (true, 2),
            (true, 2),
            (false, 9),
            (false, 4),
            (true, 1),
            (false, 3),
        ];
        for (is_add, quantity) in steps {
            let _ = if is_add {
                carts.add(&owner, mug.id, quantity).await
            } else {
                carts.set_quantity(&owner, mug.id, quantity).await
            };
            let view = carts.view(&owner).await.unwrap();
            assert!(view.lines.iter().all(|l| l.quantity <= l.stock));
        }
        assert_eq!(carts.view(&owner).await.unwrap().item_count, 3);
    }

    #[tokio::test]
    async fn test_set_zero_removes_and_remove_is_idempotent() {
        let store = MemoryStore::new();
        let mug = testing::product(&store, "Mug", 1250, 5).await;
        let owner = guest();
        let carts = CartService::new(&store);

        carts.add(&owner, mug.id, 2).await.unwrap();
        let view = carts.set_quantity(&owner, mug.id, 0).await.unwrap();
        assert!(view.lines.is_empty());

        carts.remove(&owner, mug.id).await.unwrap();
        assert_eq!(carts.clear(&owner).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_view_reports_live_subtotal() {
        let store = MemoryStore::new();
        let mug = testing::product(&store, "Mug", 1250, 5).await;
        let tea = testing::product(&store, "Tea", 400, 5).await;
        let owner = guest();
        let carts = CartService::new(&store);

        carts.add(&owner, mug.id, 2).await.unwrap();
        let view = carts.add(&owner, tea.id, 1).await.unwrap();

        assert_eq!(view.item_count, 3);
        assert_eq!(view.subtotal.to_string(), "29.00");
    }
}
