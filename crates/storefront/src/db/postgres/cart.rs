//! Cart queries.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgConnection;

use cartwright_core::cart::MergeReport;
use cartwright_core::{CartOwner, GuestToken, Money, ProductId, UserId};

use super::{PgStore, lock_products, owner_columns, to_i32, to_u32};
use crate::db::plan::{self, CartChange};
use crate::db::{CartStore, RepositoryError};
use crate::models::CartLine;

#[derive(sqlx::FromRow)]
struct CartLineRow {
    product_id: ProductId,
    name: String,
    price: Money,
    quantity: i32,
    stock: i32,
    active: bool,
}

#[derive(sqlx::FromRow)]
struct QuantityRow {
    product_id: ProductId,
    quantity: i32,
}

/// Current quantities for `owner`.
async fn owner_quantities(
    conn: &mut PgConnection,
    owner: &CartOwner,
) -> Result<HashMap<ProductId, u32>, RepositoryError> {
    let (user_id, guest_token) = owner_columns(owner);
    let rows = sqlx::query_as::<_, QuantityRow>(
        r"
        SELECT product_id, quantity
        FROM storefront.cart_item
        WHERE user_id IS NOT DISTINCT FROM $1
          AND guest_token IS NOT DISTINCT FROM $2
        ORDER BY product_id
        ",
    )
    .bind(user_id)
    .bind(guest_token)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|r| Ok((r.product_id, to_u32(r.quantity, "cart_item.quantity")?)))
        .collect()
}

/// Write a line's quantity, inserting the row if it does not exist yet.
///
/// Callers hold the product lock, so no other writer can race the insert.
async fn write_line(
    conn: &mut PgConnection,
    owner: &CartOwner,
    product_id: ProductId,
    quantity: u32,
    exists: bool,
) -> Result<(), RepositoryError> {
    let (user_id, guest_token) = owner_columns(owner);
    let sql = if exists {
        r"
        UPDATE storefront.cart_item
        SET quantity = $4, updated_at = now()
        WHERE user_id IS NOT DISTINCT FROM $1
          AND guest_token IS NOT DISTINCT FROM $2
          AND product_id = $3
        "
    } else {
        r"
        INSERT INTO storefront.cart_item (user_id, guest_token, product_id, quantity)
        VALUES ($1, $2, $3, $4)
        "
    };
    sqlx::query(sql)
        .bind(user_id)
        .bind(guest_token)
        .bind(product_id)
        .bind(to_i32(quantity)?)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

impl PgStore {
    async fn change_cart(
        &self,
        owner: &CartOwner,
        product_id: ProductId,
        change: CartChange,
    ) -> Result<u32, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let products = lock_products(&mut tx, &[product_id]).await?;
        let (user_id, guest_token) = owner_columns(owner);
        let current: Option<i32> = sqlx::query_scalar(
            r"
            SELECT quantity FROM storefront.cart_item
            WHERE user_id IS NOT DISTINCT FROM $1
              AND guest_token IS NOT DISTINCT FROM $2
              AND product_id = $3
            ",
        )
        .bind(user_id)
        .bind(guest_token)
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?;
        let current_qty = current
            .map(|q| to_u32(q, "cart_item.quantity"))
            .transpose()?
            .unwrap_or(0);

        let quantity = plan::admit_cart_change(
            product_id,
            products.get(&product_id),
            current_qty,
            change,
        )?;
        write_line(&mut tx, owner, product_id, quantity, current.is_some()).await?;

        tx.commit().await?;
        Ok(quantity)
    }
}

#[async_trait]
impl CartStore for PgStore {
    async fn cart_lines(&self, owner: &CartOwner) -> Result<Vec<CartLine>, RepositoryError> {
        let (user_id, guest_token) = owner_columns(owner);
        let rows = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT c.product_id, p.name, p.price, c.quantity, p.stock, p.active
            FROM storefront.cart_item c
            JOIN storefront.product p ON p.id = c.product_id
            WHERE c.user_id IS NOT DISTINCT FROM $1
              AND c.guest_token IS NOT DISTINCT FROM $2
            ORDER BY c.product_id
            ",
        )
        .bind(user_id)
        .bind(guest_token)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(CartLine {
                    product_id: r.product_id,
                    name: r.name,
                    unit_price: r.price,
                    quantity: to_u32(r.quantity, "cart_item.quantity")?,
                    stock: to_u32(r.stock, "product.stock")?,
                    active: r.active,
                })
            })
            .collect()
    }

    async fn add_to_cart(
        &self,
        owner: &CartOwner,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<u32, RepositoryError> {
        self.change_cart(owner, product_id, CartChange::Add(quantity))
            .await
    }

    async fn set_cart_quantity(
        &self,
        owner: &CartOwner,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<u32, RepositoryError> {
        self.change_cart(owner, product_id, CartChange::Set(quantity))
            .await
    }

    async fn remove_from_cart(
        &self,
        owner: &CartOwner,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let (user_id, guest_token) = owner_columns(owner);
        let result = sqlx::query(
            r"
            DELETE FROM storefront.cart_item
            WHERE user_id IS NOT DISTINCT FROM $1
              AND guest_token IS NOT DISTINCT FROM $2
              AND product_id = $3
            ",
        )
        .bind(user_id)
        .bind(guest_token)
        .bind(product_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&self, owner: &CartOwner) -> Result<u64, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        clear(&mut conn, owner).await
    }

    async fn merge_guest_cart(
        &self,
        guest: &GuestToken,
        user: UserId,
    ) -> Result<MergeReport, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let guest_owner = CartOwner::Guest(guest.clone());
        let user_owner = CartOwner::User(user);

        // Product locks first, like every other cart writer, then re-read
        // the lines under them.
        let ids: Vec<ProductId> = owner_quantities(&mut tx, &guest_owner)
            .await?
            .into_keys()
            .collect();
        if ids.is_empty() {
            return Ok(MergeReport::default());
        }
        let products = lock_products(&mut tx, &ids).await?;
        let guest_lines: Vec<(ProductId, u32)> = owner_quantities(&mut tx, &guest_owner)
            .await?
            .into_iter()
            .collect();
        let user_lines = owner_quantities(&mut tx, &user_owner).await?;

        let merge = plan::plan_merge(&guest_lines, &user_lines, &products);
        for &(product_id, quantity) in &merge.upserts {
            let exists = user_lines.contains_key(&product_id);
            write_line(&mut tx, &user_owner, product_id, quantity, exists).await?;
        }
        clear(&mut tx, &guest_owner).await?;

        tx.commit().await?;
        Ok(merge.report)
    }
}

/// Delete every line of `owner`.
pub(super) async fn clear(
    conn: &mut PgConnection,
    owner: &CartOwner,
) -> Result<u64, RepositoryError> {
    let (user_id, guest_token) = owner_columns(owner);
    let result = sqlx::query(
        r"
        DELETE FROM storefront.cart_item
        WHERE user_id IS NOT DISTINCT FROM $1
          AND guest_token IS NOT DISTINCT FROM $2
        ",
    )
    .bind(user_id)
    .bind(guest_token)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Delete the lines of `owner` for `products`, keeping the rest.
pub(super) async fn remove_products(
    conn: &mut PgConnection,
    owner: &CartOwner,
    products: &[ProductId],
) -> Result<u64, RepositoryError> {
    let (user_id, guest_token) = owner_columns(owner);
    let raw: Vec<i32> = products.iter().map(ProductId::as_i32).collect();
    let result = sqlx::query(
        r"
        DELETE FROM storefront.cart_item
        WHERE user_id IS NOT DISTINCT FROM $1
          AND guest_token IS NOT DISTINCT FROM $2
          AND product_id = ANY($3)
        ",
    )
    .bind(user_id)
    .bind(guest_token)
    .bind(&raw)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}
