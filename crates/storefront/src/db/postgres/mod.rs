//! `PostgreSQL` store.
//!
//! Queries are runtime-checked (`query`/`query_as` with `FromRow` rows).
//! Writes that depend on stock lock the product rows with `FOR UPDATE`,
//! always in ascending ID order, inside the same transaction as the write.

mod cart;
mod catalog;
mod checkout;
mod orders;
mod users;

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};

use cartwright_core::pricing::ProductSnapshot;
use cartwright_core::{CartOwner, Money, ProductId};

use super::{RepositoryError, Store};

/// Store backed by a `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Underlying pool (the session store shares it).
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Bind values for the owner columns of `cart_item`.
///
/// Exactly one is `Some`; rows are matched with `IS NOT DISTINCT FROM` on
/// both columns.
fn owner_columns(owner: &CartOwner) -> (Option<i32>, Option<&str>) {
    match owner {
        CartOwner::User(id) => (Some(id.as_i32()), None),
        CartOwner::Guest(token) => (None, Some(token.as_str())),
    }
}

#[derive(sqlx::FromRow)]
struct LockedProductRow {
    id: ProductId,
    name: String,
    price: Money,
    stock: i32,
    active: bool,
}

/// Lock the given products for the rest of the transaction.
///
/// Missing IDs are simply absent from the result.
async fn lock_products(
    conn: &mut PgConnection,
    ids: &[ProductId],
) -> Result<HashMap<ProductId, ProductSnapshot>, RepositoryError> {
    let mut raw: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
    raw.sort_unstable();
    raw.dedup();

    let rows = sqlx::query_as::<_, LockedProductRow>(
        r"
        SELECT id, name, price, stock, active
        FROM storefront.product
        WHERE id = ANY($1)
        ORDER BY id
        FOR UPDATE
        ",
    )
    .bind(&raw)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|r| {
            Ok((
                r.id,
                ProductSnapshot {
                    id: r.id,
                    name: r.name,
                    price: r.price,
                    stock: to_u32(r.stock, "product.stock")?,
                    active: r.active,
                },
            ))
        })
        .collect()
}

async fn set_stock(
    conn: &mut PgConnection,
    product_id: ProductId,
    stock: u32,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE storefront.product SET stock = $2, updated_at = now() WHERE id = $1")
        .bind(product_id)
        .bind(to_i32(stock)?)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Convert a non-negative database integer.
fn to_u32(value: i32, column: &str) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative {column}: {value}")))
}

/// Convert a quantity for binding.
fn to_i32(value: u32) -> Result<i32, RepositoryError> {
    i32::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("quantity out of range: {value}")))
}
