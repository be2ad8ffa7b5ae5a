//! Catalog queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use cartwright_core::{Money, ProductId};

use super::{PgStore, to_i32, to_u32};
use crate::db::{CatalogStore, RepositoryError};
use crate::models::{NewProduct, Product, ProductUpdate};

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    description: Option<String>,
    price: Money,
    stock: i32,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(r: ProductRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            name: r.name,
            description: r.description,
            price: r.price,
            stock: to_u32(r.stock, "product.stock")?,
            active: r.active,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

const PRODUCT_COLUMNS: &str = "id, name, description, price, stock, active, created_at, updated_at";

#[async_trait]
impl CatalogStore for PgStore {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    async fn list_products(&self, include_inactive: bool) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM storefront.product
             WHERE active OR $1
             ORDER BY id"
        ))
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "INSERT INTO storefront.product (name, description, price, stock, active)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(to_i32(product.stock)?)
        .bind(product.active)
        .fetch_one(&self.pool)
        .await?;

        Product::try_from(row)
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Option<Product>, RepositoryError> {
        let stock = update.stock.map(to_i32).transpose()?;
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "UPDATE storefront.product SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                stock = COALESCE($5, stock),
                active = COALESCE($6, active),
                updated_at = now()
             WHERE id = $1
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .bind(&update.name)
        .bind(&update.description)
        .bind(update.price)
        .bind(stock)
        .bind(update.active)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }
}
