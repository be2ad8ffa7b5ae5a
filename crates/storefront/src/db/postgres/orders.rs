//! Order queries.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use cartwright_core::{Email, Money, OrderId, OrderItemId, OrderStatus, ProductId, UserId};

use super::{PgStore, cart, lock_products, set_stock, to_i32, to_u32};
use crate::db::plan;
use crate::db::{OrderStore, RepositoryError};
use crate::models::{CartClear, NewOrder, Order, OrderItem, PlacedOrder, ShippingInfo, StatusUpdate};

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    owner_id: Option<UserId>,
    status: OrderStatus,
    total: Money,
    shipping_name: String,
    shipping_email: Email,
    shipping_phone: Option<String>,
    shipping_address: Option<String>,
    shipping_city: Option<String>,
    shipping_postal_code: Option<String>,
    shipping_country: Option<String>,
    payment_reference: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.id,
            owner_id: self.owner_id,
            status: self.status,
            total: self.total,
            shipping: ShippingInfo {
                name: self.shipping_name,
                email: self.shipping_email,
                phone: self.shipping_phone,
                address: self.shipping_address,
                city: self.shipping_city,
                postal_code: self.shipping_postal_code,
                country: self.shipping_country,
            },
            payment_reference: self.payment_reference,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: ProductId,
    product_name: String,
    quantity: i32,
    price: Money,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(r: OrderItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            product_id: r.product_id,
            product_name: r.product_name,
            quantity: to_u32(r.quantity, "order_item.quantity")?,
            price: r.price,
        })
    }
}

const ORDER_COLUMNS: &str = "id, owner_id, status, total, shipping_name, shipping_email, \
     shipping_phone, shipping_address, shipping_city, shipping_postal_code, shipping_country, \
     payment_reference, created_at, updated_at";

/// Attach items to order rows, keeping the row order.
async fn with_items(
    conn: &mut PgConnection,
    rows: Vec<OrderRow>,
) -> Result<Vec<Order>, RepositoryError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i32> = rows.iter().map(|r| r.id.as_i32()).collect();
    let item_rows = sqlx::query_as::<_, OrderItemRow>(
        r"
        SELECT id, order_id, product_id, product_name, quantity, price
        FROM storefront.order_item
        WHERE order_id = ANY($1)
        ORDER BY id
        ",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut items: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
    for row in item_rows {
        items
            .entry(row.order_id)
            .or_default()
            .push(OrderItem::try_from(row)?);
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let lines = items.remove(&row.id).unwrap_or_default();
            row.into_order(lines)
        })
        .collect())
}

async fn fetch_order(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<Option<Order>, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM storefront.orders WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => Ok(with_items(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

async fn fetch_order_by_reference(
    conn: &mut PgConnection,
    reference: &str,
) -> Result<Option<Order>, RepositoryError> {
    let id: Option<OrderId> =
        sqlx::query_scalar("SELECT id FROM storefront.orders WHERE payment_reference = $1")
            .bind(reference)
            .fetch_optional(&mut *conn)
            .await?;

    match id {
        Some(id) => fetch_order(conn, id).await,
        None => Ok(None),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

impl PgStore {
    /// Look up the order a replayed payment reference already produced.
    async fn existing_placement(&self, reference: &str) -> Result<PlacedOrder, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let order = fetch_order_by_reference(&mut conn, reference)
            .await?
            .ok_or_else(|| {
                RepositoryError::DataCorruption(format!(
                    "payment reference {reference} conflicted but no order holds it"
                ))
            })?;
        Ok(PlacedOrder {
            order,
            created: false,
            backorders: Vec::new(),
        })
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn place_order(&self, new: NewOrder) -> Result<PlacedOrder, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if let Some(reference) = &new.payment_reference
            && let Some(order) = fetch_order_by_reference(&mut tx, reference).await?
        {
            return Ok(PlacedOrder {
                order,
                created: false,
                backorders: Vec::new(),
            });
        }

        let ids: Vec<ProductId> = new.lines.iter().map(|(id, _)| *id).collect();
        let products = lock_products(&mut tx, &ids).await?;
        let plan = plan::plan_order(&new.lines, &products, new.stock_policy)?;

        for &(product_id, stock) in &plan.stock_levels {
            set_stock(&mut tx, product_id, stock).await?;
        }

        let shipping = &new.shipping;
        let inserted = sqlx::query_as::<_, OrderRow>(&format!(
            "INSERT INTO storefront.orders (
                owner_id, status, total, shipping_name, shipping_email, shipping_phone,
                shipping_address, shipping_city, shipping_postal_code, shipping_country,
                payment_reference
             )
             VALUES ($1, 'PENDING', $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(new.owner_id)
        .bind(plan.priced.total)
        .bind(&shipping.name)
        .bind(&shipping.email)
        .bind(&shipping.phone)
        .bind(&shipping.address)
        .bind(&shipping.city)
        .bind(&shipping.postal_code)
        .bind(&shipping.country)
        .bind(&new.payment_reference)
        .fetch_one(&mut *tx)
        .await;

        let row = match inserted {
            Ok(row) => row,
            // A concurrent delivery of the same payment won the insert.
            Err(e) if is_unique_violation(&e) => {
                drop(tx);
                let reference = new.payment_reference.as_deref().unwrap_or_default();
                return self.existing_placement(reference).await;
            }
            Err(e) => return Err(e.into()),
        };

        let mut items = Vec::with_capacity(plan.priced.lines.len());
        for line in &plan.priced.lines {
            let item = sqlx::query_as::<_, OrderItemRow>(
                r"
                INSERT INTO storefront.order_item (order_id, product_id, product_name, quantity, price)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, order_id, product_id, product_name, quantity, price
                ",
            )
            .bind(row.id)
            .bind(line.product_id)
            .bind(&line.name)
            .bind(to_i32(line.quantity)?)
            .bind(line.unit_price)
            .fetch_one(&mut *tx)
            .await?;
            items.push(OrderItem::try_from(item)?);
        }

        match &new.clear_cart {
            Some(CartClear::All(owner)) => {
                cart::clear(&mut tx, owner).await?;
            }
            Some(CartClear::Products(owner, products)) => {
                cart::remove_products(&mut tx, owner, products).await?;
            }
            None => {}
        }
        if let Some(session_id) = &new.checkout_session {
            sqlx::query(
                "UPDATE storefront.checkout_session SET completed_order_id = $2 WHERE id = $1",
            )
            .bind(session_id)
            .bind(row.id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(PlacedOrder {
            order: row.into_order(items),
            created: true,
            backorders: plan.backorders,
        })
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_order(&mut conn, id).await
    }

    async fn list_orders_for_user(&self, user: UserId) -> Result<Vec<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.orders
             WHERE owner_id = $1
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user)
        .fetch_all(&mut *conn)
        .await?;

        with_items(&mut conn, rows).await
    }

    async fn list_orders(
        &self,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.orders
             WHERE $1::storefront.order_status IS NULL OR status = $1
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(status)
        .fetch_all(&mut *conn)
        .await?;

        with_items(&mut conn, rows).await
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        expected: Option<OrderStatus>,
        status: OrderStatus,
    ) -> Result<StatusUpdate, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<OrderStatus> =
            sqlx::query_scalar("SELECT status FROM storefront.orders WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(current) = current else {
            return Ok(StatusUpdate::NotFound);
        };
        if expected.is_some_and(|e| e != current) {
            return Ok(StatusUpdate::Conflict(current));
        }

        if let Some(movement) = plan::stock_move(current, status) {
            let quantities: Vec<(ProductId, i32)> = sqlx::query_as(
                r"
                SELECT product_id, SUM(quantity)::INT
                FROM storefront.order_item
                WHERE order_id = $1
                GROUP BY product_id
                ",
            )
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;

            let ids: Vec<ProductId> = quantities.iter().map(|(pid, _)| *pid).collect();
            let products = lock_products(&mut tx, &ids).await?;
            for (product_id, quantity) in quantities {
                let Some(product) = products.get(&product_id) else {
                    continue;
                };
                let quantity = to_u32(quantity, "order_item.quantity")?;
                let stock = plan::moved_stock(product.stock, quantity, movement);
                set_stock(&mut tx, product_id, stock).await?;
            }
        }

        sqlx::query("UPDATE storefront.orders SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&mut *tx)
            .await?;
        let order = fetch_order(&mut tx, id).await?;
        tx.commit().await?;

        Ok(order.map_or(StatusUpdate::NotFound, StatusUpdate::Updated))
    }

    async fn delete_order(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM storefront.order_item WHERE order_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM storefront.orders WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    async fn claim_guest_orders(&self, user: UserId, email: &Email) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.orders
            SET owner_id = $1, updated_at = now()
            WHERE owner_id IS NULL AND lower(shipping_email) = $2
            ",
        )
        .bind(user)
        .bind(email.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
