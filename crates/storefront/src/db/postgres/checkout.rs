//! Checkout session snapshots.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;

use cartwright_core::{OrderId, UserId};

use super::PgStore;
use crate::db::{CheckoutSessionStore, RepositoryError, conflict_on_unique};
use crate::models::checkout::SnapshotLine;
use crate::models::{CheckoutSessionRecord, ShippingInfo};

#[derive(sqlx::FromRow)]
struct CheckoutSessionRow {
    id: String,
    user_id: UserId,
    lines: Json<Vec<SnapshotLine>>,
    shipping: Json<ShippingInfo>,
    created_at: DateTime<Utc>,
    completed_order_id: Option<OrderId>,
}

impl From<CheckoutSessionRow> for CheckoutSessionRecord {
    fn from(r: CheckoutSessionRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            lines: r.lines.0,
            shipping: r.shipping.0,
            created_at: r.created_at,
            completed_order_id: r.completed_order_id,
        }
    }
}

#[async_trait]
impl CheckoutSessionStore for PgStore {
    async fn save_checkout_session(
        &self,
        record: &CheckoutSessionRecord,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO storefront.checkout_session (id, user_id, lines, shipping, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(&record.id)
        .bind(record.user_id)
        .bind(Json(&record.lines))
        .bind(Json(&record.shipping))
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "checkout session"))?;

        Ok(())
    }

    async fn get_checkout_session(
        &self,
        id: &str,
    ) -> Result<Option<CheckoutSessionRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, CheckoutSessionRow>(
            r"
            SELECT id, user_id, lines, shipping, created_at, completed_order_id
            FROM storefront.checkout_session
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(CheckoutSessionRecord::from))
    }
}
