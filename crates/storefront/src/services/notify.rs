//! Order notifications.
//!
//! Sending is best-effort: a failed notification is logged and never undoes
//! the order it describes.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use url::Url;

use cartwright_core::{Money, OrderId, ProductId};

use crate::models::Order;

/// Errors that can occur when delivering a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Receiver returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
}

/// Payload of the "order created" notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderCreatedEvent {
    pub order_id: OrderId,
    pub customer_email: String,
    pub line_items: Vec<NotifiedLine>,
    pub total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotifiedLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl From<&Order> for OrderCreatedEvent {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id,
            customer_email: order.shipping.email.to_string(),
            line_items: order
                .items
                .iter()
                .map(|item| NotifiedLine {
                    product_id: item.product_id,
                    product_name: item.product_name.clone(),
                    quantity: item.quantity,
                    unit_price: item.price,
                })
                .collect(),
            total: order.total,
        }
    }
}

/// Receiver of order events.
#[async_trait]
pub trait OrderNotifier: Send + Sync {
    async fn order_created(&self, event: &OrderCreatedEvent) -> Result<(), NotifyError>;
}

/// Posts events as JSON to a configured URL.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: Url,
}

impl WebhookNotifier {
    /// Create a notifier posting to `url`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(url: Url) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl OrderNotifier for WebhookNotifier {
    async fn order_created(&self, event: &OrderCreatedEvent) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&serde_json::json!({
                "type": "order.created",
                "data": event,
            }))
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NotifyError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}

/// Writes events to the log. Used when no notification URL is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl OrderNotifier for LogNotifier {
    async fn order_created(&self, event: &OrderCreatedEvent) -> Result<(), NotifyError> {
        tracing::info!(
            order_id = %event.order_id,
            customer_email = %event.customer_email,
            total = %event.total,
            lines = event.line_items.len(),
            "Order created"
        );
        Ok(())
    }
}

/// Send the "order created" event, logging instead of failing.
pub async fn announce_order(notifier: &dyn OrderNotifier, order: &Order) {
    let event = OrderCreatedEvent::from(order);
    if let Err(e) = notifier.order_created(&event).await {
        tracing::warn!(order_id = %order.id, error = %e, "Failed to send order notification");
    }
}
