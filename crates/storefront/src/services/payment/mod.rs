//! Payment gateway integration.
//!
//! Outbound: creating hosted checkout sessions through [`PaymentGateway`].
//! Inbound: signed webhook events, verified with [`SignatureVerifier`].

pub mod signature;
mod stripe;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use cartwright_core::MoneyError;

pub use signature::{DEFAULT_SIGNATURE_HEADER, SignatureError, SignatureVerifier};
pub use stripe::StripeGateway;

/// Event type that carries a completed checkout.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// Errors talking to the payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response could not be understood.
    #[error("Parse error: {0}")]
    Parse(String),

    /// An amount could not be expressed in minor units.
    #[error("Invalid amount: {0}")]
    Amount(#[from] MoneyError),
}

/// One line of a hosted checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayLineItem {
    pub name: String,
    /// Unit price in minor units.
    pub unit_amount: i64,
    pub quantity: u32,
}

/// Request for a hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionRequest {
    pub line_items: Vec<GatewayLineItem>,
    pub currency: String,
    pub customer_email: String,
    pub success_url: String,
    pub cancel_url: String,
    /// Echoed back on the completion webhook.
    pub metadata: BTreeMap<String, String>,
}

/// A created hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSessionHandle {
    pub id: String,
    pub url: String,
}

/// Outbound payment gateway API.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted checkout session.
    async fn create_checkout_session(
        &self,
        request: &SessionRequest,
    ) -> Result<CheckoutSessionHandle, GatewayError>;
}

/// Envelope of an inbound webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    /// Shape depends on the event type.
    pub object: serde_json::Value,
}

/// The `data.object` of a `checkout.session.completed` event.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletedSession {
    /// Gateway session ID.
    pub id: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl CompletedSession {
    /// Reference stored on the order: the payment intent, else the session.
    #[must_use]
    pub fn payment_reference(&self) -> &str {
        self.payment_intent
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.id)
    }
}
