//! Payment webhook reconciliation.
//!
//! Turns a verified `checkout.session.completed` event into exactly one
//! order. The signature is checked before the body is even parsed; replays
//! are detected through the completed checkout session or the unique
//! payment reference and answered as already processed. A paid snapshot
//! only takes its own products out of the cart.

use serde::Serialize;
use tracing::instrument;

use cartwright_core::stock::StockPolicy;
use cartwright_core::{CartOwner, Email, OrderId, ProductId, UserId};

use super::checkout::metadata;
use super::notify::{OrderNotifier, announce_order};
use super::payment::{CHECKOUT_COMPLETED, CompletedSession, SignatureVerifier, WebhookEvent};
use crate::db::Store;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::models::{CartClear, CheckoutSessionRecord, NewOrder, ShippingInfo, User};

/// What happened to a delivered event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// A new order was created.
    Created { order_id: OrderId },
    /// The payment already has an order; nothing changed.
    AlreadyProcessed { order_id: OrderId },
    /// Event type is not handled.
    Ignored { event_type: String },
}

pub struct WebhookReconciler<'a> {
    store: &'a dyn Store,
    verifier: &'a SignatureVerifier,
    notifier: &'a dyn OrderNotifier,
}

impl<'a> WebhookReconciler<'a> {
    #[must_use]
    pub const fn new(
        store: &'a dyn Store,
        verifier: &'a SignatureVerifier,
        notifier: &'a dyn OrderNotifier,
    ) -> Self {
        Self {
            store,
            verifier,
            notifier,
        }
    }

    /// Verify and process one delivery.
    ///
    /// # Errors
    ///
    /// `InvalidSignature` before anything else is looked at,
    /// `WebhookProcessing` for authentic events that cannot become an order,
    /// `EmptyCart` when neither snapshot nor cart has lines.
    #[instrument(skip_all)]
    pub async fn handle(&self, signature: Option<&str>, body: &[u8]) -> Result<WebhookOutcome> {
        self.verifier.verify(signature, body)?;

        let event: WebhookEvent = serde_json::from_slice(body)
            .map_err(|e| AppError::WebhookProcessing(format!("unreadable event: {e}")))?;

        if event.kind != CHECKOUT_COMPLETED {
            tracing::debug!(event_id = %event.id, event_type = %event.kind, "Ignoring webhook event");
            return Ok(WebhookOutcome::Ignored {
                event_type: event.kind,
            });
        }

        let session: CompletedSession = serde_json::from_value(event.data.object)
            .map_err(|e| AppError::WebhookProcessing(format!("unreadable session: {e}")))?;
        self.complete(&event.id, &session).await
    }

    async fn complete(&self, event_id: &str, session: &CompletedSession) -> Result<WebhookOutcome> {
        let user_id = session
            .metadata
            .get(metadata::USER_ID)
            .and_then(|raw| raw.parse::<UserId>().ok())
            .ok_or_else(|| {
                AppError::WebhookProcessing(format!(
                    "session {} has no valid user_id metadata",
                    session.id
                ))
            })?;
        let user = self.store.get_user(user_id).await?.ok_or_else(|| {
            AppError::WebhookProcessing(format!("user {user_id} does not exist"))
        })?;

        let snapshot = self.store.get_checkout_session(&session.id).await?;
        if let Some(order_id) = snapshot.as_ref().and_then(|s| s.completed_order_id) {
            tracing::info!(
                event_id,
                session_id = %session.id,
                %order_id,
                "Checkout session already completed"
            );
            return Ok(WebhookOutcome::AlreadyProcessed { order_id });
        }

        let owner = CartOwner::User(user_id);
        let (lines, clear_cart) = match &snapshot {
            Some(record) => {
                let lines = record.line_pairs();
                let paid = lines.iter().map(|(id, _)| *id).collect();
                (lines, CartClear::Products(owner, paid))
            }
            None => {
                tracing::warn!(
                    session_id = %session.id,
                    "No checkout snapshot, falling back to the live cart"
                );
                let lines = self
                    .store
                    .cart_lines(&owner)
                    .await?
                    .iter()
                    .filter(|l| l.is_orderable())
                    .map(|l| (l.product_id, l.quantity))
                    .collect::<Vec<(ProductId, u32)>>();
                (lines, CartClear::All(owner))
            }
        };

        let reference = session.payment_reference().to_owned();
        let placed = self
            .store
            .place_order(NewOrder {
                owner_id: Some(user_id),
                shipping: shipping_for(session, snapshot.as_ref(), &user),
                lines,
                payment_reference: Some(reference.clone()),
                stock_policy: StockPolicy::AllowBackorder,
                clear_cart: Some(clear_cart),
                checkout_session: snapshot.as_ref().map(|s| s.id.clone()),
            })
            .await?;

        let order = placed.order;
        if !placed.created {
            tracing::info!(
                event_id,
                order_id = %order.id,
                payment_reference = %reference,
                "Webhook replay, order already exists"
            );
            return Ok(WebhookOutcome::AlreadyProcessed { order_id: order.id });
        }

        for backorder in &placed.backorders {
            tracing::warn!(
                order_id = %order.id,
                product_id = %backorder.product_id,
                shortfall = backorder.shortfall,
                "Paid order exceeds stock"
            );
        }
        tracing::info!(
            event_id,
            order_id = %order.id,
            total = %order.total,
            "Order created from payment"
        );
        add_breadcrumb("checkout", "Order created from payment", &[("order_id", order.id.to_string())]);
        announce_order(self.notifier, &order).await;

        Ok(WebhookOutcome::Created { order_id: order.id })
    }
}

/// Shipping from session metadata, then the snapshot, then the profile.
fn shipping_for(
    session: &CompletedSession,
    snapshot: Option<&CheckoutSessionRecord>,
    user: &User,
) -> ShippingInfo {
    let meta = |key: &str| {
        session
            .metadata
            .get(key)
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
    };

    let fallback = snapshot.map_or_else(
        || ShippingInfo {
            name: user.name.clone(),
            email: user.email.clone(),
            phone: None,
            address: None,
            city: None,
            postal_code: None,
            country: None,
        },
        |s| s.shipping.clone(),
    );

    ShippingInfo {
        name: meta(metadata::NAME).unwrap_or(fallback.name),
        email: meta(metadata::EMAIL)
            .and_then(|e| Email::parse(&e).ok())
            .unwrap_or(fallback.email),
        phone: meta(metadata::PHONE).or(fallback.phone),
        address: meta(metadata::ADDRESS).or(fallback.address),
        city: meta(metadata::CITY).or(fallback.city),
        postal_code: meta(metadata::POSTAL_CODE).or(fallback.postal_code),
        country: meta(metadata::COUNTRY).or(fallback.country),
    }
}
