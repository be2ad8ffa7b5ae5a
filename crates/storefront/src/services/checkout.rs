//! Checkout: turning carts into orders.
//!
//! Two paths lead to an order:
//!
//! - **Manual**: the order is placed immediately from explicit items or the
//!   caller's cart, with stock enforced at commit.
//! - **Gateway session**: a hosted checkout is created from the user's cart
//!   and a snapshot is stored; the order is created later by the payment
//!   webhook (see [`super::webhook`]).
//!
//! In both paths prices come from the catalog, never from the client, and the
//! ordered lines leave the cart in the same transaction that creates the
//! order.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use cartwright_core::cart::{LineRequest, consolidate_lines};
use cartwright_core::stock::{Availability, StockError, StockPolicy};
use cartwright_core::{CartOwner, Email, GuestToken, ProductId};

use super::notify::{OrderNotifier, announce_order};
use super::payment::{
    CheckoutSessionHandle, GatewayError, GatewayLineItem, PaymentGateway, SessionRequest,
};
use crate::config::StorefrontConfig;
use crate::db::Store;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::models::checkout::SnapshotLine;
use crate::models::{
    CartClear, CartLine, CheckoutSessionRecord, CurrentUser, NewOrder, Order, ShippingInfo,
};

/// Metadata keys attached to gateway sessions and read back by the webhook.
pub mod metadata {
    pub const USER_ID: &str = "user_id";
    pub const NAME: &str = "shipping_name";
    pub const EMAIL: &str = "shipping_email";
    pub const PHONE: &str = "shipping_phone";
    pub const ADDRESS: &str = "shipping_address";
    pub const CITY: &str = "shipping_city";
    pub const POSTAL_CODE: &str = "shipping_postal_code";
    pub const COUNTRY: &str = "shipping_country";
}

/// Contact and address fields supplied at checkout.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShippingRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// Body of a manual checkout.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManualCheckoutRequest {
    /// Explicit lines. When absent the caller's cart is used.
    #[serde(default)]
    pub items: Option<Vec<LineRequest>>,
    #[serde(flatten)]
    pub shipping: ShippingRequest,
}

/// Fixed inputs of every gateway session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Lowercase ISO 4217 code.
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
}

impl SessionSettings {
    #[must_use]
    pub fn from_config(config: &StorefrontConfig) -> Self {
        let base = config.base_url.trim_end_matches('/');
        Self {
            currency: config.payment.currency.to_lowercase(),
            success_url: format!("{base}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}"),
            cancel_url: format!("{base}/cart"),
        }
    }
}

/// Who is checking out.
#[derive(Debug, Clone, Copy)]
pub enum Buyer<'b> {
    Customer(&'b CurrentUser),
    Guest(Option<&'b GuestToken>),
}

impl Buyer<'_> {
    fn cart(&self) -> Option<CartOwner> {
        match self {
            Self::Customer(user) => Some(CartOwner::User(user.id)),
            Self::Guest(token) => token.map(|t| CartOwner::Guest(t.clone())),
        }
    }
}

pub struct CheckoutService<'a> {
    store: &'a dyn Store,
    notifier: &'a dyn OrderNotifier,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store, notifier: &'a dyn OrderNotifier) -> Self {
        Self { store, notifier }
    }

    /// Place an order right away.
    ///
    /// # Errors
    ///
    /// `EmptyCart` if no usable line remains (nothing is created),
    /// `InsufficientStock` if a line exceeds stock at commit, `BadRequest`
    /// for missing guest contact details.
    #[instrument(skip(self, buyer, request))]
    pub async fn place_manual(
        &self,
        buyer: Buyer<'_>,
        request: ManualCheckoutRequest,
    ) -> Result<Order> {
        let (lines, source_cart) = match &request.items {
            Some(items) => (consolidate_lines(items), None),
            None => {
                let Some(owner) = buyer.cart() else {
                    return Err(AppError::EmptyCart);
                };
                let lines = orderable_pairs(&self.store.cart_lines(&owner).await?);
                (lines, Some(owner))
            }
        };
        if lines.is_empty() {
            return Err(AppError::EmptyCart);
        }

        let (owner_id, shipping) = match buyer {
            Buyer::Customer(user) => (
                Some(user.id),
                self.customer_shipping(user, request.shipping).await?,
            ),
            Buyer::Guest(_) => (None, guest_shipping(request.shipping)?),
        };

        let placed = self
            .store
            .place_order(NewOrder {
                owner_id,
                shipping,
                lines,
                payment_reference: None,
                stock_policy: StockPolicy::Enforce,
                clear_cart: source_cart.map(CartClear::All),
                checkout_session: None,
            })
            .await?;

        let order = placed.order;
        tracing::info!(order_id = %order.id, total = %order.total, "Manual order placed");
        add_breadcrumb("checkout", "Manual order placed", &[("order_id", order.id.to_string())]);
        announce_order(self.notifier, &order).await;
        Ok(order)
    }

    /// Start a hosted gateway checkout for the user's cart.
    ///
    /// No order exists until the gateway confirms payment.
    ///
    /// # Errors
    ///
    /// `EmptyCart` for an empty cart (no session is created),
    /// `InsufficientStock` if a line exceeds current stock, `Payment` if the
    /// gateway call fails.
    #[instrument(skip(self, gateway, settings, shipping), fields(user_id = %user.id))]
    pub async fn start_session(
        &self,
        user: &CurrentUser,
        shipping: ShippingRequest,
        gateway: &dyn PaymentGateway,
        settings: &SessionSettings,
    ) -> Result<CheckoutSessionHandle> {
        let lines: Vec<CartLine> = self
            .store
            .cart_lines(&CartOwner::User(user.id))
            .await?
            .into_iter()
            .filter(CartLine::is_orderable)
            .collect();
        if lines.is_empty() {
            return Err(AppError::EmptyCart);
        }

        for line in &lines {
            if !Availability::check(line.stock, line.quantity).ok {
                return Err(StockError {
                    product_id: line.product_id,
                    requested: line.quantity,
                    available: line.stock,
                }
                .into());
            }
        }

        let shipping = self.customer_shipping(user, shipping).await?;
        let line_items = lines
            .iter()
            .map(|line| {
                Ok(GatewayLineItem {
                    name: line.name.clone(),
                    unit_amount: line
                        .unit_price
                        .to_minor_units()
                        .map_err(GatewayError::from)?,
                    quantity: line.quantity,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let request = SessionRequest {
            line_items,
            currency: settings.currency.clone(),
            customer_email: shipping.email.to_string(),
            success_url: settings.success_url.clone(),
            cancel_url: settings.cancel_url.clone(),
            metadata: session_metadata(user, &shipping),
        };
        let handle = gateway.create_checkout_session(&request).await?;

        self.store
            .save_checkout_session(&CheckoutSessionRecord {
                id: handle.id.clone(),
                user_id: user.id,
                lines: lines
                    .iter()
                    .map(|l| SnapshotLine {
                        product_id: l.product_id,
                        quantity: l.quantity,
                    })
                    .collect(),
                shipping,
                created_at: Utc::now(),
                completed_order_id: None,
            })
            .await?;

        add_breadcrumb("checkout", "Checkout session created", &[("session_id", handle.id.clone())]);
        Ok(handle)
    }

    /// Shipping for a signed-in customer: request fields over profile defaults.
    async fn customer_shipping(
        &self,
        user: &CurrentUser,
        request: ShippingRequest,
    ) -> Result<ShippingInfo> {
        let name = match non_empty(request.name) {
            Some(name) => name,
            None => self
                .store
                .get_user(user.id)
                .await?
                .map(|u| u.name)
                .unwrap_or_default(),
        };
        let email = match non_empty(request.email) {
            Some(email) => parse_email(&email)?,
            None => user.email.clone(),
        };
        Ok(ShippingInfo {
            name,
            email,
            phone: non_empty(request.phone),
            address: non_empty(request.address),
            city: non_empty(request.city),
            postal_code: non_empty(request.postal_code),
            country: non_empty(request.country),
        })
    }
}

/// `(product, quantity)` pairs of the lines that can still be ordered.
fn orderable_pairs(lines: &[CartLine]) -> Vec<(ProductId, u32)> {
    lines
        .iter()
        .filter(|l| l.is_orderable())
        .map(|l| (l.product_id, l.quantity))
        .collect()
}

fn guest_shipping(request: ShippingRequest) -> Result<ShippingInfo> {
    let name = non_empty(request.name)
        .ok_or_else(|| AppError::BadRequest("name is required".to_owned()))?;
    let email = non_empty(request.email)
        .ok_or_else(|| AppError::BadRequest("email is required".to_owned()))?;
    Ok(ShippingInfo {
        name,
        email: parse_email(&email)?,
        phone: non_empty(request.phone),
        address: non_empty(request.address),
        city: non_empty(request.city),
        postal_code: non_empty(request.postal_code),
        country: non_empty(request.country),
    })
}

fn parse_email(raw: &str) -> Result<Email> {
    Email::parse(raw).map_err(|e| AppError::BadRequest(format!("invalid email: {e}")))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn session_metadata(user: &CurrentUser, shipping: &ShippingInfo) -> BTreeMap<String, String> {
    let mut meta = BTreeMap::new();
    meta.insert(metadata::USER_ID.to_owned(), user.id.to_string());
    meta.insert(metadata::NAME.to_owned(), shipping.name.clone());
    meta.insert(metadata::EMAIL.to_owned(), shipping.email.to_string());
    let optional = [
        (metadata::PHONE, &shipping.phone),
        (metadata::ADDRESS, &shipping.address),
        (metadata::CITY, &shipping.city),
        (metadata::POSTAL_CODE, &shipping.postal_code),
        (metadata::COUNTRY, &shipping.country),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            meta.insert(key.to_owned(), value.clone());
        }
    }
    meta
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cartwright_core::{Money, OrderStatus};
    use rust_decimal::Decimal;

    use super::*;
    use crate::db::{CartStore, CatalogStore, CheckoutSessionStore, MemoryStore, OrderStore};
    use crate::services::testing::{self, FakeGateway, RecordingNotifier};

    fn payment() -> SessionSettings {
        SessionSettings {
            currency: "usd".to_owned(),
            success_url: "https://shop.test/checkout/success".to_owned(),
            cancel_url: "https://shop.test/cart".to_owned(),
        }
    }

    fn guest_request(items: Vec<(ProductId, i64)>) -> ManualCheckoutRequest {
        ManualCheckoutRequest {
            items: Some(
                items
                    .into_iter()
                    .map(|(product_id, quantity)| LineRequest {
                        product_id,
                        quantity,
                    })
                    .collect(),
            ),
            shipping: ShippingRequest {
                name: Some("Guest".to_owned()),
                email: Some("a@b.com".to_owned()),
                ..ShippingRequest::default()
            },
        }
    }

    #[tokio::test]
    async fn test_manual_order_uses_server_prices_and_clears_cart() {
        let store = MemoryStore::new();
        let notifier = RecordingNotifier::default();
        let mug = testing::product(&store, "Mug", 1250, 5).await;
        let tea = testing::product(&store, "Tea", 400, 5).await;
        let user = testing::customer(&store, "ann@example.com").await;
        let owner = CartOwner::User(user.id);
        store.add_to_cart(&owner, mug.id, 2).await.unwrap();
        store.add_to_cart(&owner, tea.id, 1).await.unwrap();

        let order = CheckoutService::new(&store, &notifier)
            .place_manual(Buyer::Customer(&user), ManualCheckoutRequest::default())
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.owner_id, Some(user.id));
        assert_eq!(order.total, Money::new(Decimal::new(2900, 2)));
        assert_eq!(order.shipping.name, "Test Customer");
        assert!(store.cart_lines(&owner).await.unwrap().is_empty());
        assert_eq!(store.get_product(mug.id).await.unwrap().unwrap().stock, 3);
        assert_eq!(notifier.count(), 1);
    }

    #[tokio::test]
    async fn test_manual_order_failure_keeps_cart_and_stock() {
        let store = MemoryStore::new();
        let notifier = RecordingNotifier::default();
        let mug = testing::product(&store, "Mug", 1250, 5).await;
        let user = testing::customer(&store, "ann@example.com").await;
        let owner = CartOwner::User(user.id);
        store.add_to_cart(&owner, mug.id, 4).await.unwrap();
        store
            .update_product(
                mug.id,
                crate::models::ProductUpdate {
                    stock: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = CheckoutService::new(&store, &notifier)
            .place_manual(Buyer::Customer(&user), ManualCheckoutRequest::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InsufficientStock(_)));
        assert_eq!(store.cart_lines(&owner).await.unwrap()[0].quantity, 4);
        assert_eq!(store.get_product(mug.id).await.unwrap().unwrap().stock, 2);
        assert!(store.list_orders(None).await.unwrap().is_empty());
        assert_eq!(notifier.count(), 0);
    }

    #[tokio::test]
    async fn test_guest_items_are_consolidated() {
        let store = MemoryStore::new();
        let notifier = RecordingNotifier::default();
        let mug = testing::product(&store, "Mug", 1250, 5).await;

        let order = CheckoutService::new(&store, &notifier)
            .place_manual(
                Buyer::Guest(None),
                guest_request(vec![(mug.id, 1), (mug.id, 2), (ProductId::new(99), 1), (mug.id, -4)]),
            )
            .await
            .unwrap();

        assert_eq!(order.owner_id, None);
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].quantity, 3);
        assert_eq!(order.shipping.email.as_str(), "a@b.com");
    }

    #[tokio::test]
    async fn test_huge_item_quantities_are_rejected_not_wrapped() {
        let store = MemoryStore::new();
        let notifier = RecordingNotifier::default();
        let mug = testing::product(&store, "Mug", 1250, 5).await;

        let err = CheckoutService::new(&store, &notifier)
            .place_manual(
                Buyer::Guest(None),
                guest_request(vec![(mug.id, i64::MAX), (mug.id, 1)]),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InsufficientStock(_)));
        assert_eq!(store.get_product(mug.id).await.unwrap().unwrap().stock, 5);
        assert!(store.list_orders(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_guest_without_contact_is_rejected() {
        let store = MemoryStore::new();
        let notifier = RecordingNotifier::default();
        let mug = testing::product(&store, "Mug", 1250, 5).await;
        let mut request = guest_request(vec![(mug.id, 1)]);
        request.shipping.email = None;

        let err = CheckoutService::new(&store, &notifier)
            .place_manual(Buyer::Guest(None), request)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_guest_cart_checkout_clears_guest_cart() {
        let store = MemoryStore::new();
        let notifier = RecordingNotifier::default();
        let mug = testing::product(&store, "Mug", 1250, 5).await;
        let token = GuestToken::generate();
        let owner = CartOwner::Guest(token.clone());
        store.add_to_cart(&owner, mug.id, 2).await.unwrap();

        let mut request = guest_request(vec![]);
        request.items = None;
        let order = CheckoutService::new(&store, &notifier)
            .place_manual(Buyer::Guest(Some(&token)), request)
            .await
            .unwrap();

        assert_eq!(order.items[0].quantity, 2);
        assert!(store.cart_lines(&owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_items_create_nothing() {
        let store = MemoryStore::new();
        let notifier = RecordingNotifier::default();

        let err = CheckoutService::new(&store, &notifier)
            .place_manual(Buyer::Guest(None), guest_request(vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::EmptyCart));
        assert!(store.list_orders(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_notification_failure_keeps_order() {
        let store = MemoryStore::new();
        let notifier = RecordingNotifier {
            fail: true,
            ..RecordingNotifier::default()
        };
        let mug = testing::product(&store, "Mug", 1250, 5).await;

        let order = CheckoutService::new(&store, &notifier)
            .place_manual(Buyer::Guest(None), guest_request(vec![(mug.id, 1)]))
            .await
            .unwrap();
        assert!(store.get_order(order.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_session_on_empty_cart_creates_nothing() {
        let store = MemoryStore::new();
        let notifier = RecordingNotifier::default();
        let gateway = FakeGateway::default();
        let user = testing::customer(&store, "ann@example.com").await;

        let err = CheckoutService::new(&store, &notifier)
            .start_session(&user, ShippingRequest::default(), &gateway, &payment())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::EmptyCart));
        assert!(gateway.requests.lock().unwrap().is_empty());
        assert!(store.list_orders(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_session_snapshots_cart_and_sends_minor_units() {
        let store = MemoryStore::new();
        let notifier = RecordingNotifier::default();
        let gateway = FakeGateway::default();
        let mug = testing::product(&store, "Mug", 1250, 5).await;
        let user = testing::customer(&store, "ann@example.com").await;
        store
            .add_to_cart(&CartOwner::User(user.id), mug.id, 2)
            .await
            .unwrap();

        let handle = CheckoutService::new(&store, &notifier)
            .start_session(
                &user,
                ShippingRequest {
                    city: Some("Lisbon".to_owned()),
                    ..ShippingRequest::default()
                },
                &gateway,
                &payment(),
            )
            .await
            .unwrap();

        let requests = gateway.requests.lock().unwrap();
        assert_eq!(requests[0].line_items[0].unit_amount, 1250);
        assert_eq!(requests[0].line_items[0].quantity, 2);
        assert_eq!(requests[0].metadata[metadata::USER_ID], user.id.to_string());
        assert_eq!(requests[0].metadata[metadata::CITY], "Lisbon");

        let record = store
            .get_checkout_session(&handle.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.line_pairs(), vec![(mug.id, 2)]);
        assert!(store.list_orders(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_session_rejects_line_above_current_stock() {
        let store = MemoryStore::new();
        let notifier = RecordingNotifier::default();
        let gateway = FakeGateway::default();
        let mug = testing::product(&store, "Mug", 1250, 5).await;
        let user = testing::customer(&store, "ann@example.com").await;
        store
            .add_to_cart(&CartOwner::User(user.id), mug.id, 3)
            .await
            .unwrap();
        store
            .update_product(
                mug.id,
                crate::models::ProductUpdate {
                    stock: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = CheckoutService::new(&store, &notifier)
            .start_session(&user, ShippingRequest::default(), &gateway, &payment())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InsufficientStock(_)));
        assert!(gateway.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_gateway_failure_saves_no_snapshot() {
        let store = MemoryStore::new();
        let notifier = RecordingNotifier::default();
        let gateway = FakeGateway {
            fail: true,
            ..FakeGateway::default()
        };
        let mug = testing::product(&store, "Mug", 1250, 5).await;
        let user = testing::customer(&store, "ann@example.com").await;
        store
            .add_to_cart(&CartOwner::User(user.id), mug.id, 1)
            .await
            .unwrap();

        let err = CheckoutService::new(&store, &notifier)
            .start_session(&user, ShippingRequest::default(), &gateway, &payment())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Payment(_)));
        assert!(
            store
                .get_checkout_session("cs_test_1")
                .await
                .unwrap()
                .is_none()
        );
    }
}
