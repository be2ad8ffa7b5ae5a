//! Fixtures shared by the service tests.

#![allow(clippy::unwrap_used)]

use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;

use cartwright_core::{Email, Money, UserRole};

use super::notify::{NotifyError, OrderCreatedEvent, OrderNotifier};
use super::payment::{CheckoutSessionHandle, GatewayError, PaymentGateway, SessionRequest};
use crate::db::{CatalogStore, MemoryStore, UserStore};
use crate::models::{CurrentUser, NewProduct, NewUser, Product};

pub async fn product(store: &MemoryStore, name: &str, cents: i64, stock: u32) -> Product {
    store
        .create_product(NewProduct {
            name: name.to_owned(),
            description: None,
            price: Money::new(Decimal::new(cents, 2)),
            stock,
            active: true,
        })
        .await
        .unwrap()
}

pub async fn customer(store: &MemoryStore, email: &str) -> CurrentUser {
    let user = store
        .create_user(NewUser {
            email: Email::parse(email).unwrap(),
            name: "Test Customer".to_owned(),
            role: UserRole::User,
            password_hash: "unused".to_owned(),
        })
        .await
        .unwrap();
    CurrentUser {
        id: user.id,
        email: user.email,
        role: user.role,
    }
}

/// Gateway that records requests and hands out sequential session IDs.
#[derive(Default)]
pub struct FakeGateway {
    pub requests: Mutex<Vec<SessionRequest>>,
    pub fail: bool,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_checkout_session(
        &self,
        request: &SessionRequest,
    ) -> Result<CheckoutSessionHandle, GatewayError> {
        if self.fail {
            return Err(GatewayError::Api {
                status: 500,
                message: "gateway down".to_owned(),
            });
        }
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        let id = format!("cs_test_{}", requests.len());
        Ok(CheckoutSessionHandle {
            url: format!("https://pay.test/{id}"),
            id,
        })
    }
}

/// Notifier that keeps every event, optionally failing after recording.
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<OrderCreatedEvent>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

#[async_trait]
impl OrderNotifier for RecordingNotifier {
    async fn order_created(&self, event: &OrderCreatedEvent) -> Result<(), NotifyError> {
        self.events.lock().unwrap().push(event.clone());
        if self.fail {
            return Err(NotifyError::Api {
                status: 503,
                message: "unavailable".to_owned(),
            });
        }
        Ok(())
    }
}
