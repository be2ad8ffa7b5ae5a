//! Stripe-compatible checkout session client.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::instrument;
use url::Url;

use super::{CheckoutSessionHandle, GatewayError, PaymentGateway, SessionRequest};
use crate::config::PaymentConfig;

/// Gateway client using the `/v1/checkout/sessions` form API.
#[derive(Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    sessions_url: Url,
}

#[derive(Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

impl StripeGateway {
    /// Create a new gateway client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build or the key is not a
    /// valid header value.
    pub fn new(config: &PaymentConfig) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", config.secret_key.expose_secret());
        let mut auth = HeaderValue::from_str(&auth_value)
            .map_err(|e| GatewayError::Parse(format!("Invalid API key format: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(20))
            .build()?;

        let sessions_url = config
            .api_base
            .join("/v1/checkout/sessions")
            .map_err(|e| GatewayError::Parse(format!("Invalid API base: {e}")))?;

        Ok(Self {
            client,
            sessions_url,
        })
    }
}

/// Flatten a request into the gateway's bracketed form encoding.
fn form_fields(request: &SessionRequest) -> Vec<(String, String)> {
    let mut fields = vec![
        ("mode".to_owned(), "payment".to_owned()),
        ("success_url".to_owned(), request.success_url.clone()),
        ("cancel_url".to_owned(), request.cancel_url.clone()),
        ("customer_email".to_owned(), request.customer_email.clone()),
    ];
    for (i, item) in request.line_items.iter().enumerate() {
        let prefix = format!("line_items[{i}]");
        fields.push((
            format!("{prefix}[price_data][currency]"),
            request.currency.clone(),
        ));
        fields.push((
            format!("{prefix}[price_data][product_data][name]"),
            item.name.clone(),
        ));
        fields.push((
            format!("{prefix}[price_data][unit_amount]"),
            item.unit_amount.to_string(),
        ));
        fields.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
    }
    for (key, value) in &request.metadata {
        fields.push((format!("metadata[{key}]"), value.clone()));
    }
    fields
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self, request), fields(lines = request.line_items.len()))]
    async fn create_checkout_session(
        &self,
        request: &SessionRequest,
    ) -> Result<CheckoutSessionHandle, GatewayError> {
        let response = self
            .client
            .post(self.sessions_url.clone())
            .form(&form_fields(request))
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;
        let url = session
            .url
            .ok_or_else(|| GatewayError::Parse("session has no redirect url".to_owned()))?;

        tracing::info!(session_id = %session.id, "Checkout session created");
        Ok(CheckoutSessionHandle {
            id: session.id,
            url,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::services::payment::GatewayLineItem;

    #[test]
    fn test_form_fields_flatten_line_items_and_metadata() {
        let request = SessionRequest {
            line_items: vec![GatewayLineItem {
                name: "Mug".to_owned(),
                unit_amount: 1250,
                quantity: 2,
            }],
            currency: "usd".to_owned(),
            customer_email: "a@b.com".to_owned(),
            success_url: "https://shop.test/ok".to_owned(),
            cancel_url: "https://shop.test/cart".to_owned(),
            metadata: BTreeMap::from([("user_id".to_owned(), "7".to_owned())]),
        };
        let fields = form_fields(&request);
        let get = |k: &str| {
            fields
                .iter()
                .find(|(key, _)| key == k)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("mode"), Some("payment"));
        assert_eq!(get("line_items[0][price_data][unit_amount]"), Some("1250"));
        assert_eq!(get("line_items[0][price_data][product_data][name]"), Some("Mug"));
        assert_eq!(get("line_items[0][quantity]"), Some("2"));
        assert_eq!(get("metadata[user_id]"), Some("7"));
    }
}
