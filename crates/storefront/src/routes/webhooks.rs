//! Payment webhook endpoint.

use axum::{Json, body::Bytes, extract::State, http::HeaderMap};

use crate::error::Result;
use crate::services::webhook::{WebhookOutcome, WebhookReconciler};
use crate::state::AppState;

/// `POST /webhooks/payment`
///
/// Takes the raw body: the signature covers the exact bytes sent. The
/// signature is read from the configured header.
pub async fn payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookOutcome>> {
    let signature = headers
        .get(&state.config().payment.signature_header)
        .and_then(|v| v.to_str().ok());

    let outcome = WebhookReconciler::new(state.store(), state.verifier(), state.notifier())
        .handle(signature, &body)
        .await?;
    Ok(Json(outcome))
}
