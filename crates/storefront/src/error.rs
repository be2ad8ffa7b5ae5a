//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server errors to Sentry
//! before responding to the client. Route handlers and services return
//! `Result<T, AppError>`; the response body is always
//! `{"error": <code>, "message": <text>}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use cartwright_core::lifecycle::CancelError;
use cartwright_core::stock::StockError;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::payment::{GatewayError, SignatureError};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Requested quantity exceeds stock.
    #[error(transparent)]
    InsufficientStock(#[from] StockError),

    /// Checkout found nothing orderable.
    #[error("cart is empty")]
    EmptyCart,

    /// Order status change not allowed.
    #[error("{0}")]
    InvalidTransition(String),

    /// Webhook signature verification failed.
    #[error("invalid signature: {0}")]
    InvalidSignature(#[from] SignatureError),

    /// Webhook was authentic but could not be turned into an order.
    #[error("webhook processing failed: {0}")]
    WebhookProcessing(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(RepositoryError),

    /// Payment gateway call failed.
    #[error("Payment gateway error: {0}")]
    Payment(#[from] GatewayError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::InsufficientStock(e) => Self::InsufficientStock(e),
            RepositoryError::ProductNotFound(id) => Self::NotFound(format!("product {id}")),
            RepositoryError::ProductUnavailable(id) => {
                Self::BadRequest(format!("product {id} is unavailable"))
            }
            RepositoryError::EmptyOrder => Self::EmptyCart,
            RepositoryError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Database(other),
        }
    }
}

impl From<CancelError> for AppError {
    fn from(err: CancelError) -> Self {
        match err {
            CancelError::NotOwner => Self::Forbidden("order does not belong to you".to_owned()),
            CancelError::InvalidTransition(_) => {
                Self::InvalidTransition("cannot cancel an order in progress".to_owned())
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InsufficientStock(_)
            | Self::EmptyCart
            | Self::InvalidTransition(_)
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::InvalidSignature(_) | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::WebhookProcessing(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Payment(_) => StatusCode::BAD_GATEWAY,
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::UserNotFound => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_)
                | AuthError::InvalidEmail(_)
                | AuthError::InvalidName(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InsufficientStock(_) => "insufficient_stock",
            Self::EmptyCart => "empty_cart",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::InvalidSignature(_) => "invalid_signature",
            Self::WebhookProcessing(_) => "webhook_processing",
            Self::Database(_) => "database",
            Self::Payment(_) => "payment",
            Self::Auth(AuthError::UserAlreadyExists) => "conflict",
            Self::Auth(AuthError::InvalidCredentials | AuthError::UserNotFound) => "unauthorized",
            Self::Auth(AuthError::Repository(_) | AuthError::PasswordHash) => "internal",
            Self::Auth(_) | Self::BadRequest(_) => "bad_request",
            Self::NotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::Conflict(_) => "conflict",
            Self::RateLimited => "rate_limited",
            Self::Internal(_) => "internal",
        }
    }

    /// Message safe to show to clients.
    fn public_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_owned(),
            Self::Payment(_) => "Payment service error".to_owned(),
            Self::InvalidSignature(_) => "Invalid signature".to_owned(),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::UserNotFound => {
                    "Invalid credentials".to_owned()
                }
                AuthError::UserAlreadyExists => {
                    "An account with this email already exists".to_owned()
                }
                AuthError::WeakPassword(msg) | AuthError::InvalidName(msg) => msg.clone(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_owned(),
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    "Internal server error".to_owned()
                }
            },
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg)
            | Self::Conflict(msg)
            | Self::InvalidTransition(msg)
            | Self::WebhookProcessing(msg) => msg.clone(),
            Self::InsufficientStock(_) | Self::EmptyCart | Self::RateLimited => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else if matches!(self, Self::InvalidSignature(_) | Self::WebhookProcessing(_)) {
            tracing::warn!(error = %self, "Webhook rejected");
        }

        let body = ErrorBody {
            error: self.code(),
            message: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a commerce event.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, String)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_owned()),
        message: Some(message.to_owned()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb
            .data
            .insert((*key).to_owned(), serde_json::Value::String(value.clone()));
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;
    use cartwright_core::{OrderStatus, ProductId};

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_owned());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_owned());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        let short = StockError {
            product_id: ProductId::new(1),
            requested: 6,
            available: 5,
        };
        assert_eq!(get_status(short.into()), StatusCode::BAD_REQUEST);
        assert_eq!(get_status(AppError::EmptyCart), StatusCode::BAD_REQUEST);
        assert_eq!(
            get_status(SignatureError::Mismatch.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::WebhookProcessing("x".to_owned())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(AppError::Forbidden("x".to_owned())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::Conflict("x".to_owned())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_owned())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_repository_errors_map_to_domain_variants() {
        let err: AppError = RepositoryError::EmptyOrder.into();
        assert!(matches!(err, AppError::EmptyCart));

        let err: AppError = RepositoryError::ProductNotFound(ProductId::new(9)).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err: AppError = RepositoryError::ProductUnavailable(ProductId::new(9)).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err: AppError = RepositoryError::DataCorruption("bad".to_owned()).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_cancel_errors() {
        let err: AppError = CancelError::NotOwner.into();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let err: AppError = CancelError::InvalidTransition(OrderStatus::Shipped).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "invalid_transition");
    }

    #[tokio::test]
    async fn test_error_body_hides_internal_details() {
        let response = AppError::Internal("connection refused at 10.0.0.3".to_owned())
            .into_response();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(body["error"], "internal");
        assert_eq!(body["message"], "Internal server error");
    }
}
