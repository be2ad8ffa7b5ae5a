//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::db::Store;
use crate::services::checkout::SessionSettings;
use crate::services::notify::OrderNotifier;
use crate::services::payment::{PaymentGateway, SignatureVerifier};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. Collaborators are held as
/// trait objects so tests can swap in the in-memory store and fakes.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    store: Arc<dyn Store>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn OrderNotifier>,
    verifier: SignatureVerifier,
    session_settings: SessionSettings,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn OrderNotifier>,
    ) -> Self {
        let verifier = SignatureVerifier::new(
            config.payment.webhook_secret.clone(),
            config.payment.signature_tolerance_secs,
        );
        let session_settings = SessionSettings::from_config(&config);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                gateway,
                notifier,
                verifier,
                session_settings,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    #[must_use]
    pub fn gateway(&self) -> &dyn PaymentGateway {
        self.inner.gateway.as_ref()
    }

    #[must_use]
    pub fn notifier(&self) -> &dyn OrderNotifier {
        self.inner.notifier.as_ref()
    }

    /// Verifier for inbound payment webhooks.
    #[must_use]
    pub fn verifier(&self) -> &SignatureVerifier {
        &self.inner.verifier
    }

    /// Currency and redirect URLs for gateway sessions.
    #[must_use]
    pub fn session_settings(&self) -> &SessionSettings {
        &self.inner.session_settings
    }
}
