//! Account management commands.
//!
//! # Usage
//!
//! ```bash
//! # Create an admin account (password read from CW_ACCOUNT_PASSWORD if omitted)
//! cw-cli admin create -e admin@example.com -n "Admin Name"
//!
//! # Create a customer account
//! cw-cli admin create -e ann@example.com -n "Ann" -r user
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)

use thiserror::Error;

use cartwright_core::{UserId, UserRole};
use cartwright_storefront::db::{self, PgStore};
use cartwright_storefront::services::auth::{AuthError, AuthService};

use super::migrate::{self, MigrationError};

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Environment(#[from] MigrationError),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid role: {0}. Valid roles: admin, user")]
    InvalidRole(String),

    #[error("Account already exists with email: {0}")]
    UserExists(String),

    #[error(transparent)]
    Auth(AuthError),
}

/// Create a new account.
///
/// Email, password and name are validated by the same rules as
/// self-service registration.
///
/// # Errors
///
/// Returns an error for an unknown role, invalid input, a taken email or a
/// database failure.
pub async fn create_user(
    email: &str,
    name: &str,
    password: &str,
    role: &str,
) -> Result<UserId, AdminError> {
    let role: UserRole = role
        .parse()
        .map_err(|_| AdminError::InvalidRole(role.to_owned()))?;

    let database_url = migrate::database_url()?;

    tracing::info!("Connecting to storefront database...");
    let store = PgStore::new(db::create_pool(&database_url).await?);

    tracing::info!("Creating account: {} ({})", email, role);

    let user = AuthService::new(&store)
        .create_account(email, password, name, role)
        .await
        .map_err(|e| match e {
            AuthError::UserAlreadyExists => AdminError::UserExists(email.to_owned()),
            other => AdminError::Auth(other),
        })?;

    tracing::info!(
        "Account created successfully! ID: {}, Email: {}, Role: {}",
        user.id,
        user.email,
        user.role
    );

    Ok(user.id)
}
