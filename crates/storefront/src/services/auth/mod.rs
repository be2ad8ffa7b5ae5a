//! Password authentication.
//!
//! Passwords are hashed with Argon2id and stored apart from the user row.
//! Emails are normalized to lowercase before lookup or insert.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tracing::instrument;

use cartwright_core::{Email, UserId, UserRole};

use crate::db::{RepositoryError, Store};
use crate::models::{NewUser, User};

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_NAME_LENGTH: usize = 200;

/// Account registration and login.
pub struct AuthService<'a> {
    store: &'a dyn Store,
}

impl<'a> AuthService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Register a new customer account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` or `AuthError::WeakPassword` for bad
    /// input, and `AuthError::UserAlreadyExists` if the email is taken.
    #[instrument(skip(self, password, name))]
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<User, AuthError> {
        self.create_account(email, password, name, UserRole::User)
            .await
    }

    /// Create an account with an explicit role (used by the admin CLI).
    ///
    /// # Errors
    ///
    /// Same as [`Self::register`].
    pub async fn create_account(
        &self,
        email: &str,
        password: &str,
        name: &str,
        role: UserRole,
    ) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password)?;
        let name = name.trim();
        if name.len() > MAX_NAME_LENGTH {
            return Err(AuthError::InvalidName(format!(
                "name must be at most {MAX_NAME_LENGTH} characters"
            )));
        }

        let password_hash = hash_password(password)?;

        let user = self
            .store
            .create_user(NewUser {
                email,
                name: name.to_owned(),
                role,
                password_hash,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, role = %user.role, "Account created");
        Ok(user)
    }

    /// Verify email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for an unknown email or a wrong
    /// password; the two cases are indistinguishable to the caller.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .store
            .get_user_with_password(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }

    /// Load a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user does not exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}

/// Validate password strength.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_short_password_rejected() {
        assert!(matches!(
            validate_password("short"),
            Err(AuthError::WeakPassword(_))
        ));
    }

    #[tokio::test]
    async fn test_register_then_login_case_insensitive() {
        let store = MemoryStore::new();
        let auth = AuthService::new(&store);

        let user = auth
            .register("Ada@Example.com", "analytical", "Ada")
            .await
            .unwrap();
        assert_eq!(user.email.as_str(), "ada@example.com");
        assert_eq!(user.role, UserRole::User);

        let logged_in = auth.login("ADA@example.com", "analytical").await.unwrap();
        assert_eq!(logged_in.id, user.id);
    }

    #[tokio::test]
    async fn test_duplicate_email_and_bad_login() {
        let store = MemoryStore::new();
        let auth = AuthService::new(&store);
        auth.register("a@b.com", "password1", "A").await.unwrap();

        assert!(matches!(
            auth.register("A@B.com", "password2", "B").await,
            Err(AuthError::UserAlreadyExists)
        ));
        assert!(matches!(
            auth.login("a@b.com", "password2").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("nobody@b.com", "password1").await,
            Err(AuthError::InvalidCredentials)
        ));
    }
}
