//! Cart identity for the current request.
//!
//! Authenticated requests use the user's cart. Anonymous requests get a guest
//! token, created on first use and kept in the session.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use cartwright_core::{CartOwner, GuestToken};

use crate::error::AppError;
use crate::models::CurrentUser;
use crate::models::session::keys;

/// Whose cart this request operates on.
pub struct CartIdentity {
    pub owner: CartOwner,
    pub user: Option<CurrentUser>,
}

impl<S> FromRequestParts<S> for CartIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or_else(|| AppError::Internal("session layer missing".to_owned()))?;

        let user = session
            .get::<CurrentUser>(keys::CURRENT_USER)
            .await
            .map_err(session_error)?;
        if let Some(user) = user {
            return Ok(Self {
                owner: CartOwner::User(user.id),
                user: Some(user),
            });
        }

        let token = match guest_token(session).await? {
            Some(token) => token,
            None => {
                let token = GuestToken::generate();
                session
                    .insert(keys::GUEST_TOKEN, &token)
                    .await
                    .map_err(session_error)?;
                token
            }
        };
        Ok(Self {
            owner: CartOwner::Guest(token),
            user: None,
        })
    }
}

/// The session's guest token, if one was issued.
///
/// # Errors
///
/// Returns `AppError::Internal` if the session store fails.
pub async fn guest_token(session: &Session) -> Result<Option<GuestToken>, AppError> {
    session
        .get::<GuestToken>(keys::GUEST_TOKEN)
        .await
        .map_err(session_error)
}

/// Remove and return the guest token, used once the guest logs in.
///
/// # Errors
///
/// Returns `AppError::Internal` if the session store fails.
pub async fn take_guest_token(session: &Session) -> Result<Option<GuestToken>, AppError> {
    session
        .remove::<GuestToken>(keys::GUEST_TOKEN)
        .await
        .map_err(session_error)
}

pub(crate) fn session_error(err: tower_sessions::session::Error) -> AppError {
    AppError::Internal(format!("session error: {err}"))
}
