//! Cart ownership.
//!
//! A cart line belongs to exactly one owner: an authenticated user or an
//! anonymous guest identified by an opaque token the client holds.

use core::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::id::UserId;

/// Number of random bytes in a freshly issued guest token.
const GUEST_TOKEN_BYTES: usize = 32;

/// Errors produced when accepting a client-supplied guest token.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GuestTokenError {
    /// Token length is outside the accepted range.
    #[error("guest token must be between {min} and {max} characters")]
    Length {
        /// Minimum accepted length.
        min: usize,
        /// Maximum accepted length.
        max: usize,
    },
    /// Token contains characters outside the base64url alphabet.
    #[error("guest token contains invalid characters")]
    Alphabet,
}

/// Opaque identifier for an anonymous cart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GuestToken(String);

impl GuestToken {
    const MIN_LENGTH: usize = 16;
    const MAX_LENGTH: usize = 128;

    /// Issue a new random token.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0_u8; GUEST_TOKEN_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Accept a token presented by a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the token has the wrong length or alphabet.
    pub fn parse(s: &str) -> Result<Self, GuestTokenError> {
        if !(Self::MIN_LENGTH..=Self::MAX_LENGTH).contains(&s.len()) {
            return Err(GuestTokenError::Length {
                min: Self::MIN_LENGTH,
                max: Self::MAX_LENGTH,
            });
        }
        if !s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(GuestTokenError::Alphabet);
        }
        Ok(Self(s.to_owned()))
    }

    /// Token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for GuestToken {
    type Error = GuestTokenError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<GuestToken> for String {
    fn from(token: GuestToken) -> Self {
        token.0
    }
}

// Tokens are bearer credentials for a cart; keep them out of logs.
impl fmt::Display for GuestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = self.0.get(..6).unwrap_or_default();
        write!(f, "{prefix}…")
    }
}

/// The identity a cart belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CartOwner {
    /// Persisted cart of an authenticated user.
    User(UserId),
    /// Anonymous cart keyed by a client-held token.
    Guest(GuestToken),
}

impl CartOwner {
    /// The owning user, if authenticated.
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User(id) => Some(*id),
            Self::Guest(_) => None,
        }
    }

    /// The guest token, if anonymous.
    #[must_use]
    pub const fn guest_token(&self) -> Option<&GuestToken> {
        match self {
            Self::User(_) => None,
            Self::Guest(token) => Some(token),
        }
    }
}

impl fmt::Display for CartOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Guest(token) => write!(f, "guest:{token}"),
        }
    }
}
