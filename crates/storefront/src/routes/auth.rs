//! Authentication route handlers.
//!
//! Login and registration cycle the session ID, store the [`CurrentUser`]
//! and then reconcile the guest cart and guest orders with the account.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::identity::session_error;
use crate::middleware::{RequireAuth, clear_current_user, set_current_user, take_guest_token};
use crate::models::{CurrentUser, User};
use crate::services::auth::AuthService;
use crate::services::merge::{AccountLinker, LinkReport};
use crate::state::AppState;

/// Body of `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// Body of `POST /auth/register`.
#[derive(Debug, Deserialize)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: String,
}

/// Response of login and registration.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: User,
    pub linked: LinkReport,
}

/// `POST /auth/register`
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(input): Json<RegisterInput>,
) -> Result<(StatusCode, Json<SessionResponse>)> {
    let user = AuthService::new(state.store())
        .register(&input.email, &input.password, &input.name)
        .await?;
    tracing::info!(user_id = %user.id, "User registered");

    let linked = start_session(&state, &session, &user).await?;
    Ok((StatusCode::CREATED, Json(SessionResponse { user, linked })))
}

/// `POST /auth/login`
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(input): Json<LoginInput>,
) -> Result<Json<SessionResponse>> {
    let user = AuthService::new(state.store())
        .login(&input.email, &input.password)
        .await?;
    tracing::info!(user_id = %user.id, "User logged in");

    let linked = start_session(&state, &session, &user).await?;
    Ok(Json(SessionResponse { user, linked }))
}

/// `POST /auth/logout`
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session).await.map_err(session_error)?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /auth/me`
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<User>> {
    Ok(Json(AuthService::new(state.store()).get_user(current.id).await?))
}

/// Log `user` into `session` and pull in their anonymous activity.
async fn start_session(state: &AppState, session: &Session, user: &User) -> Result<LinkReport> {
    let guest = take_guest_token(session).await?;
    let current = CurrentUser {
        id: user.id,
        email: user.email.clone(),
        role: user.role,
    };
    set_current_user(session, &current)
        .await
        .map_err(session_error)?;
    set_sentry_user(&user.id, Some(user.email.as_str()));

    Ok(AccountLinker::new(state.store())
        .link(&current, guest.as_ref())
        .await)
}
