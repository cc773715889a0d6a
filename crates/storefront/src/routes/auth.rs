//! Authentication route handlers.
//!
//! Sign-in and sign-out also reconcile the session cart with the account's
//! remote cart.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use secrecy::{ExposeSecret, SecretString};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::middleware::{OptionalAuth, clear_current_user, set_current_user};
use crate::models::session::{load_cart, store_cart};
use crate::models::{CurrentUser, User};
use crate::services::AuthService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: SecretString,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: User,
    /// Local entries uploaded to the account during sign-in.
    pub uploaded: usize,
}

/// POST /auth/register
///
/// Creates the account and signs it in.
#[instrument(skip(state, session, credentials))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(credentials): Json<Credentials>,
) -> Result<Json<SessionResponse>> {
    let user = AuthService::new(state.pool())
        .register(&credentials.email, credentials.password.expose_secret())
        .await?;
    tracing::info!(user_id = %user.id, "Account registered");
    sign_in(&state, &session, user).await
}

/// POST /auth/login
#[instrument(skip(state, session, credentials))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(credentials): Json<Credentials>,
) -> Result<Json<SessionResponse>> {
    let user = AuthService::new(state.pool())
        .login(&credentials.email, credentials.password.expose_secret())
        .await?;
    sign_in(&state, &session, user).await
}

async fn sign_in(state: &AppState, session: &Session, user: User) -> Result<Json<SessionResponse>> {
    let mut cart = load_cart(session).await?;
    let outcome = state.carts().sign_in(&mut cart, user.id).await;
    store_cart(session, &cart).await?;

    set_current_user(
        session,
        &CurrentUser {
            id: user.id,
            email: user.email.clone(),
        },
    )
    .await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    add_breadcrumb("auth", "Signed in", None);

    Ok(Json(SessionResponse {
        user,
        uploaded: outcome.uploads.len(),
    }))
}

/// POST /auth/logout
///
/// Pushes unsynced cart state to the account, then empties the session cart.
#[instrument(skip(state, session, user))]
pub async fn logout(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<serde_json::Value>> {
    let Some(user) = user else {
        return Err(AppError::Unauthorized("Not signed in".to_string()));
    };

    let mut cart = load_cart(&session).await?;
    state.carts().sign_out(&mut cart, user.id).await;
    store_cart(&session, &cart).await?;
    clear_current_user(&session).await?;
    clear_sentry_user();

    Ok(Json(serde_json::json!({ "status": "ok" })))
}
