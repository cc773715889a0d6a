//! Session middleware configuration.
//!
//! `PostgreSQL`-backed sessions with cookies signed by a key derived from
//! `STOREFRONT_SESSION_SECRET`.

use secrecy::ExposeSecret;
use sqlx::PgPool;
use cookie::Key;
use tower_sessions::cookie::SameSite;
use tower_sessions::service::SignedCookie;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::StorefrontConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "kr_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Create the session layer with `PostgreSQL` store.
///
/// The sessions table is created by migration, never at startup.
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &StorefrontConfig,
) -> SessionManagerLayer<PostgresStore, SignedCookie> {
    let store = PostgresStore::new(pool.clone());

    let key = session_key(config.session_secret.expose_secret());

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_secure())
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
        .with_signed(key)
}

/// Derive the cookie signing key from the configured secret.
///
/// Config validation guarantees at least 32 bytes, the minimum
/// `Key::derive_from` accepts.
fn session_key(secret: &str) -> Key {
    Key::derive_from(secret.as_bytes())
}
