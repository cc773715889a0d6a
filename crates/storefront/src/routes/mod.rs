//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Readiness (database ping)
//!
//! # Auth (strict rate limit)
//! POST /auth/register                   - Create account and sign in
//! POST /auth/login                      - Sign in, merge carts
//! POST /auth/logout                     - Flush cart, sign out
//!
//! # API (relaxed rate limit)
//! GET  /api/products                    - Catalog page
//! GET  /api/products/{id}               - Product detail
//! GET  /api/cart                        - Session cart
//! DELETE /api/cart                      - Clear cart
//! POST /api/cart/items                  - Add to cart
//! POST /api/cart/items/{id}/increase    - +1
//! POST /api/cart/items/{id}/decrease    - -1 (removes at 1)
//! DELETE /api/cart/items/{id}           - Remove line
//! GET  /api/wishlist                    - Wishlist ids
//! POST /api/wishlist                    - Add to wishlist
//! DELETE /api/wishlist/{id}             - Remove from wishlist
//! POST /api/wishlist/{id}/move-to-cart  - Move into cart
//! GET  /api/sync-status                 - Remote sync health
//! POST /api/sync-status/retry           - Re-upload session cart
//! GET  /api/addresses                   - Address book
//! POST /api/addresses                   - Create address
//! PUT  /api/addresses/{id}              - Update address
//! DELETE /api/addresses/{id}            - Delete address
//! POST /api/addresses/{id}/default      - Make default
//! GET  /api/pricing/rates               - Exchange-rate table
//! GET  /api/pricing/display             - Convert and format a USD amount
//! GET  /api/shipping/quote              - Shipping cost for a destination
//! POST /api/checkout                    - Submit order
//! POST /api/payments/paypal/capture     - Capture an approved hosted order
//! GET  /api/orders                      - Order history
//! GET  /api/orders/{id}                 - Order detail
//!
//! # Payment returns (no rate limit)
//! POST /api/payments/fondy/callback     - Gateway server callback
//! GET|POST /checkout/result             - Shopper lands here after paying
//! ```

pub mod addresses;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod orders;
pub mod payments;
pub mod pricing;
pub mod products;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
}

/// Create the JSON API router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(products::index))
        .route("/products/{id}", get(products::show))
        .route("/cart", get(cart::show).delete(cart::clear))
        .route("/cart/items", post(cart::add_item))
        .route("/cart/items/{id}", axum::routing::delete(cart::remove_item))
        .route("/cart/items/{id}/increase", post(cart::increase))
        .route("/cart/items/{id}/decrease", post(cart::decrease))
        .route("/wishlist", get(cart::wishlist).post(cart::add_to_wishlist))
        .route(
            "/wishlist/{id}",
            axum::routing::delete(cart::remove_from_wishlist),
        )
        .route("/wishlist/{id}/move-to-cart", post(cart::move_to_cart))
        .route("/sync-status", get(cart::sync_status))
        .route("/sync-status/retry", post(cart::retry_sync))
        .route(
            "/addresses",
            get(addresses::index).post(addresses::create),
        )
        .route(
            "/addresses/{id}",
            axum::routing::put(addresses::update).delete(addresses::delete),
        )
        .route("/addresses/{id}/default", post(addresses::set_default))
        .route("/pricing/rates", get(pricing::rates))
        .route("/pricing/display", get(pricing::display))
        .route("/shipping/quote", get(pricing::shipping_quote))
        .route("/checkout", post(checkout::submit))
        .route("/payments/paypal/capture", post(payments::paypal_capture))
        .route("/orders", get(orders::index))
        .route("/orders/{id}", get(orders::show))
}

/// Routes called by payment providers or their redirects.
pub fn payment_return_routes() -> Router<AppState> {
    Router::new()
        .route("/api/payments/fondy/callback", post(payments::fondy_callback))
        .route(
            "/checkout/result",
            get(checkout::result_get).post(checkout::result_post),
        )
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/auth", auth_routes().layer(auth_rate_limiter()))
        .nest("/api", api_routes().layer(api_rate_limiter()))
        .merge(payment_return_routes())
}

/// Liveness health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
