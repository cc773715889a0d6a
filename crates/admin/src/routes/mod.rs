//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                            - Liveness
//! GET    /health/ready                      - Readiness (database ping)
//!
//! # Bearer token required
//! GET    /api/dashboard?from=&to=           - Revenue, counts, recent orders
//! GET    /api/orders?status=&page=&per_page= - Order list
//! GET    /api/orders/{id}                   - Order detail with payment payload
//! PATCH  /api/orders/{id}/status            - Manual status edit
//! PATCH  /api/orders/{id}/tracking          - Tracking number and URL
//! GET    /api/shipping-rates                - Shipping settings table
//! PUT    /api/shipping-rates/{country_code} - Create or replace a row
//! DELETE /api/shipping-rates/{country_code} - Remove a row
//! ```

pub mod dashboard;
pub mod orders;
pub mod shipping_rates;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, patch},
};

use crate::state::AppState;

/// Back-office API routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard::show))
        .route("/orders", get(orders::index))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/status", patch(orders::update_status))
        .route("/orders/{id}/tracking", patch(orders::update_tracking))
        .route("/shipping-rates", get(shipping_rates::index))
        .route(
            "/shipping-rates/{country_code}",
            axum::routing::put(shipping_rates::upsert).delete(shipping_rates::delete),
        )
}

/// Create all routes for admin.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api", api_routes())
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
