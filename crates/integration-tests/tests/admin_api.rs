//! Back-office API request handling up to the database boundary.
//!
//! The pool is created lazily and never connected, so these tests cover
//! authentication and input validation without a running `PostgreSQL`.

#![allow(clippy::unwrap_used)]

use std::net::{IpAddr, Ipv4Addr};

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use secrecy::SecretString;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

use kramnytsia_admin::{config::AdminConfig, routes, state::AppState};

const TOKEN: &str = "qZ7vT2mK9pL4xR8wN3bY6cF1hJ5dG0sA";

fn app() -> Router {
    let config = AdminConfig {
        database_url: SecretString::from("postgres://localhost/kramnytsia_test"),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        api_token: SecretString::from(TOKEN),
        sentry_dsn: None,
        sentry_environment: None,
    };
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://localhost/kramnytsia_test")
        .unwrap();
    routes::routes().with_state(AppState::new(config, pool))
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_owned()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_needs_no_token() {
    let response = app()
        .oneshot(request("GET", "/health", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_api_rejects_missing_token() {
    let response = app()
        .oneshot(request("GET", "/api/orders", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    let body = json_body(response).await;
    assert_eq!(body["code"], "unauthorized");
}

#[tokio::test]
async fn test_api_rejects_wrong_token() {
    let response = app()
        .oneshot(request(
            "GET",
            "/api/shipping-rates",
            Some("qZ7vT2mK9pL4xR8wN3bY6cF1hJ5dG0sB"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_dashboard_rejects_reversed_window() {
    let response = app()
        .oneshot(request(
            "GET",
            "/api/dashboard?from=2026-03-10&to=2026-03-01",
            Some(TOKEN),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "invalid_date_range");
}

#[tokio::test]
async fn test_shipping_rate_upsert_validates_before_saving() {
    let response = app()
        .oneshot(request(
            "PUT",
            "/api/shipping-rates/UKR",
            Some(TOKEN),
            Some(r#"{"country_name":"Ukraine","standard_price":"10.00"}"#),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = app()
        .oneshot(request(
            "PUT",
            "/api/shipping-rates/UA",
            Some(TOKEN),
            Some(r#"{"country_name":"Ukraine","express_price":"-5"}"#),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert_eq!(body["code"], "invalid_shipping_rate");
}

#[tokio::test]
async fn test_tracking_update_requires_http_url() {
    let response = app()
        .oneshot(request(
            "PATCH",
            "/api/orders/1767225600000-abc123/tracking",
            Some(TOKEN),
            Some(r#"{"tracking_number":"RB123456789UA","tracking_url":"ftp://track.test/RB123"}"#),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
