//! Gateway round trips against local mock APIs: payment creation, signed
//! callbacks and hosted-order capture.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use url::Url;

use kramnytsia_core::{Cart, Language, OrderId, OrderStatus, PaymentMethod, ShippingTier};
use kramnytsia_integration_tests::{
    MemoryOrderStore, address, product, shipping_rates, spawn_server, user,
};
use kramnytsia_storefront::config::{FondyConfig, PaypalConfig};
use kramnytsia_storefront::payments::fondy::{signature, verify_signature};
use kramnytsia_storefront::payments::{
    FondyProvider, PaymentError, PaymentRegistry, PaypalProvider,
};
use kramnytsia_storefront::services::{
    CheckoutRequest, CheckoutService, OrderStore, ReconcileError, ReconciliationService,
};

const FONDY_SECRET: &str = "test";
const PAID_ORDER: &str = "1767225600000-paid01";

// ============================================================================
// Mock gateways
// ============================================================================

type Seen = Arc<Mutex<Vec<Value>>>;

async fn fondy_checkout(State(seen): State<Seen>, Json(body): Json<Value>) -> Json<Value> {
    seen.lock().await.push(body);
    Json(json!({
        "response": {
            "response_status": "success",
            "checkout_url": "https://pay.fondy.test/merchants/5ad6b888f4becb0c33d543d54e57d86c/default/index.html?token=abc"
        }
    }))
}

async fn fondy_rejecting(Json(_body): Json<Value>) -> Json<Value> {
    Json(json!({
        "response": {
            "response_status": "failure",
            "error_message": "Invalid merchant",
            "error_code": 1013
        }
    }))
}

async fn spawn_fondy(seen: Seen) -> Url {
    spawn_server(
        Router::new()
            .route("/api/checkout/url/", post(fondy_checkout))
            .with_state(seen),
    )
    .await
}

fn fondy(api_base: Url) -> Arc<FondyProvider> {
    Arc::new(
        FondyProvider::new(&FondyConfig {
            merchant_id: "1396424".to_owned(),
            secret_key: SecretString::from(FONDY_SECRET),
            api_base,
        })
        .unwrap(),
    )
}

async fn paypal_token(State(calls): State<Arc<AtomicUsize>>) -> Json<Value> {
    calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "access_token": "A21AAFEpH4PsADK7qSS7pSRsgzfENtu",
        "token_type": "Bearer",
        "expires_in": 32400
    }))
}

async fn paypal_capture(Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    match id.as_str() {
        "PP-DONE" => (
            StatusCode::CREATED,
            Json(json!({
                "id": "PP-DONE",
                "status": "COMPLETED",
                "purchase_units": [{ "reference_id": PAID_ORDER }]
            })),
        ),
        "PP-NOREF" | "PP-GONE" => (
            StatusCode::CREATED,
            Json(json!({ "id": &id, "status": "COMPLETED" })),
        ),
        "PP-WAIT" => (
            StatusCode::OK,
            Json(json!({ "id": &id, "status": "PENDING" })),
        ),
        _ => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "name": "UNPROCESSABLE_ENTITY",
                "message": "ORDER_NOT_APPROVED"
            })),
        ),
    }
}

async fn spawn_paypal(token_calls: Arc<AtomicUsize>) -> Url {
    spawn_server(
        Router::new()
            .route("/v1/oauth2/token", post(paypal_token))
            .route("/v2/checkout/orders/{id}/capture", post(paypal_capture))
            .with_state(token_calls),
    )
    .await
}

fn paypal(api_base: Url) -> Arc<PaypalProvider> {
    Arc::new(
        PaypalProvider::new(&PaypalConfig {
            client_id: "client".to_owned(),
            client_secret: SecretString::from("client-secret"),
            api_base,
            brand_name: "Kramnytsia".to_owned(),
        })
        .unwrap(),
    )
}

fn unused_base() -> Url {
    Url::parse("http://127.0.0.1:9/").unwrap()
}

fn signed(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    let mut params: BTreeMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    let sig = signature(FONDY_SECRET, &params);
    params.insert("signature".to_owned(), sig);
    params
}

fn reconciliation(store: &Arc<MemoryOrderStore>, registry: PaymentRegistry) -> ReconciliationService {
    ReconciliationService::new(Arc::clone(store) as Arc<dyn OrderStore>, registry)
}

// ============================================================================
// Redirect gateway
// ============================================================================

#[tokio::test]
async fn test_fondy_checkout_sends_signed_request() {
    let seen = Seen::default();
    let api_base = spawn_fondy(Arc::clone(&seen)).await;
    let store = MemoryOrderStore::new();
    let checkout = CheckoutService::new(
        Arc::clone(&store) as Arc<dyn OrderStore>,
        PaymentRegistry::new().with(fondy(api_base)),
        Url::parse("https://shop.kramnytsia.test/").unwrap(),
    );
    let customer = user(1, true);
    let addr = address(customer.id, "UA");
    let mut cart = Cart::new();
    cart.add_to_cart(&product(1, 10, 5), 2).unwrap();
    cart.add_to_cart(&product(2, 5, 5), 1).unwrap();

    let outcome = checkout
        .submit(
            CheckoutRequest {
                customer: Some(&customer),
                address: Some(&addr),
                cart: &cart,
                payment_method: PaymentMethod::Fondy,
                shipping_tier: ShippingTier::Standard,
                language: Language::Uk,
            },
            &shipping_rates(),
        )
        .await
        .unwrap();

    assert!(
        outcome
            .redirect_url
            .as_deref()
            .unwrap()
            .starts_with("https://pay.fondy.test/")
    );

    let requests = seen.lock().await;
    assert_eq!(requests.len(), 1);
    let params: BTreeMap<String, String> =
        serde_json::from_value(requests[0]["request"].clone()).unwrap();
    assert_eq!(params["amount"], "3500");
    assert_eq!(params["currency"], "USD");
    assert_eq!(params["lang"], "uk");
    assert_eq!(params["merchant_id"], "1396424");
    assert_eq!(params["order_id"], outcome.order_id.as_str());
    assert!(verify_signature(FONDY_SECRET, &params));
}

#[tokio::test]
async fn test_fondy_rejection_leaves_order_pending() {
    let api_base = spawn_server(Router::new().route("/api/checkout/url/", post(fondy_rejecting))).await;
    let store = MemoryOrderStore::new();
    let checkout = CheckoutService::new(
        Arc::clone(&store) as Arc<dyn OrderStore>,
        PaymentRegistry::new().with(fondy(api_base)),
        Url::parse("https://shop.kramnytsia.test/").unwrap(),
    );
    let customer = user(1, true);
    let addr = address(customer.id, "UA");
    let mut cart = Cart::new();
    cart.add_to_cart(&product(1, 10, 5), 1).unwrap();

    let err = checkout
        .submit(
            CheckoutRequest {
                customer: Some(&customer),
                address: Some(&addr),
                cart: &cart,
                payment_method: PaymentMethod::Fondy,
                shipping_tier: ShippingTier::Standard,
                language: Language::En,
            },
            &shipping_rates(),
        )
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Invalid merchant"));
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_signed_callback_marks_order() {
    let store = MemoryOrderStore::new();
    let order_id = OrderId::parse("1767225600000-abc123").unwrap();
    store.seed(&order_id, &user(1, true), None).await;
    let service = reconciliation(&store, PaymentRegistry::new().with(fondy(unused_base())));

    let outcome = service
        .handle_callback(
            PaymentMethod::Fondy,
            signed(&[
                ("order_id", order_id.as_str()),
                ("order_status", "approved"),
                ("payment_id", "802143977"),
                ("amount", "3500"),
                ("currency", "USD"),
                ("response_signature_string", "**********|3500|USD|..."),
            ]),
        )
        .await
        .unwrap();

    assert_eq!(outcome.order_id, order_id);
    assert_eq!(outcome.status, Some(OrderStatus::Success));
    let stored = store.get(&order_id).await.unwrap();
    assert_eq!(stored.status, OrderStatus::Success);
    assert_eq!(stored.payment_result.unwrap()["payment_id"], "802143977");
}

#[tokio::test]
async fn test_tampered_callback_is_rejected() {
    let store = MemoryOrderStore::new();
    let order_id = OrderId::parse("1767225600000-abc123").unwrap();
    store.seed(&order_id, &user(1, true), None).await;
    let service = reconciliation(&store, PaymentRegistry::new().with(fondy(unused_base())));

    let mut params = signed(&[("order_id", order_id.as_str()), ("order_status", "declined")]);
    params.insert("order_status".to_owned(), "approved".to_owned());

    let err = service
        .handle_callback(PaymentMethod::Fondy, params)
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcileError::Payment(PaymentError::InvalidSignature)));
    let stored = store.get(&order_id).await.unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
    assert!(stored.payment_result.is_none());
}

#[tokio::test]
async fn test_callback_with_any_signed_value_altered_is_rejected() {
    let store = MemoryOrderStore::new();
    let order_id = OrderId::parse("1767225600000-abc123").unwrap();
    store.seed(&order_id, &user(1, true), None).await;
    let service = reconciliation(&store, PaymentRegistry::new().with(fondy(unused_base())));

    let params = signed(&[
        ("order_id", order_id.as_str()),
        ("order_status", "approved"),
        ("merchant_id", "1396424"),
        ("amount", "3500"),
        ("currency", "USD"),
        ("payment_id", "802143977"),
    ]);

    for key in ["order_id", "order_status", "merchant_id", "amount", "currency", "payment_id"] {
        let mut tampered = params.clone();
        let value = tampered.get_mut(key).unwrap();
        // Flip the last character.
        let last = value.pop().unwrap();
        value.push(if last == '0' { '1' } else { '0' });

        let err = service
            .handle_callback(PaymentMethod::Fondy, tampered)
            .await
            .unwrap_err();
        assert!(
            matches!(err, ReconcileError::Payment(PaymentError::InvalidSignature)),
            "{key}"
        );
    }

    let stored = store.get(&order_id).await.unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
    assert!(stored.payment_result.is_none());
}

#[tokio::test]
async fn test_intermediate_callback_status_is_ignored() {
    let store = MemoryOrderStore::new();
    let order_id = OrderId::parse("1767225600000-abc123").unwrap();
    store.seed(&order_id, &user(1, true), None).await;
    let service = reconciliation(&store, PaymentRegistry::new().with(fondy(unused_base())));

    let outcome = service
        .handle_callback(
            PaymentMethod::Fondy,
            signed(&[("order_id", order_id.as_str()), ("order_status", "processing")]),
        )
        .await
        .unwrap();

    assert_eq!(outcome.status, None);
    assert_eq!(store.get(&order_id).await.unwrap().status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_callback_for_unknown_order() {
    let store = MemoryOrderStore::new();
    let service = reconciliation(&store, PaymentRegistry::new().with(fondy(unused_base())));

    let err = service
        .handle_callback(
            PaymentMethod::Fondy,
            signed(&[("order_id", "1-missing"), ("order_status", "approved")]),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcileError::UnknownOrder(ref id) if id.as_str() == "1-missing"));
}

#[tokio::test]
async fn test_later_callback_overwrites_earlier_one() {
    let store = MemoryOrderStore::new();
    let order_id = OrderId::parse("1767225600000-abc123").unwrap();
    store.seed(&order_id, &user(1, true), None).await;
    let service = reconciliation(&store, PaymentRegistry::new().with(fondy(unused_base())));

    for status in ["approved", "declined"] {
        service
            .handle_callback(
                PaymentMethod::Fondy,
                signed(&[("order_id", order_id.as_str()), ("order_status", status)]),
            )
            .await
            .unwrap();
    }

    assert_eq!(store.get(&order_id).await.unwrap().status, OrderStatus::Failure);
}

// ============================================================================
// Hosted order capture
// ============================================================================

#[tokio::test]
async fn test_completed_capture_marks_order_paid() {
    let token_calls = Arc::new(AtomicUsize::new(0));
    let api_base = spawn_paypal(Arc::clone(&token_calls)).await;
    let store = MemoryOrderStore::new();
    let order_id = OrderId::parse(PAID_ORDER).unwrap();
    store.seed(&order_id, &user(1, true), Some("PP-DONE")).await;
    let service = reconciliation(&store, PaymentRegistry::new().with(paypal(api_base)));

    let outcome = service.capture(PaymentMethod::Paypal, "PP-DONE").await.unwrap();

    assert_eq!(outcome.status, OrderStatus::Paid);
    assert_eq!(outcome.order_id, Some(order_id.clone()));
    assert!(outcome.recorded);
    let stored = store.get(&order_id).await.unwrap();
    assert_eq!(stored.status, OrderStatus::Paid);
    assert_eq!(stored.payment_result.unwrap()["status"], "COMPLETED");
}

#[tokio::test]
async fn test_capture_finds_order_by_stored_provider_id() {
    let token_calls = Arc::new(AtomicUsize::new(0));
    let api_base = spawn_paypal(Arc::clone(&token_calls)).await;
    let store = MemoryOrderStore::new();
    let order_id = OrderId::parse("1767225600000-noref1").unwrap();
    store.seed(&order_id, &user(1, true), Some("PP-NOREF")).await;
    let service = reconciliation(&store, PaymentRegistry::new().with(paypal(api_base)));

    let outcome = service.capture(PaymentMethod::Paypal, "PP-NOREF").await.unwrap();

    assert_eq!(outcome.order_id, Some(order_id.clone()));
    assert!(outcome.recorded);
    assert_eq!(store.get(&order_id).await.unwrap().status, OrderStatus::Paid);
}

#[tokio::test]
async fn test_capture_without_matching_order_is_reported_unrecorded() {
    let token_calls = Arc::new(AtomicUsize::new(0));
    let api_base = spawn_paypal(Arc::clone(&token_calls)).await;
    let store = MemoryOrderStore::new();
    let service = reconciliation(&store, PaymentRegistry::new().with(paypal(api_base)));

    let outcome = service.capture(PaymentMethod::Paypal, "PP-GONE").await.unwrap();

    assert_eq!(outcome.status, OrderStatus::Paid);
    assert_eq!(outcome.order_id, None);
    assert!(!outcome.recorded);
}

#[tokio::test]
async fn test_pending_capture_leaves_order_untouched() {
    let token_calls = Arc::new(AtomicUsize::new(0));
    let api_base = spawn_paypal(Arc::clone(&token_calls)).await;
    let store = MemoryOrderStore::new();
    let order_id = OrderId::parse("1767225600000-wait01").unwrap();
    store.seed(&order_id, &user(1, true), Some("PP-WAIT")).await;
    let service = reconciliation(&store, PaymentRegistry::new().with(paypal(api_base)));

    let err = service.capture(PaymentMethod::Paypal, "PP-WAIT").await.unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::Payment(PaymentError::NotCompleted { ref status }) if status == "PENDING"
    ));
    assert_eq!(store.get(&order_id).await.unwrap().status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_gateway_error_carries_provider_message() {
    let token_calls = Arc::new(AtomicUsize::new(0));
    let api_base = spawn_paypal(Arc::clone(&token_calls)).await;
    let store = MemoryOrderStore::new();
    let service = reconciliation(&store, PaymentRegistry::new().with(paypal(api_base)));

    let err = service.capture(PaymentMethod::Paypal, "PP-UNAPPROVED").await.unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::Payment(PaymentError::Gateway { status: 422, ref message })
            if message == "ORDER_NOT_APPROVED"
    ));
}

#[tokio::test]
async fn test_capture_rejects_ids_that_escape_the_order_path() {
    let token_calls = Arc::new(AtomicUsize::new(0));
    let api_base = spawn_paypal(Arc::clone(&token_calls)).await;
    let store = MemoryOrderStore::new();
    let service = reconciliation(&store, PaymentRegistry::new().with(paypal(api_base)));

    for id in ["../../../v1/x?", "PP-DONE?x=1", "PP-DONE/../../PP-DONE", "PP DONE"] {
        let err = service.capture(PaymentMethod::Paypal, id).await.unwrap_err();
        assert!(
            matches!(err, ReconcileError::Payment(PaymentError::InvalidOrderId)),
            "{id}"
        );
    }
    // Rejected before any authenticated request was made.
    assert_eq!(token_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_access_token_is_reused() {
    let token_calls = Arc::new(AtomicUsize::new(0));
    let api_base = spawn_paypal(Arc::clone(&token_calls)).await;
    let store = MemoryOrderStore::new();
    let service = reconciliation(&store, PaymentRegistry::new().with(paypal(api_base)));

    service.capture(PaymentMethod::Paypal, "PP-GONE").await.unwrap();
    service.capture(PaymentMethod::Paypal, "PP-NOREF").await.unwrap();

    assert_eq!(token_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_capture_is_unsupported_for_redirect_gateway() {
    let store = MemoryOrderStore::new();
    let service = reconciliation(&store, PaymentRegistry::new().with(fondy(unused_base())));

    let err = service.capture(PaymentMethod::Fondy, "anything").await.unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::Payment(PaymentError::Unsupported { method: PaymentMethod::Fondy, .. })
    ));
}
