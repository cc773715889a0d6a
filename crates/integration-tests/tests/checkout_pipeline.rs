//! Order submission: preconditions, persisted snapshot and payment hand-off.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use rust_decimal::Decimal;
use url::Url;

use kramnytsia_core::{
    Cart, Language, OrderStatus, PaymentMethod, ShippingTier, ShippingWarning,
};
use kramnytsia_integration_tests::{
    MemoryOrderStore, StubProvider, StubReply, address, product, shipping_rates, user,
};
use kramnytsia_storefront::payments::{PaymentError, PaymentRegistry};
use kramnytsia_storefront::services::{
    CheckoutError, CheckoutRequest, CheckoutService, OrderStore,
};

fn base_url() -> Url {
    Url::parse("https://shop.kramnytsia.test/").unwrap()
}

fn service(store: &Arc<MemoryOrderStore>, provider: Arc<StubProvider>) -> CheckoutService {
    CheckoutService::new(
        Arc::clone(store) as Arc<dyn OrderStore>,
        PaymentRegistry::new().with(provider),
        base_url(),
    )
}

/// Two of a $10 item and one $5 item.
fn cart() -> Cart {
    let mut cart = Cart::new();
    cart.add_to_cart(&product(1, 10, 5), 2).unwrap();
    cart.add_to_cart(&product(2, 5, 5), 1).unwrap();
    cart
}

#[tokio::test]
async fn test_preconditions_checked_in_order_without_writes() {
    let store = MemoryOrderStore::new();
    let provider = StubProvider::new(PaymentMethod::Fondy, StubReply::Fail);
    let checkout = service(&store, Arc::clone(&provider));
    let rates = shipping_rates();
    let empty = Cart::new();
    let full = cart();
    let unverified = user(1, false);
    let verified = user(2, true);
    let addr = address(verified.id, "UA");

    let request = |customer, address, cart| CheckoutRequest {
        customer,
        address,
        cart,
        payment_method: PaymentMethod::Fondy,
        shipping_tier: ShippingTier::Standard,
        language: Language::Uk,
    };

    let err = checkout.submit(request(None, None, &empty), &rates).await.unwrap_err();
    assert!(matches!(err, CheckoutError::NotAuthenticated));

    let err = checkout
        .submit(request(Some(&unverified), None, &empty), &rates)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::EmailNotVerified));
    assert_eq!(err.action_url(), Some("/account/profile"));

    let err = checkout
        .submit(request(Some(&verified), None, &full), &rates)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::NoAddress));

    let err = checkout
        .submit(request(Some(&verified), Some(&addr), &empty), &rates)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::EmptyCart));

    assert!(store.is_empty().await);
    assert!(provider.received().await.is_empty());
}

#[tokio::test]
async fn test_unshippable_destination_is_refused() {
    let store = MemoryOrderStore::new();
    let provider = StubProvider::new(PaymentMethod::Fondy, StubReply::Fail);
    let checkout = service(&store, provider);
    let customer = user(1, true);
    let addr = address(customer.id, "JP");
    let cart = cart();
    // No rest-of-world row, so Japan has no price.
    let rates: Vec<_> = shipping_rates()
        .into_iter()
        .filter(|r| r.country_code != "ROW")
        .collect();

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
            &rates,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::ShippingUnavailable { ref country_code } if country_code == "JP"));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_unconfigured_method_fails_before_any_write() {
    let store = MemoryOrderStore::new();
    let provider = StubProvider::new(PaymentMethod::Fondy, StubReply::Fail);
    let checkout = service(&store, provider);
    let customer = user(1, true);
    let addr = address(customer.id, "UA");
    let cart = cart();

    let err = checkout
        .submit(
            CheckoutRequest {
                customer: Some(&customer),
                address: Some(&addr),
                cart: &cart,
                payment_method: PaymentMethod::Paypal,
                shipping_tier: ShippingTier::Standard,
                language: Language::En,
            },
            &shipping_rates(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CheckoutError::Payment(PaymentError::Unavailable(PaymentMethod::Paypal))
    ));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_redirect_checkout_persists_order_and_snapshot() {
    let store = MemoryOrderStore::new();
    let provider = StubProvider::new(
        PaymentMethod::Fondy,
        StubReply::Redirect("https://pay.test/checkout/abc".to_owned()),
    );
    let checkout = service(&store, Arc::clone(&provider));
    let customer = user(1, true);
    let addr = address(customer.id, "UA");
    let cart = cart();

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

    assert_eq!(outcome.totals.subtotal, Decimal::from(25));
    assert_eq!(outcome.totals.shipping, Decimal::from(10));
    assert_eq!(outcome.totals.total, Decimal::from(35));
    assert_eq!(outcome.redirect_url.as_deref(), Some("https://pay.test/checkout/abc"));
    assert_eq!(outcome.provider_order_id, None);
    assert_eq!(outcome.warning, None);

    let stored = store.get(&outcome.order_id).await.unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
    assert_eq!(stored.order.total_amount, Decimal::from(35));
    assert_eq!(stored.order.shipping_address, addr);
    assert_eq!(stored.items.len(), 2);
    assert_eq!(stored.items[0].title, "Product 1");
    assert_eq!(stored.items[0].quantity, 2);
    assert_eq!(stored.items[0].image.as_deref(), Some("/images/1.jpg"));

    let sent = provider.received().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].order_id, outcome.order_id);
    assert_eq!(sent[0].amount, Decimal::from(35));
    assert_eq!(sent[0].language, Language::Uk);
    assert_eq!(
        sent[0].callback_url,
        "https://shop.kramnytsia.test/api/payments/fondy/callback"
    );
    assert!(sent[0].return_url.contains(&format!("orderId={}", outcome.order_id)));
    assert!(sent[0].cancel_url.ends_with("status=cancelled"));
}

#[tokio::test]
async fn test_express_unavailable_falls_back_to_standard() {
    let store = MemoryOrderStore::new();
    let provider = StubProvider::new(
        PaymentMethod::Fondy,
        StubReply::Redirect("https://pay.test/x".to_owned()),
    );
    let checkout = service(&store, provider);
    let customer = user(1, true);
    let addr = address(customer.id, "PL");
    let cart = cart();

    let outcome = checkout
        .submit(
            CheckoutRequest {
                customer: Some(&customer),
                address: Some(&addr),
                cart: &cart,
                payment_method: PaymentMethod::Fondy,
                shipping_tier: ShippingTier::Express,
                language: Language::En,
            },
            &shipping_rates(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.shipping_tier, ShippingTier::Standard);
    assert_eq!(outcome.warning, Some(ShippingWarning::ExpressUnavailable));
    assert_eq!(outcome.totals.total, Decimal::from(40));
    let stored = store.get(&outcome.order_id).await.unwrap();
    assert_eq!(stored.order.shipping_tier, ShippingTier::Standard);
}

#[tokio::test]
async fn test_hosted_order_stores_provider_id() {
    let store = MemoryOrderStore::new();
    let provider = StubProvider::new(
        PaymentMethod::Paypal,
        StubReply::HostedOrder("5O190127TN364715T".to_owned()),
    );
    let checkout = service(&store, provider);
    let customer = user(1, true);
    let addr = address(customer.id, "DE");
    let cart = cart();

    let outcome = checkout
        .submit(
            CheckoutRequest {
                customer: Some(&customer),
                address: Some(&addr),
                cart: &cart,
                payment_method: PaymentMethod::Paypal,
                shipping_tier: ShippingTier::Express,
                language: Language::En,
            },
            &shipping_rates(),
        )
        .await
        .unwrap();

    // Germany is unlisted, so the rest-of-world express price applies.
    assert_eq!(outcome.totals.shipping, Decimal::from(60));
    assert_eq!(outcome.provider_order_id.as_deref(), Some("5O190127TN364715T"));
    assert!(outcome.redirect_url.is_some());
    let stored = store.get(&outcome.order_id).await.unwrap();
    assert_eq!(stored.provider_order_id.as_deref(), Some("5O190127TN364715T"));
}

#[tokio::test]
async fn test_provider_failure_leaves_pending_order() {
    let store = MemoryOrderStore::new();
    let provider = StubProvider::new(PaymentMethod::Fondy, StubReply::Fail);
    let checkout = service(&store, provider);
    let customer = user(1, true);
    let addr = address(customer.id, "UA");
    let cart = cart();

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

    assert!(matches!(err, CheckoutError::Payment(PaymentError::Gateway { status: 503, .. })));
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_item_snapshot_failure_skips_payment() {
    let store = MemoryOrderStore::new();
    store.fail_item_inserts(true);
    let provider = StubProvider::new(
        PaymentMethod::Fondy,
        StubReply::Redirect("https://pay.test/x".to_owned()),
    );
    let checkout = service(&store, Arc::clone(&provider));
    let customer = user(1, true);
    let addr = address(customer.id, "UA");
    let cart = cart();

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

    assert!(matches!(err, CheckoutError::Repository(_)));
    assert_eq!(store.len().await, 1);
    assert!(provider.received().await.is_empty());
}
