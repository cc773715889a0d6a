//! Shared fixtures for Kramnytsia integration tests.
//!
//! The tests drive the real services through their persistence and payment
//! seams. In-memory doubles stand in for `PostgreSQL`, and gateway APIs are
//! served by local axum routers bound to an ephemeral port.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p kramnytsia-integration-tests
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use url::Url;

use kramnytsia_core::{
    Address, AddressId, Cart, CartChange, Email, OrderId, OrderStatus, PaymentMethod, ProductId,
    ProductSnapshot, ShippingRate, UserId,
};
use kramnytsia_storefront::db::RepositoryError;
use kramnytsia_storefront::models::{NewOrder, NewOrderItem, User};
use kramnytsia_storefront::payments::{
    ConfirmedPayment, PaymentConfirmation, PaymentError, PaymentInitiation, PaymentOrder,
    PaymentProvider,
};
use kramnytsia_storefront::services::{CartRemote, OrderStore, RetryPolicy};

/// Retry quickly so failure paths finish in milliseconds.
#[must_use]
pub const fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 2,
        initial_backoff: Duration::from_millis(1),
    }
}

fn unavailable() -> RepositoryError {
    RepositoryError::Database(sqlx::Error::PoolTimedOut)
}

// ============================================================================
// Orders
// ============================================================================

/// An order as the in-memory store holds it.
#[derive(Debug, Clone)]
pub struct StoredOrder {
    pub order: NewOrder,
    pub items: Vec<NewOrderItem>,
    pub status: OrderStatus,
    pub provider_order_id: Option<String>,
    pub payment_result: Option<serde_json::Value>,
}

/// [`OrderStore`] backed by a map, with switchable item-insert failures.
#[derive(Default)]
pub struct MemoryOrderStore {
    orders: Mutex<HashMap<OrderId, StoredOrder>>,
    fail_items: AtomicBool,
}

impl MemoryOrderStore {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_item_inserts(&self, fail: bool) {
        self.fail_items.store(fail, Ordering::SeqCst);
    }

    pub async fn get(&self, id: &OrderId) -> Option<StoredOrder> {
        self.orders.lock().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.orders.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Seed a pending order without going through checkout.
    pub async fn seed(&self, id: &OrderId, user: &User, provider_order_id: Option<&str>) {
        let order = NewOrder {
            id: id.clone(),
            user_id: user.id,
            payment_method: PaymentMethod::Fondy,
            subtotal: Decimal::from(25),
            shipping_cost: Decimal::from(10),
            total_amount: Decimal::from(35),
            shipping_tier: kramnytsia_core::ShippingTier::Standard,
            shipping_address: address(user.id, "UA"),
        };
        self.orders.lock().await.insert(
            id.clone(),
            StoredOrder {
                order,
                items: Vec::new(),
                status: OrderStatus::Pending,
                provider_order_id: provider_order_id.map(str::to_owned),
                payment_result: None,
            },
        );
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert_order(&self, order: &NewOrder) -> Result<(), RepositoryError> {
        let mut orders = self.orders.lock().await;
        if orders.contains_key(&order.id) {
            return Err(RepositoryError::Conflict(format!("order {}", order.id)));
        }
        orders.insert(
            order.id.clone(),
            StoredOrder {
                order: order.clone(),
                items: Vec::new(),
                status: OrderStatus::Pending,
                provider_order_id: None,
                payment_result: None,
            },
        );
        Ok(())
    }

    async fn insert_items(
        &self,
        order_id: &OrderId,
        items: &[NewOrderItem],
    ) -> Result<(), RepositoryError> {
        if self.fail_items.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let mut orders = self.orders.lock().await;
        let stored = orders.get_mut(order_id).ok_or(RepositoryError::NotFound)?;
        stored.items.extend_from_slice(items);
        Ok(())
    }

    async fn set_provider_order_id(
        &self,
        order_id: &OrderId,
        provider_order_id: &str,
    ) -> Result<(), RepositoryError> {
        let mut orders = self.orders.lock().await;
        let stored = orders.get_mut(order_id).ok_or(RepositoryError::NotFound)?;
        stored.provider_order_id = Some(provider_order_id.to_owned());
        Ok(())
    }

    async fn status(&self, order_id: &OrderId) -> Result<Option<OrderStatus>, RepositoryError> {
        Ok(self.orders.lock().await.get(order_id).map(|o| o.status))
    }

    async fn find_by_provider_order_id(
        &self,
        provider_order_id: &str,
    ) -> Result<Option<OrderId>, RepositoryError> {
        Ok(self
            .orders
            .lock()
            .await
            .iter()
            .find(|(_, o)| o.provider_order_id.as_deref() == Some(provider_order_id))
            .map(|(id, _)| id.clone()))
    }

    async fn record_payment(
        &self,
        order_id: &OrderId,
        status: OrderStatus,
        payment_result: &serde_json::Value,
    ) -> Result<bool, RepositoryError> {
        let mut orders = self.orders.lock().await;
        let Some(stored) = orders.get_mut(order_id) else {
            return Ok(false);
        };
        stored.status = status;
        stored.payment_result = Some(payment_result.clone());
        Ok(true)
    }
}

// ============================================================================
// Remote carts
// ============================================================================

/// [`CartRemote`] backed by a map, with switchable outages.
#[derive(Default)]
pub struct MemoryCartRemote {
    carts: Mutex<HashMap<UserId, Cart>>,
    failing: AtomicBool,
    applied: AtomicUsize,
    replaced: AtomicUsize,
}

impl MemoryCartRemote {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every call fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn put(&self, user_id: UserId, cart: Cart) {
        self.carts.lock().await.insert(user_id, cart);
    }

    pub async fn cart(&self, user_id: UserId) -> Cart {
        self.carts
            .lock()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Successful incremental writes.
    pub fn applied(&self) -> usize {
        self.applied.load(Ordering::SeqCst)
    }

    /// Successful snapshot writes.
    pub fn replaced(&self) -> usize {
        self.replaced.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            Ok(())
        }
    }
}

fn apply_change(cart: &Cart, change: &CartChange) -> Cart {
    let mut items = cart.items().to_vec();
    let mut wishlist = cart.wishlist().to_vec();
    match change {
        CartChange::Upsert { item } => {
            match items.iter_mut().find(|i| i.product_id == item.product_id) {
                Some(existing) => *existing = item.clone(),
                None => items.push(item.clone()),
            }
        }
        CartChange::Remove { product_id } => items.retain(|i| i.product_id != *product_id),
        CartChange::Clear => items.clear(),
        CartChange::WishlistAdd { product_id } => wishlist.push(*product_id),
        CartChange::WishlistRemove { product_id } => wishlist.retain(|id| id != product_id),
    }
    Cart::from_parts(items, wishlist)
}

#[async_trait]
impl CartRemote for MemoryCartRemote {
    async fn load(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        self.check()?;
        Ok(self.cart(user_id).await)
    }

    async fn apply(&self, user_id: UserId, change: &CartChange) -> Result<(), RepositoryError> {
        self.check()?;
        let mut carts = self.carts.lock().await;
        let current = carts.get(&user_id).cloned().unwrap_or_default();
        carts.insert(user_id, apply_change(&current, change));
        self.applied.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn replace(&self, user_id: UserId, cart: &Cart) -> Result<(), RepositoryError> {
        self.check()?;
        self.carts.lock().await.insert(user_id, cart.clone());
        self.replaced.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Payment providers
// ============================================================================

/// What a [`StubProvider`] answers at payment creation.
#[derive(Debug, Clone)]
pub enum StubReply {
    Redirect(String),
    HostedOrder(String),
    Fail,
}

/// Provider double that records the payment orders it receives.
pub struct StubProvider {
    method: PaymentMethod,
    reply: StubReply,
    received: Mutex<Vec<PaymentOrder>>,
}

impl StubProvider {
    #[must_use]
    pub fn new(method: PaymentMethod, reply: StubReply) -> Arc<Self> {
        Arc::new(Self {
            method,
            reply,
            received: Mutex::new(Vec::new()),
        })
    }

    pub async fn received(&self) -> Vec<PaymentOrder> {
        self.received.lock().await.clone()
    }
}

#[async_trait]
impl PaymentProvider for StubProvider {
    fn method(&self) -> PaymentMethod {
        self.method
    }

    async fn create_payment(&self, order: &PaymentOrder) -> Result<PaymentInitiation, PaymentError> {
        self.received.lock().await.push(order.clone());
        match &self.reply {
            StubReply::Redirect(url) => Ok(PaymentInitiation::Redirect { url: url.clone() }),
            StubReply::HostedOrder(id) => Ok(PaymentInitiation::HostedOrder {
                provider_order_id: id.clone(),
                approval_url: Some(format!("https://pay.test/approve/{id}")),
            }),
            StubReply::Fail => Err(PaymentError::Gateway {
                status: 503,
                message: "gateway down".to_owned(),
            }),
        }
    }

    async fn confirm_payment(
        &self,
        _confirmation: PaymentConfirmation,
    ) -> Result<ConfirmedPayment, PaymentError> {
        Err(PaymentError::Unsupported {
            method: self.method,
            operation: "confirmation",
        })
    }
}

// ============================================================================
// Fixtures
// ============================================================================

#[must_use]
pub fn user(id: i32, email_verified: bool) -> User {
    User {
        id: UserId::new(id),
        email: Email::parse(&format!("shopper{id}@kramnytsia.test")).unwrap_or_else(|e| {
            panic!("fixture email rejected: {e}");
        }),
        email_verified,
        created_at: Utc::now(),
    }
}

#[must_use]
pub fn address(user_id: UserId, country_code: &str) -> Address {
    Address {
        id: AddressId::new(1),
        user_id,
        full_name: "Olena Kovalenko".to_owned(),
        country_code: country_code.to_owned(),
        country_name: country_code.to_owned(),
        state: None,
        city: "Kyiv".to_owned(),
        line1: "Khreshchatyk 1".to_owned(),
        line2: None,
        postal_code: "01001".to_owned(),
        phone: "+380441234567".to_owned(),
        is_default: true,
    }
}

#[must_use]
pub fn product(id: i32, price: i64, stock: u32) -> ProductSnapshot {
    ProductSnapshot {
        product_id: ProductId::new(id),
        title: format!("Product {id}"),
        unit_price: Decimal::from(price),
        images: vec![format!("/images/{id}.jpg")],
        stock,
    }
}

fn rate(code: &str, standard: Option<i64>, express: Option<i64>) -> ShippingRate {
    ShippingRate {
        country_code: code.to_owned(),
        country_name: code.to_owned(),
        standard_price: standard.map(Decimal::from),
        express_price: express.map(Decimal::from),
    }
}

/// Ukraine with both tiers, Poland standard only, and a rest-of-world row.
#[must_use]
pub fn shipping_rates() -> Vec<ShippingRate> {
    vec![
        rate("UA", Some(10), Some(25)),
        rate("PL", Some(15), None),
        rate("ROW", Some(30), Some(60)),
    ]
}

/// Serve a router on an ephemeral local port and return its base URL.
///
/// # Panics
///
/// Panics if the listener cannot be bound.
pub async fn spawn_server(router: axum::Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap_or_else(|e| panic!("failed to bind test listener: {e}"));
    let addr = listener
        .local_addr()
        .unwrap_or_else(|e| panic!("listener has no address: {e}"));
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            panic!("test server stopped: {e}");
        }
    });
    Url::parse(&format!("http://{addr}/"))
        .unwrap_or_else(|e| panic!("invalid test server URL: {e}"))
}
