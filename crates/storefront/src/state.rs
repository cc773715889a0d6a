//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use kramnytsia_core::ExchangeRates;

use crate::config::StorefrontConfig;
use crate::db::{CartRepository, OrderRepository};
use crate::payments::{FondyProvider, PaymentError, PaymentRegistry, PaypalProvider};
use crate::services::cart::{CartStore, RetryPolicy};
use crate::services::checkout::CheckoutService;
use crate::services::orders::OrderStore;
use crate::services::reconciliation::ReconciliationService;
use crate::services::shipping::ShippingCatalog;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    rates: ExchangeRates,
    shipping: ShippingCatalog,
    carts: CartStore,
    orders: OrderRepository,
    checkout: CheckoutService,
    reconciliation: ReconciliationService,
}

impl AppState {
    /// Build the application state and start the cart sync worker.
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured payment client cannot be built.
    pub fn new(
        config: StorefrontConfig,
        pool: PgPool,
        rates: ExchangeRates,
    ) -> Result<Self, PaymentError> {
        let mut payments = PaymentRegistry::new();
        if let Some(fondy) = &config.fondy {
            payments = payments.with(Arc::new(FondyProvider::new(fondy)?));
        }
        if let Some(paypal) = &config.paypal {
            payments = payments.with(Arc::new(PaypalProvider::new(paypal)?));
        }
        if payments.methods().is_empty() {
            tracing::warn!("No payment provider configured; checkout will be rejected");
        }

        let orders = OrderRepository::new(pool.clone());
        let order_store: Arc<dyn OrderStore> = Arc::new(orders.clone());
        let carts = CartStore::new(
            Arc::new(CartRepository::new(pool.clone())),
            RetryPolicy::default(),
        );

        let checkout = CheckoutService::new(
            Arc::clone(&order_store),
            payments.clone(),
            config.base_url.clone(),
        );
        let reconciliation = ReconciliationService::new(order_store, payments);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                shipping: ShippingCatalog::new(pool.clone()),
                config,
                pool,
                rates,
                carts,
                orders,
                checkout,
                reconciliation,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Rates fetched at startup.
    #[must_use]
    pub fn rates(&self) -> &ExchangeRates {
        &self.inner.rates
    }

    #[must_use]
    pub fn shipping(&self) -> &ShippingCatalog {
        &self.inner.shipping
    }

    #[must_use]
    pub fn carts(&self) -> &CartStore {
        &self.inner.carts
    }

    #[must_use]
    pub fn orders(&self) -> &OrderRepository {
        &self.inner.orders
    }

    #[must_use]
    pub fn checkout(&self) -> &CheckoutService {
        &self.inner.checkout
    }

    #[must_use]
    pub fn reconciliation(&self) -> &ReconciliationService {
        &self.inner.reconciliation
    }
}
