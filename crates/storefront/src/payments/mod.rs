//! Payment providers behind a common strategy interface.
//!
//! Two integration styles are supported:
//!
//! - **Redirect gateway** ([`fondy`]): the storefront signs a request, the
//!   gateway returns a hosted checkout URL, and the final status arrives later
//!   on a signed server-to-server callback.
//! - **Hosted order object** ([`paypal`]): the storefront creates a remote
//!   order, the shopper approves it, and the client asks the storefront to
//!   capture it synchronously.
//!
//! Checkout and reconciliation only see [`PaymentProvider`], selected through
//! [`PaymentRegistry`] by [`PaymentMethod`].

pub mod fondy;
pub mod paypal;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use kramnytsia_core::{Currency, Email, Language, OrderId, OrderStatus, PaymentMethod};

pub use fondy::FondyProvider;
pub use paypal::PaypalProvider;

/// Errors from a payment provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider rejected the request; carries the provider's own text.
    #[error("gateway error ({status}): {message}")]
    Gateway { status: u16, message: String },

    /// Callback signature did not match.
    #[error("invalid signature")]
    InvalidSignature,

    /// Capture returned a status other than `COMPLETED`.
    #[error("payment not completed (status {status})")]
    NotCompleted { status: String },

    #[error("missing field in provider payload: {0}")]
    MissingField(&'static str),

    #[error("malformed provider response: {0}")]
    Malformed(String),

    #[error("{method} does not support {operation}")]
    Unsupported {
        method: PaymentMethod,
        operation: &'static str,
    },

    #[error("payment method {0} is not configured")]
    Unavailable(PaymentMethod),

    #[error("amount {0} cannot be charged")]
    InvalidAmount(Decimal),

    /// Provider order id with characters the provider never issues.
    #[error("invalid provider order id")]
    InvalidOrderId,
}

/// What a provider needs to start a payment.
#[derive(Debug, Clone)]
pub struct PaymentOrder {
    pub order_id: OrderId,
    pub amount: Decimal,
    pub currency: Currency,
    pub description: String,
    pub customer_email: Email,
    pub language: Language,
    /// Where the shopper lands after paying.
    pub return_url: String,
    /// Where the shopper lands after abandoning the payment page.
    pub cancel_url: String,
    /// Server-to-server notification endpoint.
    pub callback_url: String,
}

/// How the browser continues after checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "flow", rename_all = "snake_case")]
pub enum PaymentInitiation {
    /// Full-page redirect to a hosted checkout page.
    Redirect { url: String },
    /// Remote order object to approve, then capture.
    HostedOrder {
        provider_order_id: String,
        approval_url: Option<String>,
    },
}

/// Inbound confirmation to verify.
#[derive(Debug, Clone)]
pub enum PaymentConfirmation {
    /// Signed key/value payload pushed by the gateway.
    Callback(BTreeMap<String, String>),
    /// Client request to capture an approved remote order.
    Capture { provider_order_id: String },
}

/// Verified outcome of a confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmedPayment {
    /// Internal order id reported by the provider, if any.
    pub order_id: Option<OrderId>,
    /// Provider-side order id, if any.
    pub provider_order_id: Option<String>,
    /// Terminal status to record; `None` means accepted but ignored.
    pub status: Option<OrderStatus>,
    /// Provider payload, stored verbatim for audit.
    pub raw: serde_json::Value,
}

/// A payment backend.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn method(&self) -> PaymentMethod;

    /// Start a payment for a persisted pending order.
    async fn create_payment(&self, order: &PaymentOrder) -> Result<PaymentInitiation, PaymentError>;

    /// Verify an inbound confirmation and map it to an order status.
    async fn confirm_payment(
        &self,
        confirmation: PaymentConfirmation,
    ) -> Result<ConfirmedPayment, PaymentError>;
}

/// Strategy lookup by payment method.
#[derive(Clone, Default)]
pub struct PaymentRegistry {
    providers: HashMap<PaymentMethod, Arc<dyn PaymentProvider>>,
}

impl PaymentRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, replacing any previous one for the same method.
    #[must_use]
    pub fn with(mut self, provider: Arc<dyn PaymentProvider>) -> Self {
        self.providers.insert(provider.method(), provider);
        self
    }

    /// # Errors
    ///
    /// Returns `PaymentError::Unavailable` if no provider is registered.
    pub fn get(&self, method: PaymentMethod) -> Result<Arc<dyn PaymentProvider>, PaymentError> {
        self.providers
            .get(&method)
            .cloned()
            .ok_or(PaymentError::Unavailable(method))
    }

    /// Methods that can be offered at checkout.
    #[must_use]
    pub fn methods(&self) -> Vec<PaymentMethod> {
        let mut methods: Vec<_> = self.providers.keys().copied().collect();
        methods.sort_by_key(|m| m.as_str());
        methods
    }
}

/// Compare two byte strings without short-circuiting on the first mismatch.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Read an error body into a readable message, preferring known JSON fields.
pub(crate) async fn gateway_error(response: reqwest::Response) -> PaymentError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            ["message", "error_description", "error_message", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(serde_json::Value::as_str).map(str::to_owned))
        })
        .unwrap_or(body);
    PaymentError::Gateway { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop(PaymentMethod);

    #[async_trait]
    impl PaymentProvider for Noop {
        fn method(&self) -> PaymentMethod {
            self.0
        }

        async fn create_payment(
            &self,
            _order: &PaymentOrder,
        ) -> Result<PaymentInitiation, PaymentError> {
            Ok(PaymentInitiation::Redirect { url: String::new() })
        }

        async fn confirm_payment(
            &self,
            _confirmation: PaymentConfirmation,
        ) -> Result<ConfirmedPayment, PaymentError> {
            Err(PaymentError::MissingField("noop"))
        }
    }

    #[test]
    fn test_registry_lookup() {
        let registry = PaymentRegistry::new().with(Arc::new(Noop(PaymentMethod::Paypal)));
        assert!(registry.get(PaymentMethod::Paypal).is_ok());
        assert!(matches!(
            registry.get(PaymentMethod::Fondy),
            Err(PaymentError::Unavailable(PaymentMethod::Fondy))
        ));
        assert_eq!(registry.methods(), vec![PaymentMethod::Paypal]);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"", b""));
    }
}
