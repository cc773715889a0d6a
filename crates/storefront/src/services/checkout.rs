//! Order submission pipeline.
//!
//! Preconditions are checked before any write. The order row, its item
//! snapshot and the payment call then run strictly in that order, without a
//! wrapping transaction: a provider failure leaves a `pending` order behind,
//! which is logged for manual reconciliation.

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;
use url::Url;

use kramnytsia_core::{
    Address, Cart, Currency, Language, OrderId, OrderTotals, PaymentMethod, ShippingRate,
    ShippingTier, ShippingWarning, select_tier,
};

use super::orders::OrderStore;
use crate::db::RepositoryError;
use crate::models::{NewOrder, NewOrderItem, User};
use crate::payments::{PaymentError, PaymentInitiation, PaymentOrder, PaymentRegistry};

/// Where unverified customers are sent to finish verification.
pub const VERIFY_EMAIL_ACTION_URL: &str = "/account/profile";

const ORDER_SUFFIX_LEN: usize = 6;

/// Checkout failures, precondition variants first in the order they are checked.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("sign in to place an order")]
    NotAuthenticated,

    #[error("verify your email address before placing an order")]
    EmailNotVerified,

    #[error("select a shipping address")]
    NoAddress,

    #[error("your cart is empty")]
    EmptyCart,

    #[error("we do not ship to {country_code} yet")]
    ShippingUnavailable { country_code: String },

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Payment(#[from] PaymentError),
}

impl CheckoutError {
    /// Link that resolves the error, if the shopper can fix it themselves.
    #[must_use]
    pub const fn action_url(&self) -> Option<&'static str> {
        match self {
            Self::EmailNotVerified => Some(VERIFY_EMAIL_ACTION_URL),
            _ => None,
        }
    }
}

/// Everything a submission is judged on.
#[derive(Debug, Clone, Copy)]
pub struct CheckoutRequest<'a> {
    pub customer: Option<&'a User>,
    pub address: Option<&'a Address>,
    pub cart: &'a Cart,
    pub payment_method: PaymentMethod,
    pub shipping_tier: ShippingTier,
    pub language: Language,
}

/// What the browser needs to continue to payment.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutOutcome {
    pub order_id: OrderId,
    pub payment_method: PaymentMethod,
    pub totals: OrderTotals,
    pub shipping_tier: ShippingTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<ShippingWarning>,
}

/// Runs checkout submissions against an order store and payment providers.
pub struct CheckoutService {
    orders: Arc<dyn OrderStore>,
    payments: PaymentRegistry,
    base_url: Url,
}

impl CheckoutService {
    #[must_use]
    pub fn new(orders: Arc<dyn OrderStore>, payments: PaymentRegistry, base_url: Url) -> Self {
        Self {
            orders,
            payments,
            base_url,
        }
    }

    #[must_use]
    pub const fn payments(&self) -> &PaymentRegistry {
        &self.payments
    }

    /// Validate, persist a pending order, and start the payment.
    ///
    /// # Errors
    ///
    /// Returns the first failing precondition, `ShippingUnavailable` when no
    /// tier ships to the address, or the persistence/provider error.
    #[instrument(skip_all, fields(payment_method = %request.payment_method))]
    pub async fn submit(
        &self,
        request: CheckoutRequest<'_>,
        rates: &[ShippingRate],
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let customer = request.customer.ok_or(CheckoutError::NotAuthenticated)?;
        if !customer.email_verified {
            return Err(CheckoutError::EmailNotVerified);
        }
        let address = request.address.ok_or(CheckoutError::NoAddress)?;
        if request.cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let selection = select_tier(rates, &address.country_code, request.shipping_tier);
        let shipping_cost = selection
            .quote
            .amount()
            .ok_or_else(|| CheckoutError::ShippingUnavailable {
                country_code: address.country_code.clone(),
            })?;

        // Fail before writing anything if the method is not configured.
        let provider = self.payments.get(request.payment_method)?;

        let totals = OrderTotals::compute(request.cart.lines(), shipping_cost);
        let order_id = generate_order_id();

        let order = NewOrder {
            id: order_id.clone(),
            user_id: customer.id,
            payment_method: request.payment_method,
            subtotal: totals.subtotal,
            shipping_cost: totals.shipping,
            total_amount: totals.total,
            shipping_tier: selection.tier,
            shipping_address: address.clone(),
        };
        self.orders.insert_order(&order).await?;

        let items: Vec<NewOrderItem> = request
            .cart
            .items()
            .iter()
            .map(|item| NewOrderItem {
                product_id: item.product_id,
                title: item.title.clone(),
                unit_price: item.unit_price,
                image: item.images.first().cloned(),
                quantity: item.quantity,
            })
            .collect();
        if let Err(e) = self.orders.insert_items(&order_id, &items).await {
            tracing::error!(order_id = %order_id, error = %e, "Order items not saved; order left pending");
            return Err(e.into());
        }

        let payment_order = self.payment_order(&order_id, totals, customer, request);
        let initiation = match provider.create_payment(&payment_order).await {
            Ok(initiation) => initiation,
            Err(e) => {
                tracing::error!(
                    order_id = %order_id,
                    payment_method = %request.payment_method,
                    error = %e,
                    "Payment creation failed; order left pending"
                );
                return Err(e.into());
            }
        };

        let (redirect_url, provider_order_id) = match initiation {
            PaymentInitiation::Redirect { url } => (Some(url), None),
            PaymentInitiation::HostedOrder {
                provider_order_id,
                approval_url,
            } => {
                if let Err(e) = self
                    .orders
                    .set_provider_order_id(&order_id, &provider_order_id)
                    .await
                {
                    // Capture can still find the order through reference_id.
                    tracing::warn!(order_id = %order_id, error = %e, "Failed to store provider order id");
                }
                (approval_url, Some(provider_order_id))
            }
        };

        tracing::info!(order_id = %order_id, total = %totals.total, "Order submitted");

        Ok(CheckoutOutcome {
            order_id,
            payment_method: request.payment_method,
            totals,
            shipping_tier: selection.tier,
            redirect_url,
            provider_order_id,
            warning: selection.warning,
        })
    }

    fn payment_order(
        &self,
        order_id: &OrderId,
        totals: OrderTotals,
        customer: &User,
        request: CheckoutRequest<'_>,
    ) -> PaymentOrder {
        let source = request.payment_method.as_str();
        PaymentOrder {
            order_id: order_id.clone(),
            amount: totals.total,
            currency: Currency::Usd,
            description: format!("Order {order_id}"),
            customer_email: customer.email.clone(),
            language: request.language,
            return_url: self.url(&format!("/checkout/result?source={source}&orderId={order_id}")),
            cancel_url: self.url(&format!(
                "/checkout/result?source={source}&orderId={order_id}&status=cancelled"
            )),
            callback_url: self.url("/api/payments/fondy/callback"),
        }
    }

    fn url(&self, path_and_query: &str) -> String {
        self.base_url
            .join(path_and_query)
            .map_or_else(|_| path_and_query.to_owned(), String::from)
    }
}

/// Millisecond timestamp plus a short random suffix.
///
/// Uniqueness is probabilistic; a collision surfaces as a conflict on insert.
#[must_use]
pub fn generate_order_id() -> OrderId {
    let suffix: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(ORDER_SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    OrderId::from_parts(Utc::now().timestamp_millis(), &suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_order_id_shape() {
        let id = generate_order_id();
        let (millis, suffix) = id.as_str().split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(suffix.len(), ORDER_SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_action_url_only_for_unverified_email() {
        assert_eq!(
            CheckoutError::EmailNotVerified.action_url(),
            Some("/account/profile")
        );
        assert_eq!(CheckoutError::EmptyCart.action_url(), None);
    }
}
