//! PayPal Orders v2 integration.
//!
//! Orders are created with `intent=CAPTURE` and captured synchronously once
//! the shopper approves them. OAuth access tokens are cached until shortly
//! before they expire.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::instrument;

use kramnytsia_core::{OrderId, OrderStatus, PaymentMethod};

use super::{
    ConfirmedPayment, PaymentConfirmation, PaymentError, PaymentInitiation, PaymentOrder,
    PaymentProvider, gateway_error,
};
use crate::config::PaypalConfig;

/// Refresh tokens this long before the provider says they expire.
const TOKEN_EXPIRY_BUFFER_SECS: i64 = 60;

const MAX_ORDER_ID_LEN: usize = 64;

/// Whether `id` has the shape of a PayPal order id.
///
/// The id becomes a path segment of an authenticated request, so only
/// ASCII alphanumerics and `-` are accepted.
#[must_use]
pub fn is_valid_order_id(id: &str) -> bool {
    (1..=MAX_ORDER_ID_LEN).contains(&id.len())
        && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

#[derive(Clone)]
struct AccessToken {
    value: SecretString,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        Utc::now() + chrono::Duration::seconds(TOKEN_EXPIRY_BUFFER_SECS) < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    status: Option<String>,
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
    rel: String,
}

/// PayPal REST client.
pub struct PaypalProvider {
    client: reqwest::Client,
    client_id: String,
    client_secret: SecretString,
    api_base: url::Url,
    brand_name: String,
    token: RwLock<Option<AccessToken>>,
}

impl PaypalProvider {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &PaypalConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            api_base: config.api_base.clone(),
            brand_name: config.brand_name.clone(),
            token: RwLock::new(None),
        })
    }

    fn endpoint(&self, path: &str) -> Result<url::Url, PaymentError> {
        self.api_base
            .join(path)
            .map_err(|e| PaymentError::Malformed(e.to_string()))
    }

    async fn access_token(&self) -> Result<String, PaymentError> {
        if let Some(token) = self.token.read().await.as_ref()
            && token.is_fresh()
        {
            return Ok(token.value.expose_secret().to_owned());
        }

        let mut slot = self.token.write().await;
        // Another request may have refreshed while we waited for the lock.
        if let Some(token) = slot.as_ref()
            && token.is_fresh()
        {
            return Ok(token.value.expose_secret().to_owned());
        }

        let response = self
            .client
            .post(self.endpoint("/v1/oauth2/token")?)
            .basic_auth(&self.client_id, Some(self.client_secret.expose_secret()))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(gateway_error(response).await);
        }

        let body: TokenResponse = response.json().await?;
        let value = body.access_token.clone();
        *slot = Some(AccessToken {
            value: SecretString::from(body.access_token),
            expires_at: Utc::now() + chrono::Duration::seconds(body.expires_in),
        });
        Ok(value)
    }

    #[instrument(skip(self))]
    async fn capture(&self, provider_order_id: &str) -> Result<ConfirmedPayment, PaymentError> {
        if !is_valid_order_id(provider_order_id) {
            return Err(PaymentError::InvalidOrderId);
        }
        let token = self.access_token().await?;
        let path = format!("/v2/checkout/orders/{provider_order_id}/capture");

        let response = self
            .client
            .post(self.endpoint(&path)?)
            .bearer_auth(token)
            .header("Content-Type", "application/json")
            .body("{}")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(gateway_error(response).await);
        }

        let raw: serde_json::Value = response.json().await?;
        let status = raw
            .get("status")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();

        if status != "COMPLETED" {
            return Err(PaymentError::NotCompleted {
                status: status.to_owned(),
            });
        }

        let order_id = raw
            .pointer("/purchase_units/0/reference_id")
            .and_then(serde_json::Value::as_str)
            .and_then(OrderId::parse);
        let provider_order_id = raw
            .get("id")
            .and_then(serde_json::Value::as_str)
            .map_or_else(|| provider_order_id.to_owned(), str::to_owned);

        Ok(ConfirmedPayment {
            order_id,
            provider_order_id: Some(provider_order_id),
            status: Some(OrderStatus::Paid),
            raw,
        })
    }
}

#[async_trait]
impl PaymentProvider for PaypalProvider {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Paypal
    }

    #[instrument(skip(self, order), fields(order_id = %order.order_id))]
    async fn create_payment(&self, order: &PaymentOrder) -> Result<PaymentInitiation, PaymentError> {
        if order.amount <= rust_decimal::Decimal::ZERO {
            return Err(PaymentError::InvalidAmount(order.amount));
        }

        let token = self.access_token().await?;
        let body = serde_json::json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": order.order_id.as_str(),
                "description": order.description,
                "amount": {
                    "currency_code": order.currency.code(),
                    "value": format!("{:.2}", order.amount.round_dp(2)),
                },
            }],
            "payment_source": {
                "paypal": {
                    "email_address": order.customer_email.as_str(),
                    "experience_context": {
                        "brand_name": self.brand_name,
                        "locale": paypal_locale(order.language),
                        "user_action": "PAY_NOW",
                        "shipping_preference": "NO_SHIPPING",
                        "return_url": order.return_url,
                        "cancel_url": order.cancel_url,
                    },
                },
            },
        });

        let response = self
            .client
            .post(self.endpoint("/v2/checkout/orders")?)
            .bearer_auth(token)
            .header("PayPal-Request-Id", order.order_id.as_str())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(gateway_error(response).await);
        }

        let created: OrderResponse = response.json().await?;
        tracing::debug!(
            provider_order_id = %created.id,
            status = created.status.as_deref().unwrap_or("unknown"),
            "PayPal order created"
        );

        let approval_url = created
            .links
            .iter()
            .find(|l| l.rel == "payer-action" || l.rel == "approve")
            .map(|l| l.href.clone());

        Ok(PaymentInitiation::HostedOrder {
            provider_order_id: created.id,
            approval_url,
        })
    }

    async fn confirm_payment(
        &self,
        confirmation: PaymentConfirmation,
    ) -> Result<ConfirmedPayment, PaymentError> {
        match confirmation {
            PaymentConfirmation::Capture { provider_order_id } => {
                self.capture(&provider_order_id).await
            }
            PaymentConfirmation::Callback(_) => Err(PaymentError::Unsupported {
                method: PaymentMethod::Paypal,
                operation: "signed callbacks",
            }),
        }
    }
}

const fn paypal_locale(language: kramnytsia_core::Language) -> &'static str {
    match language {
        kramnytsia_core::Language::En => "en-US",
        kramnytsia_core::Language::Uk => "uk-UA",
    }
}
