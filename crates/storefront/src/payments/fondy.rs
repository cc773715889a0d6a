//! Fondy redirect gateway.
//!
//! Requests and callbacks are signed with a SHA-1 digest over the secret key
//! and every non-empty parameter value, ordered by parameter name and joined
//! with `|`.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use tracing::instrument;

use kramnytsia_core::{OrderId, OrderStatus, PaymentMethod, to_minor_units};

use super::{
    ConfirmedPayment, PaymentConfirmation, PaymentError, PaymentInitiation, PaymentOrder,
    PaymentProvider, constant_time_eq, gateway_error,
};
use crate::config::FondyConfig;

/// Parameters that never take part in the digest.
const UNSIGNED_PARAMS: [&str; 2] = ["signature", "response_signature_string"];

/// Compute the request/callback signature for a parameter set.
///
/// Empty values and the signature fields themselves are skipped.
#[must_use]
pub fn signature(secret: &str, params: &BTreeMap<String, String>) -> String {
    let mut material = String::from(secret);
    for (key, value) in params {
        if value.is_empty() || UNSIGNED_PARAMS.contains(&key.as_str()) {
            continue;
        }
        material.push('|');
        material.push_str(value);
    }
    hex::encode(Sha1::digest(material.as_bytes()))
}

/// Check the `signature` field of a callback payload.
#[must_use]
pub fn verify_signature(secret: &str, params: &BTreeMap<String, String>) -> bool {
    let Some(received) = params.get("signature") else {
        return false;
    };
    let expected = signature(secret, params);
    constant_time_eq(expected.as_bytes(), received.to_ascii_lowercase().as_bytes())
}

/// Map a gateway `order_status` to a terminal order status.
///
/// Intermediate states (`created`, `processing`, `reversed`, ...) map to
/// `None` and leave the order untouched.
#[must_use]
pub fn map_order_status(status: &str) -> Option<OrderStatus> {
    match status {
        "approved" => Some(OrderStatus::Success),
        "declined" | "expired" => Some(OrderStatus::Failure),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct CheckoutEnvelope {
    response: CheckoutResponse,
}

#[derive(Debug, Deserialize)]
struct CheckoutResponse {
    response_status: String,
    checkout_url: Option<String>,
    error_message: Option<String>,
    error_code: Option<serde_json::Value>,
}

/// Fondy API client.
pub struct FondyProvider {
    client: reqwest::Client,
    merchant_id: String,
    secret_key: SecretString,
    api_base: url::Url,
}

impl FondyProvider {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &FondyConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            merchant_id: config.merchant_id.clone(),
            secret_key: config.secret_key.clone(),
            api_base: config.api_base.clone(),
        })
    }

    fn checkout_params(&self, order: &PaymentOrder) -> Result<BTreeMap<String, String>, PaymentError> {
        let amount = to_minor_units(order.amount)
            .filter(|minor| *minor > 0)
            .ok_or(PaymentError::InvalidAmount(order.amount))?;

        let mut params = BTreeMap::new();
        params.insert("order_id".to_owned(), order.order_id.to_string());
        params.insert("merchant_id".to_owned(), self.merchant_id.clone());
        params.insert("order_desc".to_owned(), order.description.clone());
        params.insert("amount".to_owned(), amount.to_string());
        params.insert("currency".to_owned(), order.currency.code().to_owned());
        params.insert("response_url".to_owned(), order.return_url.clone());
        params.insert("server_callback_url".to_owned(), order.callback_url.clone());
        params.insert("lang".to_owned(), order.language.code().to_owned());
        params.insert("sender_email".to_owned(), order.customer_email.to_string());

        let signed = signature(self.secret_key.expose_secret(), &params);
        params.insert("signature".to_owned(), signed);
        Ok(params)
    }
}

#[async_trait]
impl PaymentProvider for FondyProvider {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Fondy
    }

    #[instrument(skip(self, order), fields(order_id = %order.order_id))]
    async fn create_payment(&self, order: &PaymentOrder) -> Result<PaymentInitiation, PaymentError> {
        let params = self.checkout_params(order)?;
        let endpoint = self
            .api_base
            .join("/api/checkout/url/")
            .map_err(|e| PaymentError::Malformed(e.to_string()))?;

        let response = self
            .client
            .post(endpoint)
            .json(&serde_json::json!({ "request": params }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(gateway_error(response).await);
        }

        let envelope: CheckoutEnvelope = response.json().await?;
        let body = envelope.response;

        if body.response_status != "success" {
            let code = body
                .error_code
                .map(|c| c.to_string())
                .unwrap_or_default();
            let message = body
                .error_message
                .unwrap_or_else(|| "checkout rejected".to_owned());
            return Err(PaymentError::Gateway {
                status: 200,
                message: if code.is_empty() {
                    message
                } else {
                    format!("{message} (code {code})")
                },
            });
        }

        let url = body
            .checkout_url
            .filter(|u| !u.is_empty())
            .ok_or(PaymentError::MissingField("checkout_url"))?;

        Ok(PaymentInitiation::Redirect { url })
    }

    #[instrument(skip(self, confirmation))]
    async fn confirm_payment(
        &self,
        confirmation: PaymentConfirmation,
    ) -> Result<ConfirmedPayment, PaymentError> {
        let PaymentConfirmation::Callback(params) = confirmation else {
            return Err(PaymentError::Unsupported {
                method: PaymentMethod::Fondy,
                operation: "capture",
            });
        };

        if !verify_signature(self.secret_key.expose_secret(), &params) {
            return Err(PaymentError::InvalidSignature);
        }

        let order_id = params
            .get("order_id")
            .and_then(|id| OrderId::parse(id))
            .ok_or(PaymentError::MissingField("order_id"))?;
        let status = params
            .get("order_status")
            .and_then(|s| map_order_status(s));
        let provider_order_id = params.get("payment_id").filter(|p| !p.is_empty()).cloned();

        let raw = serde_json::to_value(&params)
            .map_err(|e| PaymentError::Malformed(e.to_string()))?;

        Ok(ConfirmedPayment {
            order_id: Some(order_id),
            provider_order_id,
            status,
            raw,
        })
    }
}
