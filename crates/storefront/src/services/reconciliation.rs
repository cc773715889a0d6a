//! Payment confirmation handling.
//!
//! Two independent paths move an order out of `pending`: the redirect
//! gateway's signed callback and the hosted-order capture call. Neither is
//! guarded against the other; the last write wins.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use kramnytsia_core::{OrderId, OrderStatus, PaymentMethod};

use super::orders::OrderStore;
use crate::db::RepositoryError;
use crate::payments::{ConfirmedPayment, PaymentConfirmation, PaymentError, PaymentRegistry};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// The callback referenced an order we do not have.
    #[error("order {0} not found")]
    UnknownOrder(OrderId),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Result of a gateway callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallbackOutcome {
    pub order_id: OrderId,
    /// Status written, or `None` for a non-terminal gateway status.
    pub status: Option<OrderStatus>,
}

/// Result of a capture call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureOutcome {
    pub status: OrderStatus,
    pub order_id: Option<OrderId>,
    /// `false` when the money moved but the order row could not be updated.
    pub recorded: bool,
}

pub struct ReconciliationService {
    orders: Arc<dyn OrderStore>,
    payments: PaymentRegistry,
}

impl ReconciliationService {
    #[must_use]
    pub fn new(orders: Arc<dyn OrderStore>, payments: PaymentRegistry) -> Self {
        Self { orders, payments }
    }

    /// Verify a gateway callback and apply a terminal status.
    ///
    /// # Errors
    ///
    /// `Payment(InvalidSignature)` when verification fails (nothing is
    /// written), `UnknownOrder` when the order does not exist, or a database
    /// error.
    #[instrument(skip(self, params))]
    pub async fn handle_callback(
        &self,
        method: PaymentMethod,
        params: BTreeMap<String, String>,
    ) -> Result<CallbackOutcome, ReconcileError> {
        let provider = self.payments.get(method)?;
        let confirmed = match provider
            .confirm_payment(PaymentConfirmation::Callback(params))
            .await
        {
            Ok(confirmed) => confirmed,
            Err(e @ PaymentError::InvalidSignature) => {
                tracing::warn!(%method, "Rejected payment callback with invalid signature");
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        let order_id = confirmed
            .order_id
            .clone()
            .ok_or(PaymentError::MissingField("order_id"))?;

        let Some(status) = confirmed.status else {
            tracing::info!(order_id = %order_id, "Ignoring non-terminal payment status");
            return Ok(CallbackOutcome {
                order_id,
                status: None,
            });
        };

        if !self
            .orders
            .record_payment(&order_id, status, &confirmed.raw)
            .await?
        {
            return Err(ReconcileError::UnknownOrder(order_id));
        }

        tracing::info!(order_id = %order_id, %status, "Payment callback recorded");
        Ok(CallbackOutcome {
            order_id,
            status: Some(status),
        })
    }

    /// Capture an approved hosted order and mark the internal order paid.
    ///
    /// # Errors
    ///
    /// Returns the provider error when the capture fails or is not
    /// `COMPLETED`; the order is left untouched. Failures to record a
    /// completed capture are logged and reported as `recorded: false`.
    #[instrument(skip(self))]
    pub async fn capture(
        &self,
        method: PaymentMethod,
        provider_order_id: &str,
    ) -> Result<CaptureOutcome, ReconcileError> {
        let provider = self.payments.get(method)?;
        let confirmed = provider
            .confirm_payment(PaymentConfirmation::Capture {
                provider_order_id: provider_order_id.to_owned(),
            })
            .await?;
        let status = confirmed.status.unwrap_or(OrderStatus::Paid);

        let order_id = match self.locate(&confirmed, provider_order_id).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                tracing::error!(
                    provider_order_id,
                    "Captured payment has no matching order; reconcile manually"
                );
                return Ok(CaptureOutcome {
                    status,
                    order_id: None,
                    recorded: false,
                });
            }
            Err(e) => {
                tracing::error!(
                    provider_order_id,
                    error = %e,
                    "Failed to look up captured order; reconcile manually"
                );
                return Ok(CaptureOutcome {
                    status,
                    order_id: None,
                    recorded: false,
                });
            }
        };

        let recorded = match self
            .orders
            .record_payment(&order_id, status, &confirmed.raw)
            .await
        {
            Ok(true) => true,
            Ok(false) => {
                tracing::error!(order_id = %order_id, "Captured order vanished before update; reconcile manually");
                false
            }
            Err(e) => {
                tracing::error!(
                    order_id = %order_id,
                    error = %e,
                    "Failed to record captured payment; reconcile manually"
                );
                false
            }
        };

        if recorded {
            tracing::info!(order_id = %order_id, "Payment captured");
        }
        Ok(CaptureOutcome {
            status,
            order_id: Some(order_id),
            recorded,
        })
    }

    /// Find the internal order for a capture: embedded reference id, the
    /// provider id used as an internal id, then the stored provider id.
    async fn locate(
        &self,
        confirmed: &ConfirmedPayment,
        provider_order_id: &str,
    ) -> Result<Option<OrderId>, RepositoryError> {
        if let Some(id) = &confirmed.order_id
            && self.orders.status(id).await?.is_some()
        {
            return Ok(Some(id.clone()));
        }
        if let Some(id) = OrderId::parse(provider_order_id)
            && self.orders.status(&id).await?.is_some()
        {
            return Ok(Some(id));
        }
        self.orders.find_by_provider_order_id(provider_order_id).await
    }
}

/// Flatten a JSON callback body into string parameters.
///
/// Nested values are kept as their JSON text; `null` becomes empty.
#[must_use]
pub fn flatten_callback(body: &serde_json::Value) -> BTreeMap<String, String> {
    body.as_object()
        .map(|object| {
            object
                .iter()
                .map(|(key, value)| {
                    let text = match value {
                        serde_json::Value::String(s) => s.clone(),
                        serde_json::Value::Null => String::new(),
                        other => other.to_string(),
                    };
                    (key.clone(), text)
                })
                .collect()
        })
        .unwrap_or_default()
}
