//! Payment confirmation endpoints.
//!
//! The gateway callback is unauthenticated and verified by signature only.
//! The capture call is made by the browser after the shopper approves the
//! hosted order.

use std::collections::BTreeMap;

use axum::{
    Form, Json,
    extract::{FromRequest, Request, State},
    http::header::CONTENT_TYPE,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use kramnytsia_core::PaymentMethod;

use crate::error::{AppError, Result};
use crate::payments::paypal::is_valid_order_id;
use crate::services::reconciliation::{CaptureOutcome, flatten_callback};
use crate::state::AppState;

/// Callback parameters, posted as JSON or as a urlencoded form.
pub struct CallbackParams(pub BTreeMap<String, String>);

impl<S> FromRequest<S> for CallbackParams
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));

        if is_json {
            let Json(body) = Json::<serde_json::Value>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            Ok(Self(flatten_callback(&body)))
        } else {
            let Form(params) = Form::<BTreeMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            Ok(Self(params))
        }
    }
}

/// POST /api/payments/fondy/callback
///
/// Responds 400 on a signature mismatch; non-terminal statuses are accepted
/// and ignored.
#[instrument(skip(state, params))]
pub async fn fondy_callback(
    State(state): State<AppState>,
    CallbackParams(params): CallbackParams,
) -> Result<Json<serde_json::Value>> {
    let outcome = state
        .reconciliation()
        .handle_callback(PaymentMethod::Fondy, params)
        .await?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "order_id": outcome.order_id,
        "order_status": outcome.status,
    })))
}

#[derive(Debug, Deserialize)]
pub struct CaptureRequest {
    pub provider_order_id: String,
}

#[derive(Debug, Serialize)]
pub struct CaptureResponse {
    #[serde(flatten)]
    pub outcome: CaptureOutcome,
}

/// POST /api/payments/paypal/capture
#[instrument(skip(state))]
pub async fn paypal_capture(
    State(state): State<AppState>,
    Json(request): Json<CaptureRequest>,
) -> Result<Json<CaptureResponse>> {
    let provider_order_id = request.provider_order_id.trim();
    if provider_order_id.is_empty() {
        return Err(AppError::BadRequest("provider_order_id is required".to_string()));
    }
    if !is_valid_order_id(provider_order_id) {
        return Err(AppError::BadRequest("provider_order_id is malformed".to_string()));
    }
    let outcome = state
        .reconciliation()
        .capture(PaymentMethod::Paypal, provider_order_id)
        .await?;
    Ok(Json(CaptureResponse { outcome }))
}
