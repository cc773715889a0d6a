//! Currency display and shipping quote handlers.

use axum::{
    Json,
    extract::{Query, State},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use kramnytsia_core::{
    Currency, ExchangeRates, ShippingQuote, ShippingTier, ShippingWarning, format_display,
};

use crate::error::{AppError, Result};
use crate::state::AppState;

/// GET /api/pricing/rates
pub async fn rates(State(state): State<AppState>) -> Json<ExchangeRates> {
    Json(state.rates().clone())
}

#[derive(Debug, Deserialize)]
pub struct DisplayQuery {
    /// USD amount.
    pub amount: Decimal,
    pub currency: String,
}

#[derive(Debug, Serialize)]
pub struct DisplayResponse {
    pub currency: Currency,
    /// Converted and rounded amount.
    pub amount: Decimal,
    pub display: String,
}

/// GET /api/pricing/display?amount=&currency=
pub async fn display(
    State(state): State<AppState>,
    Query(query): Query<DisplayQuery>,
) -> Result<Json<DisplayResponse>> {
    let currency: Currency = query
        .currency
        .parse()
        .map_err(|e: kramnytsia_core::CurrencyError| AppError::BadRequest(e.to_string()))?;
    let amount = state
        .rates()
        .convert(query.amount, currency)
        .ok_or_else(|| AppError::BadRequest("amount is too large to convert".to_string()))?;
    Ok(Json(DisplayResponse {
        currency,
        amount,
        display: format_display(amount, currency),
    }))
}

#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub country: String,
    #[serde(default)]
    pub tier: ShippingTier,
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    /// Tier actually used after fallback.
    pub tier: ShippingTier,
    pub quote: ShippingQuote,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<ShippingWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

/// GET /api/shipping/quote?country=&tier=
pub async fn shipping_quote(
    State(state): State<AppState>,
    Query(query): Query<QuoteQuery>,
) -> Result<Json<QuoteResponse>> {
    if query.country.trim().is_empty() {
        return Err(AppError::BadRequest("country is required".to_string()));
    }
    let selection = state.shipping().quote(&query.country, query.tier).await?;
    Ok(Json(QuoteResponse {
        tier: selection.tier,
        quote: selection.quote,
        cost: selection.quote.amount(),
        warning: selection.warning,
        message: selection.warning.map(ShippingWarning::message),
    }))
}
