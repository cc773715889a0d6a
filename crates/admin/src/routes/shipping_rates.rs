//! Shipping settings management.
//!
//! The storefront caches this table for a few minutes, so edits show up at
//! checkout after the cache expires.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use kramnytsia_core::{ShippingRate, normalize_country_code};

use crate::{
    db::{RepositoryError, ShippingRateRepository},
    error::{AppError, Result},
    middleware::RequireAdminAuth,
    state::AppState,
};

/// Body of a rate upsert. A missing price means the tier is not offered.
#[derive(Debug, Deserialize)]
pub struct RateBody {
    pub country_name: String,
    #[serde(default)]
    pub standard_price: Option<Decimal>,
    #[serde(default)]
    pub express_price: Option<Decimal>,
}

#[instrument(skip(_admin, state))]
pub async fn index(
    _admin: RequireAdminAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<ShippingRate>>> {
    Ok(Json(ShippingRateRepository::new(state.pool()).list().await?))
}

/// Create or replace the row for one country (or `ROW`).
#[instrument(skip(_admin, state))]
pub async fn upsert(
    _admin: RequireAdminAuth,
    State(state): State<AppState>,
    Path(country_code): Path<String>,
    Json(body): Json<RateBody>,
) -> Result<Json<ShippingRate>> {
    let rate = ShippingRate {
        country_code,
        country_name: body.country_name,
        standard_price: body.standard_price,
        express_price: body.express_price,
    }
    .normalized()?;

    let saved = ShippingRateRepository::new(state.pool()).upsert(&rate).await?;
    tracing::info!(country_code = %saved.country_code, "Shipping rate saved");
    Ok(Json(saved))
}

#[instrument(skip(_admin, state))]
pub async fn delete(
    _admin: RequireAdminAuth,
    State(state): State<AppState>,
    Path(country_code): Path<String>,
) -> Result<StatusCode> {
    let code = normalize_country_code(&country_code)?;

    match ShippingRateRepository::new(state.pool()).delete(&code).await {
        Ok(()) => {}
        Err(RepositoryError::NotFound) => {
            return Err(AppError::NotFound(format!("shipping rate {code}")));
        }
        Err(e) => return Err(e.into()),
    }

    if code == kramnytsia_core::REST_OF_WORLD {
        tracing::warn!("Rest-of-world shipping row deleted; unlisted countries can no longer check out");
    } else {
        tracing::info!(country_code = %code, "Shipping rate deleted");
    }
    Ok(StatusCode::NO_CONTENT)
}
