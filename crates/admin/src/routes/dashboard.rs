//! Dashboard route handler.

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::instrument;

use crate::{
    db::OrderRepository,
    error::Result,
    middleware::RequireAdminAuth,
    services::{DashboardMetrics, DateWindow},
    state::AppState,
};

/// Inclusive `YYYY-MM-DD` bounds.
#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Dashboard metrics for a date window (default: the last 30 days).
#[instrument(skip(_admin, state))]
pub async fn show(
    _admin: RequireAdminAuth,
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardMetrics>> {
    let window = DateWindow::from_days(query.from, query.to, Utc::now().date_naive())?;
    let orders = OrderRepository::new(state.pool())
        .created_between(window.from, window.to)
        .await?;

    Ok(Json(DashboardMetrics::compute(window, orders)))
}
