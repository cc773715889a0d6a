//! Customer order history.

use axum::{
    Json,
    extract::{Path, State},
};

use kramnytsia_core::OrderId;

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{Order, OrderSummary};
use crate::state::AppState;

/// GET /api/orders
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<OrderSummary>>> {
    Ok(Json(state.orders().list_for_user(user.id).await?))
}

/// GET /api/orders/{id}
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Result<Json<Order>> {
    let not_found = || AppError::NotFound(format!("order {id}"));
    let order_id = OrderId::parse(&id).ok_or_else(not_found)?;
    state
        .orders()
        .get_for_user(user.id, &order_id)
        .await?
        .map(Json)
        .ok_or_else(not_found)
}
