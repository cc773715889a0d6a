//! Order list, detail and manual edits.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use url::Url;

use kramnytsia_core::{OrderId, OrderStatus};

use crate::{
    db::{OrderFilter, OrderRepository},
    error::{AppError, Result},
    middleware::RequireAdminAuth,
    models::{Order, OrderSummary},
    state::AppState,
};

const DEFAULT_PER_PAGE: u32 = 50;
const MAX_PER_PAGE: u32 = 200;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ListQuery {
    fn filter(&self) -> (OrderFilter, u32, u32) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self
            .per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE);
        let filter = OrderFilter {
            status: self.status,
            limit: i64::from(per_page),
            offset: i64::from(page - 1) * i64::from(per_page),
        };
        (filter, page, per_page)
    }
}

#[derive(Debug, Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderSummary>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

#[derive(Debug, Serialize)]
pub struct StatusUpdated {
    pub id: OrderId,
    pub previous_status: OrderStatus,
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct TrackingUpdate {
    pub tracking_number: String,
    #[serde(default)]
    pub tracking_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TrackingUpdated {
    pub id: OrderId,
    pub tracking_number: String,
    pub tracking_url: Option<String>,
}

fn parse_id(raw: &str) -> Result<OrderId> {
    OrderId::parse(raw).ok_or_else(|| AppError::NotFound(format!("order {raw}")))
}

/// Order list, newest first.
#[instrument(skip(_admin, state))]
pub async fn index(
    _admin: RequireAdminAuth,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<OrderListResponse>> {
    let (filter, page, per_page) = query.filter();
    let result = OrderRepository::new(state.pool()).list(filter).await?;

    Ok(Json(OrderListResponse {
        orders: result.orders,
        total: result.total,
        page,
        per_page,
    }))
}

/// Order detail.
#[instrument(skip(_admin, state))]
pub async fn show(
    _admin: RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Order>> {
    let id = parse_id(&id)?;
    OrderRepository::new(state.pool())
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))
}

/// Move an order to an administrator-driven status.
///
/// The current status is read and the new one written without a lock, so a
/// payment confirmation landing in between is overwritten.
#[instrument(skip(_admin, state))]
pub async fn update_status(
    _admin: RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<StatusUpdate>,
) -> Result<Json<StatusUpdated>> {
    let id = parse_id(&id)?;
    let repo = OrderRepository::new(state.pool());

    let previous_status = repo
        .status(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;
    let status = previous_status.admin_transition(body.status)?;

    repo.set_status(&id, status).await?;
    tracing::info!(order_id = %id, from = %previous_status, to = %status, "Order status edited");

    Ok(Json(StatusUpdated {
        id,
        previous_status,
        status,
    }))
}

/// Set the tracking number, and optionally the carrier URL.
#[instrument(skip(_admin, state, body))]
pub async fn update_tracking(
    _admin: RequireAdminAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<TrackingUpdate>,
) -> Result<Json<TrackingUpdated>> {
    let id = parse_id(&id)?;
    let (tracking_number, tracking_url) = validate_tracking(body)?;

    OrderRepository::new(state.pool())
        .set_tracking(&id, &tracking_number, tracking_url.as_deref())
        .await?;
    tracing::info!(order_id = %id, %tracking_number, "Order tracking edited");

    Ok(Json(TrackingUpdated {
        id,
        tracking_number,
        tracking_url,
    }))
}

fn validate_tracking(body: TrackingUpdate) -> Result<(String, Option<String>)> {
    let tracking_number = body.tracking_number.trim().to_string();
    if tracking_number.is_empty() {
        return Err(AppError::BadRequest(
            "tracking_number cannot be empty".to_string(),
        ));
    }

    let tracking_url = body
        .tracking_url
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .map(|raw| match Url::parse(&raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(url.to_string()),
            _ => Err(AppError::BadRequest(format!("invalid tracking_url: {raw}"))),
        })
        .transpose()?;

    Ok((tracking_number, tracking_url))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn tracking(number: &str, url: Option<&str>) -> TrackingUpdate {
        TrackingUpdate {
            tracking_number: number.to_string(),
            tracking_url: url.map(String::from),
        }
    }

    #[test]
    fn test_pagination_defaults_and_bounds() {
        let query = ListQuery {
            status: None,
            page: None,
            per_page: None,
        };
        let (filter, page, per_page) = query.filter();
        assert_eq!((page, per_page), (1, DEFAULT_PER_PAGE));
        assert_eq!(filter.offset, 0);

        let query = ListQuery {
            status: Some(OrderStatus::Paid),
            page: Some(3),
            per_page: Some(10_000),
        };
        let (filter, page, per_page) = query.filter();
        assert_eq!(per_page, MAX_PER_PAGE);
        assert_eq!(filter.offset, 2 * i64::from(MAX_PER_PAGE));
        assert_eq!(page, 3);
        assert_eq!(filter.status, Some(OrderStatus::Paid));
    }

    #[test]
    fn test_page_zero_treated_as_first() {
        let query = ListQuery {
            status: None,
            page: Some(0),
            per_page: Some(20),
        };
        assert_eq!(query.filter().0.offset, 0);
    }

    #[test]
    fn test_tracking_validation() {
        let (number, url) =
            validate_tracking(tracking(" 20450000123456 ", Some("https://novaposhta.ua/t"))).unwrap();
        assert_eq!(number, "20450000123456");
        assert_eq!(url.as_deref(), Some("https://novaposhta.ua/t"));

        let (_, url) = validate_tracking(tracking("RR123", Some("  "))).unwrap();
        assert_eq!(url, None);

        assert!(validate_tracking(tracking("  ", None)).is_err());
        assert!(validate_tracking(tracking("RR123", Some("javascript:alert(1)"))).is_err());
    }

    #[test]
    fn test_blank_id_is_not_found() {
        assert!(matches!(parse_id("  "), Err(AppError::NotFound(_))));
    }
}
