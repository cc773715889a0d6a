//! Checkout submission and payment result handlers.

use axum::{
    Form, Json,
    extract::{Query, State},
    response::Redirect,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use kramnytsia_core::{AddressId, Language, OrderId, PaymentMethod, ShippingTier};

use crate::db::AddressRepository;
use crate::error::{Result, add_breadcrumb};
use crate::middleware::OptionalAuth;
use crate::models::session::{load_cart, store_cart};
use crate::services::{AuthError, AuthService, CheckoutOutcome, CheckoutRequest};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    /// Defaults to the user's default address.
    pub address_id: Option<AddressId>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub shipping_tier: ShippingTier,
    #[serde(default)]
    pub lang: Language,
}

/// POST /api/checkout
#[instrument(skip(state, session, current, body))]
pub async fn submit(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(current): OptionalAuth,
    Json(body): Json<CheckoutBody>,
) -> Result<Json<CheckoutOutcome>> {
    // Reload so verification done elsewhere is seen immediately.
    let customer = match &current {
        Some(current) => match AuthService::new(state.pool()).get_user(current.id).await {
            Ok(user) => Some(user),
            Err(AuthError::UserNotFound) => None,
            Err(e) => return Err(e.into()),
        },
        None => None,
    };

    let address = match &customer {
        Some(user) => {
            let addresses = AddressRepository::new(state.pool());
            match body.address_id {
                Some(id) => addresses.get(user.id, id).await?,
                None => addresses.get_default(user.id).await?,
            }
        }
        None => None,
    };

    let cart = load_cart(&session).await?;
    let rates = state.shipping().rates().await?;

    let outcome = state
        .checkout()
        .submit(
            CheckoutRequest {
                customer: customer.as_ref(),
                address: address.as_ref(),
                cart: &cart,
                payment_method: body.payment_method,
                shipping_tier: body.shipping_tier,
                language: body.lang,
            },
            &rates,
        )
        .await?;

    add_breadcrumb(
        "checkout",
        "Order submitted",
        Some(&[("order_id", outcome.order_id.as_str())]),
    );
    Ok(Json(outcome))
}

/// Parameters a payment page sends the shopper back with.
///
/// Accepts both our own names and the redirect gateway's form fields.
#[derive(Debug, Default, Deserialize)]
pub struct ResultParams {
    pub source: Option<String>,
    #[serde(rename = "orderId", alias = "order_id")]
    pub order_id: Option<String>,
    #[serde(alias = "order_status")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

#[derive(Debug, Serialize)]
pub struct ResultResponse {
    pub source: Option<String>,
    pub order_id: Option<OrderId>,
    pub outcome: Outcome,
}

/// Statuses that mean the shopper did not pay.
const FAILURE_STATUSES: [&str; 5] = ["declined", "expired", "failure", "failed", "cancelled"];

/// Classify a return from a payment page. Nothing is re-verified here; the
/// order status is owned by the callback and capture paths.
#[must_use]
pub fn classify(params: &ResultParams) -> (Option<OrderId>, Outcome) {
    let order_id = params.order_id.as_deref().and_then(OrderId::parse);
    let failed = params
        .status
        .as_deref()
        .is_some_and(|s| FAILURE_STATUSES.iter().any(|f| s.eq_ignore_ascii_case(f)));
    let outcome = if failed || order_id.is_none() {
        Outcome::Failure
    } else {
        Outcome::Success
    };
    (order_id, outcome)
}

async fn result(
    state: &AppState,
    session: &Session,
    user: Option<crate::models::CurrentUser>,
    params: ResultParams,
) -> Result<Json<ResultResponse>> {
    let (order_id, outcome) = classify(&params);

    if outcome == Outcome::Success {
        let mut cart = load_cart(session).await?;
        state.carts().clear_cart(&mut cart, user.map(|u| u.id)).await;
        store_cart(session, &cart).await?;
    }

    Ok(Json(ResultResponse {
        source: params.source,
        order_id,
        outcome,
    }))
}

/// GET /checkout/result
pub async fn result_get(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Query(params): Query<ResultParams>,
) -> Result<Json<ResultResponse>> {
    result(&state, &session, user, params).await
}

/// Query string that carries `params` to `GET /checkout/result`.
fn result_location(params: &ResultParams) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    if let Some(source) = &params.source {
        query.append_pair("source", source);
    }
    if let Some(order_id) = &params.order_id {
        query.append_pair("orderId", order_id);
    }
    if let Some(status) = &params.status {
        query.append_pair("status", status);
    }
    format!("/checkout/result?{}", query.finish())
}

/// POST /checkout/result
///
/// The redirect gateway posts its form here as a cross-site navigation, which
/// does not carry the `SameSite=Lax` session cookie. The shopper is sent on
/// to the GET handler with a 303, where the cookie is present and the cart
/// can be cleared. Query parameters set at checkout fill in anything the
/// form leaves out.
pub async fn result_post(
    Query(query): Query<ResultParams>,
    Form(form): Form<ResultParams>,
) -> Redirect {
    let params = ResultParams {
        source: form.source.or(query.source),
        order_id: form.order_id.or(query.order_id),
        status: form.status.or(query.status),
    };
    Redirect::to(&result_location(&params))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn params(order_id: Option<&str>, status: Option<&str>) -> ResultParams {
        ResultParams {
            source: Some("fondy".to_string()),
            order_id: order_id.map(String::from),
            status: status.map(String::from),
        }
    }

    #[test]
    fn test_success_without_status() {
        let (id, outcome) = classify(&params(Some("1700000000000-ab12cd"), None));
        assert_eq!(outcome, Outcome::Success);
        assert_eq!(id.unwrap().as_str(), "1700000000000-ab12cd");
    }

    #[test]
    fn test_explicit_failure_status() {
        for status in ["declined", "EXPIRED", "cancelled", "failure"] {
            let (_, outcome) = classify(&params(Some("1-a"), Some(status)));
            assert_eq!(outcome, Outcome::Failure, "{status}");
        }
    }

    #[test]
    fn test_missing_order_id_is_failure() {
        let (id, outcome) = classify(&params(None, Some("approved")));
        assert!(id.is_none());
        assert_eq!(outcome, Outcome::Failure);

        let (_, outcome) = classify(&params(Some("   "), None));
        assert_eq!(outcome, Outcome::Failure);
    }

    #[test]
    fn test_posted_result_is_forwarded_as_query() {
        let location = result_location(&ResultParams {
            source: Some("fondy".to_string()),
            order_id: Some("1767225600000-ab12cd".to_string()),
            status: Some("approved".to_string()),
        });
        assert_eq!(
            location,
            "/checkout/result?source=fondy&orderId=1767225600000-ab12cd&status=approved"
        );

        let location = result_location(&ResultParams {
            source: None,
            order_id: Some("1-a&status=declined".to_string()),
            status: None,
        });
        assert_eq!(location, "/checkout/result?orderId=1-a%26status%3Ddeclined");
    }

    #[tokio::test]
    async fn test_result_post_redirects_with_see_other() {
        use axum::response::IntoResponse;

        let response = result_post(
            Query(ResultParams {
                source: Some("fondy".to_string()),
                order_id: Some("1767225600000-ab12cd".to_string()),
                status: None,
            }),
            Form(ResultParams {
                source: None,
                order_id: None,
                status: Some("declined".to_string()),
            }),
        )
        .await
        .into_response();

        assert_eq!(response.status(), axum::http::StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[axum::http::header::LOCATION],
            "/checkout/result?source=fondy&orderId=1767225600000-ab12cd&status=declined"
        );
    }

    #[test]
    fn test_gateway_form_field_names() {
        let parsed: ResultParams = serde_json::from_value(serde_json::json!({
            "order_id": "1-a",
            "order_status": "declined"
        }))
        .unwrap();
        assert_eq!(parsed.order_id.as_deref(), Some("1-a"));
        assert_eq!(parsed.status.as_deref(), Some("declined"));
    }
}
