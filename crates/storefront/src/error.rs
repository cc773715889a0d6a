//! Unified error handling with Sentry integration.
//!
//! Route handlers return `Result<T, AppError>`. Server-side failures are
//! captured to Sentry before the JSON error body is written; their detail is
//! never sent to the client.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use kramnytsia_core::{AddressError, CartError};

use crate::db::RepositoryError;
use crate::payments::PaymentError;
use crate::services::auth::AuthError;
use crate::services::checkout::CheckoutError;
use crate::services::reconciliation::ReconcileError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    #[error("Address error: {0}")]
    Address(#[from] AddressError),

    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    action_url: Option<&'static str>,
}

const fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) => StatusCode::CONFLICT,
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

const fn payment_status(err: &PaymentError) -> StatusCode {
    match err {
        PaymentError::Http(_)
        | PaymentError::Gateway { .. }
        | PaymentError::NotCompleted { .. }
        | PaymentError::Malformed(_) => StatusCode::BAD_GATEWAY,
        PaymentError::InvalidSignature
        | PaymentError::MissingField(_)
        | PaymentError::Unsupported { .. }
        | PaymentError::Unavailable(_)
        | PaymentError::InvalidOrderId => StatusCode::BAD_REQUEST,
        PaymentError::InvalidAmount(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn payment_message(err: &PaymentError) -> String {
    match err {
        PaymentError::Http(_) | PaymentError::Malformed(_) => {
            "Payment provider unavailable".to_string()
        }
        PaymentError::InvalidSignature => "Invalid signature".to_string(),
        other => other.to_string(),
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => repository_status(err),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::UserNotFound => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_) | AuthError::InvalidEmail(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Cart(err) => match err {
                CartError::OutOfStock { .. } => StatusCode::CONFLICT,
                CartError::ZeroQuantity => StatusCode::BAD_REQUEST,
                CartError::NotInCart(_) | CartError::NotInWishlist(_) => StatusCode::NOT_FOUND,
            },
            Self::Address(err) => match err {
                AddressError::NotFound(_) => StatusCode::NOT_FOUND,
                AddressError::MissingField(_) | AddressError::InvalidCountryCode => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
            },
            Self::Checkout(err) => match err {
                CheckoutError::NotAuthenticated => StatusCode::UNAUTHORIZED,
                CheckoutError::EmailNotVerified => StatusCode::FORBIDDEN,
                CheckoutError::NoAddress
                | CheckoutError::EmptyCart
                | CheckoutError::ShippingUnavailable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                CheckoutError::Repository(err) => repository_status(err),
                CheckoutError::Payment(err) => payment_status(err),
            },
            Self::Payment(err) => payment_status(err),
            Self::Reconcile(err) => match err {
                ReconcileError::Payment(err) => payment_status(err),
                ReconcileError::UnknownOrder(_) => StatusCode::NOT_FOUND,
                ReconcileError::Repository(err) => repository_status(err),
            },
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    const fn code(&self) -> &'static str {
        match self {
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => "internal",
            Self::Auth(AuthError::UserAlreadyExists) => "user_exists",
            Self::Auth(AuthError::WeakPassword(_)) => "weak_password",
            Self::Auth(AuthError::InvalidEmail(_)) => "invalid_email",
            Self::Auth(_) => "invalid_credentials",
            Self::Cart(CartError::OutOfStock { .. }) => "out_of_stock",
            Self::Cart(_) => "cart",
            Self::Address(_) => "address",
            Self::Checkout(err) => match err {
                CheckoutError::NotAuthenticated => "not_authenticated",
                CheckoutError::EmailNotVerified => "email_not_verified",
                CheckoutError::NoAddress => "no_address",
                CheckoutError::EmptyCart => "empty_cart",
                CheckoutError::ShippingUnavailable { .. } => "shipping_unavailable",
                CheckoutError::Repository(_) => "internal",
                CheckoutError::Payment(_) => "payment",
            },
            Self::Payment(PaymentError::InvalidSignature)
            | Self::Reconcile(ReconcileError::Payment(PaymentError::InvalidSignature)) => {
                "invalid_signature"
            }
            Self::Payment(PaymentError::NotCompleted { .. })
            | Self::Reconcile(ReconcileError::Payment(PaymentError::NotCompleted { .. })) => {
                "payment_not_completed"
            }
            Self::Payment(_) | Self::Reconcile(_) => "payment",
            Self::NotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::BadRequest(_) => "bad_request",
            Self::RateLimited => "rate_limited",
        }
    }

    /// Client-facing message. Server-side detail stays in the logs.
    fn message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(RepositoryError::Conflict(what)) => format!("{what} already exists"),
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::UserNotFound => {
                    "Invalid credentials".to_string()
                }
                AuthError::UserAlreadyExists => {
                    "An account with this email already exists".to_string()
                }
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    "Authentication error".to_string()
                }
            },
            Self::Checkout(CheckoutError::Repository(_))
            | Self::Reconcile(ReconcileError::Repository(_)) => "Internal server error".to_string(),
            Self::Checkout(CheckoutError::Payment(err))
            | Self::Payment(err)
            | Self::Reconcile(ReconcileError::Payment(err)) => payment_message(err),
            Self::Cart(err) => err.to_string(),
            Self::Address(err) => err.to_string(),
            Self::Checkout(err) => err.to_string(),
            Self::Reconcile(err) => err.to_string(),
            Self::NotFound(what) => format!("Not found: {what}"),
            Self::Unauthorized(msg) | Self::BadRequest(msg) => msg.clone(),
            Self::RateLimited => "Too many requests".to_string(),
        }
    }

    const fn action_url(&self) -> Option<&'static str> {
        match self {
            Self::Checkout(err) => err.action_url(),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let body = ErrorBody {
            error: self.message(),
            code: self.code(),
            action_url: self.action_url(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context after sign-in.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context on sign-out.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Order submitted", Some(&[("order_id", "1700000000000-ab12cd")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
