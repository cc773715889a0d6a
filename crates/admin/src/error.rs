//! Unified error handling for admin.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use kramnytsia_core::{ShippingRateError, StatusTransitionError};

use crate::db::RepositoryError;
use crate::services::WindowError;

/// Application-level error type for the back office.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Status edit not allowed from the order's current state.
    #[error(transparent)]
    Transition(#[from] StatusTransitionError),

    /// Shipping settings row failed validation.
    #[error(transparent)]
    InvalidRate(#[from] ShippingRateError),

    /// Dashboard date range is unusable.
    #[error(transparent)]
    InvalidWindow(#[from] WindowError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl AppError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Transition(_) => StatusCode::CONFLICT,
            Self::InvalidRate(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidWindow(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    const fn code(&self) -> &'static str {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => "not_found",
            Self::Database(_) | Self::Internal(_) => "internal",
            Self::Transition(_) => "invalid_transition",
            Self::InvalidRate(_) => "invalid_shipping_rate",
            Self::InvalidWindow(_) => "invalid_date_range",
            Self::BadRequest(_) => "bad_request",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Log server errors with Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Admin request error"
            );
        }

        // Don't expose internal error details to clients
        let message = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (
            status,
            Json(ErrorBody {
                error: message,
                code: self.code(),
            }),
        )
            .into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
