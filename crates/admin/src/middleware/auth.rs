//! Bearer-token authentication for the back-office API.
//!
//! Every request must carry `Authorization: Bearer <ADMIN_API_TOKEN>`.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{HeaderMap, HeaderValue, StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use secrecy::ExposeSecret;

use crate::state::AppState;

/// Extractor that requires a valid admin token.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(_admin: RequireAdminAuth) -> impl IntoResponse {
///     "only operators see this"
/// }
/// ```
pub struct RequireAdminAuth;

/// Error returned when the token is missing or wrong.
#[derive(Debug, PartialEq, Eq)]
pub enum AdminAuthRejection {
    MissingToken,
    InvalidToken,
}

impl IntoResponse for AdminAuthRejection {
    fn into_response(self) -> Response {
        let message = match self {
            Self::MissingToken => "Missing bearer token",
            Self::InvalidToken => "Invalid bearer token",
        };
        let mut response = (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": message,
                "code": "unauthorized",
            })),
        )
            .into_response();
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        response
    }
}

impl FromRequestParts<AppState> for RequireAdminAuth {
    type Rejection = AdminAuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let presented = bearer_token(&parts.headers).ok_or(AdminAuthRejection::MissingToken)?;

        if !token_matches(state.config().api_token.expose_secret(), presented) {
            tracing::warn!(path = %parts.uri.path(), "Rejected admin request with invalid token");
            return Err(AdminAuthRejection::InvalidToken);
        }

        Ok(Self)
    }
}

/// Token from an `Authorization: Bearer` header, if present.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Constant-time comparison; length is not secret.
fn token_matches(expected: &str, presented: &str) -> bool {
    let (a, b) = (expected.as_bytes(), presented.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc123")), Some("abc123"));
        assert_eq!(bearer_token(&headers("bearer  abc123 ")), Some("abc123"));
        assert_eq!(bearer_token(&headers("Basic abc123")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_token_matches() {
        assert!(token_matches("k7R!q2Zp", "k7R!q2Zp"));
        assert!(!token_matches("k7R!q2Zp", "k7R!q2Zq"));
        assert!(!token_matches("k7R!q2Zp", "k7R!q2Z"));
    }

    #[test]
    fn test_rejection_is_unauthorized_with_challenge() {
        let response = AdminAuthRejection::InvalidToken.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }
}
