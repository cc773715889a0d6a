//! Storefront account management.
//!
//! # Usage
//!
//! ```bash
//! kr-cli user verify-email -e buyer@example.ua
//! ```

use secrecy::ExposeSecret;
use sqlx::PgPool;
use thiserror::Error;

use kramnytsia_core::{Email, EmailError};

use super::{MissingEnvVar, database_url};

#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    MissingEnvVar(#[from] MissingEnvVar),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("No user with email {0}")]
    NotFound(String),
}

/// Mark a user's email as verified so they can check out.
///
/// # Errors
///
/// Returns an error for a malformed email, an unknown user, or a database
/// failure.
pub async fn verify_email(email: &str) -> Result<(), UserError> {
    let email = Email::parse(email)?;
    let database_url = database_url("STOREFRONT_DATABASE_URL")?;

    tracing::info!("Connecting to database...");
    let pool = PgPool::connect(database_url.expose_secret()).await?;

    let result = sqlx::query(
        "UPDATE users SET email_verified = TRUE, updated_at = NOW() WHERE email = $1",
    )
    .bind(email.as_str())
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(UserError::NotFound(email.to_string()));
    }

    tracing::info!(%email, "Email marked as verified");
    Ok(())
}
