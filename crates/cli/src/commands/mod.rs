//! CLI command implementations.

pub mod migrate;
pub mod seed;
pub mod user;

use secrecy::SecretString;

/// Database URL for `primary_key`, falling back to `DATABASE_URL`.
fn database_url(primary_key: &'static str) -> Result<SecretString, MissingEnvVar> {
    dotenvy::dotenv().ok();
    std::env::var(primary_key)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| MissingEnvVar(primary_key))
}

#[derive(Debug, thiserror::Error)]
#[error("Missing environment variable: {0} (or DATABASE_URL)")]
pub struct MissingEnvVar(pub &'static str);
