//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL, used for gateway return and callback URLs
//! - `STOREFRONT_SESSION_SECRET` - Session secret (min 32 chars, high entropy)
//!
//! ## Payment gateways (each gateway is enabled only when its credentials are set)
//! - `FONDY_MERCHANT_ID` / `FONDY_SECRET_KEY` - Redirect gateway credentials
//! - `FONDY_API_BASE` - Gateway base URL (default: `https://pay.fondy.eu`)
//! - `PAYPAL_CLIENT_ID` / `PAYPAL_CLIENT_SECRET` - Hosted-order gateway credentials
//! - `PAYPAL_API_BASE` - API base URL (default: sandbox)
//! - `PAYPAL_BRAND_NAME` - Brand shown on the approval page (default: Kramnytsia)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `EXCHANGE_RATES_URL` - USD-based rate table, fetched once at startup
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

const DEFAULT_FONDY_API_BASE: &str = "https://pay.fondy.eu";
const DEFAULT_PAYPAL_API_BASE: &str = "https://api-m.sandbox.paypal.com";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    pub host: IpAddr,
    pub port: u16,
    /// Public base URL, without trailing slash
    pub base_url: Url,
    pub session_secret: SecretString,
    pub fondy: Option<FondyConfig>,
    pub paypal: Option<PaypalConfig>,
    /// Exchange-rate endpoint; fallback rates are used when unset
    pub exchange_rates_url: Option<Url>,
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
}

/// Redirect-gateway credentials.
#[derive(Clone)]
pub struct FondyConfig {
    pub merchant_id: String,
    pub secret_key: SecretString,
    pub api_base: Url,
}

impl std::fmt::Debug for FondyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FondyConfig")
            .field("merchant_id", &self.merchant_id)
            .field("secret_key", &"[REDACTED]")
            .field("api_base", &self.api_base.as_str())
            .finish()
    }
}

/// Hosted-order gateway credentials.
#[derive(Clone)]
pub struct PaypalConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub api_base: Url,
    pub brand_name: String,
}

impl std::fmt::Debug for PaypalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaypalConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("api_base", &self.api_base.as_str())
            .field("brand_name", &self.brand_name)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = get_env_or_default("STOREFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("STOREFRONT_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_PORT".to_string(), e.to_string())
            })?;
        let base_url = parse_url("STOREFRONT_BASE_URL", &get_required_env("STOREFRONT_BASE_URL")?)?;
        let session_secret = get_validated_secret("STOREFRONT_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "STOREFRONT_SESSION_SECRET")?;

        let exchange_rates_url = get_optional_env("EXCHANGE_RATES_URL")
            .map(|raw| parse_url("EXCHANGE_RATES_URL", &raw))
            .transpose()?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            fondy: FondyConfig::from_env()?,
            paypal: PaypalConfig::from_env()?,
            exchange_rates_url,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Absolute URL for a storefront path.
    #[must_use]
    pub fn absolute_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Session cookies are marked `Secure` only behind HTTPS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.scheme() == "https"
    }
}

impl FondyConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(merchant_id) = get_optional_env("FONDY_MERCHANT_ID") else {
            return Ok(None);
        };
        Ok(Some(Self {
            merchant_id,
            secret_key: get_required_secret("FONDY_SECRET_KEY")?,
            api_base: parse_url(
                "FONDY_API_BASE",
                &get_env_or_default("FONDY_API_BASE", DEFAULT_FONDY_API_BASE),
            )?,
        }))
    }
}

impl PaypalConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(client_id) = get_optional_env("PAYPAL_CLIENT_ID") else {
            return Ok(None);
        };
        Ok(Some(Self {
            client_id,
            client_secret: get_required_secret("PAYPAL_CLIENT_SECRET")?,
            api_base: parse_url(
                "PAYPAL_API_BASE",
                &get_env_or_default("PAYPAL_API_BASE", DEFAULT_PAYPAL_API_BASE),
            )?,
            brand_name: get_env_or_default("PAYPAL_BRAND_NAME", "Kramnytsia"),
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Gateway keys are issued by the provider (sandbox keys are short), so they
/// are not entropy-checked.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    if value.trim().is_empty() {
        return Err(ConfigError::MissingEnvVar(key.to_string()));
    }
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    std::env::var(primary_key)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| ConfigError::MissingEnvVar(primary_key.to_string()))
}

fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> StorefrontConfig {
        StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/kramnytsia"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: Url::parse("https://shop.example.ua/").unwrap(),
            session_secret: SecretString::from("x".repeat(32)),
            fondy: Some(FondyConfig {
                merchant_id: "1396424".to_string(),
                secret_key: SecretString::from("fondy_private_key"),
                api_base: Url::parse(DEFAULT_FONDY_API_BASE).unwrap(),
            }),
            paypal: Some(PaypalConfig {
                client_id: "paypal_client".to_string(),
                client_secret: SecretString::from("paypal_private_secret"),
                api_base: Url::parse(DEFAULT_PAYPAL_API_BASE).unwrap(),
                brand_name: "Kramnytsia".to_string(),
            }),
            exchange_rates_url: None,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    #[test]
    fn test_shannon_entropy_bounds() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("aB3$xY9!mK2@nL5#") > MIN_ENTROPY_BITS_PER_CHAR);
    }

    #[test]
    fn test_validate_secret_strength() {
        assert!(matches!(
            validate_secret_strength("changeme123", "T"),
            Err(ConfigError::InsecureSecret(_, _))
        ));
        assert!(validate_secret_strength(&"a".repeat(40), "T").is_err());
        assert!(validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "T").is_ok());
    }

    #[test]
    fn test_validate_session_secret_length() {
        assert!(validate_session_secret(&SecretString::from("short"), "T").is_err());
        assert!(validate_session_secret(&SecretString::from("a".repeat(32)), "T").is_ok());
    }

    #[test]
    fn test_parse_url_rejects_other_schemes() {
        assert!(parse_url("T", "ftp://example.ua").is_err());
        assert!(parse_url("T", "not a url").is_err());
        assert!(parse_url("T", "http://localhost:3000").is_ok());
    }

    #[test]
    fn test_absolute_url_joins_cleanly() {
        let config = config();
        assert_eq!(
            config.absolute_url("/api/payments/fondy/callback"),
            "https://shop.example.ua/api/payments/fondy/callback"
        );
        assert!(config.is_secure());
        assert_eq!(config.socket_addr().port(), 3000);
    }

    #[test]
    fn test_debug_redacts_gateway_secrets() {
        let debug_output = format!("{:?}", config());
        assert!(debug_output.contains("1396424"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("fondy_private_key"));
        assert!(!debug_output.contains("paypal_private_secret"));
    }
}
