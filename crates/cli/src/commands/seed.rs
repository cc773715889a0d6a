//! Seed the shipping settings table from a YAML file.
//!
//! # File format
//!
//! ```yaml
//! rates:
//!   - country_code: UA
//!     country_name: Ukraine
//!     standard_price: "0"       # free
//!     express_price: "4.50"
//!   - country_code: DE
//!     country_name: Germany
//!     standard_price: "12"      # express omitted: not offered
//!   - country_code: ROW
//!     country_name: Rest of world
//!     standard_price: "15"
//!     express_price: "30"
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, warn};

use kramnytsia_admin::db::{self, RepositoryError, ShippingRateRepository};
use kramnytsia_core::{ShippingRate, ShippingRateError};

use super::{MissingEnvVar, database_url};

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error(transparent)]
    MissingEnvVar(#[from] MissingEnvVar),

    #[error("Cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Row {row}: {source}")]
    InvalidRow {
        row: usize,
        source: ShippingRateError,
    },

    #[error("Row {row}: invalid {field} '{value}'")]
    InvalidPrice {
        row: usize,
        field: &'static str,
        value: String,
    },

    #[error("Duplicate country code {0}")]
    Duplicate(String),

    #[error("File contains no rates")]
    Empty,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Deserialize)]
struct SeedFile {
    rates: Vec<SeedRow>,
}

/// Prices are strings so no value passes through a float.
#[derive(Debug, Deserialize)]
struct SeedRow {
    country_code: String,
    country_name: String,
    #[serde(default)]
    standard_price: Option<String>,
    #[serde(default)]
    express_price: Option<String>,
}

fn parse_price(
    row: usize,
    field: &'static str,
    raw: Option<String>,
) -> Result<Option<Decimal>, SeedError> {
    raw.map(|value| {
        Decimal::from_str(value.trim()).map_err(|_| SeedError::InvalidPrice { row, field, value })
    })
    .transpose()
}

/// Parse and validate a seed file's contents.
fn parse_rates(content: &str) -> Result<Vec<ShippingRate>, SeedError> {
    let file: SeedFile = serde_yaml::from_str(content)?;
    if file.rates.is_empty() {
        return Err(SeedError::Empty);
    }

    let mut seen = HashSet::new();
    let mut rates = Vec::with_capacity(file.rates.len());
    for (index, raw) in file.rates.into_iter().enumerate() {
        let row = index + 1;
        let rate = ShippingRate {
            country_code: raw.country_code,
            country_name: raw.country_name,
            standard_price: parse_price(row, "standard_price", raw.standard_price)?,
            express_price: parse_price(row, "express_price", raw.express_price)?,
        }
        .normalized()
        .map_err(|source| SeedError::InvalidRow { row, source })?;

        if !seen.insert(rate.country_code.clone()) {
            return Err(SeedError::Duplicate(rate.country_code));
        }
        rates.push(rate);
    }
    Ok(rates)
}

/// Upsert shipping rates from a YAML file.
///
/// With `replace`, rows for countries missing from the file are deleted.
///
/// # Errors
///
/// Returns an error if the file is unreadable or invalid, or a database
/// operation fails. Nothing is written when validation fails.
pub async fn shipping_rates(file_path: &str, replace: bool) -> Result<(), SeedError> {
    let database_url = database_url("STOREFRONT_DATABASE_URL")?;

    let path = Path::new(file_path);
    info!(path = %file_path, "Loading shipping rates");
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SeedError::Read {
            path: file_path.to_string(),
            source,
        })?;

    let rates = parse_rates(&content)?;
    info!(rows = rates.len(), "Shipping rates validated");
    if !rates.iter().any(ShippingRate::is_rest_of_world) {
        warn!("No ROW row: countries without their own row will not be able to check out");
    }

    let pool = db::create_pool(&database_url).await?;
    let repo = ShippingRateRepository::new(&pool);

    for rate in &rates {
        repo.upsert(rate).await?;
        info!(country_code = %rate.country_code, "Upserted");
    }

    if replace {
        let keep: Vec<String> = rates.iter().map(|r| r.country_code.clone()).collect();
        let removed = repo.delete_except(&keep).await?;
        info!(removed, "Removed rows not present in the file");
    }

    info!("Seeding complete!");
    Ok(())
}
