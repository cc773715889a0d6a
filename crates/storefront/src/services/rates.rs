//! Exchange-rate table loaded once at startup.

use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::instrument;
use url::Url;

use kramnytsia_core::ExchangeRates;

/// Fetches the USD-based rate table.
pub struct ExchangeRateService;

impl ExchangeRateService {
    /// Fetch live rates, falling back to the built-in table on any failure.
    ///
    /// Expects a JSON body shaped like `{ "rates": { "EUR": 0.92, ... } }`.
    #[instrument]
    pub async fn fetch(url: Option<&Url>) -> ExchangeRates {
        let Some(url) = url else {
            tracing::info!("No exchange-rate source configured; using fallback rates");
            return ExchangeRates::fallback();
        };

        match fetch_live(url).await {
            Ok(rates) => {
                tracing::info!(eur = %rates.eur, uah = %rates.uah, "Loaded exchange rates");
                rates
            }
            Err(e) => {
                tracing::warn!(error = %e, "Exchange-rate fetch failed; using fallback rates");
                ExchangeRates::fallback()
            }
        }
    }
}

async fn fetch_live(url: &Url) -> Result<ExchangeRates, reqwest::Error> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;
    let body: serde_json::Value = client
        .get(url.clone())
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(parse_rates(&body))
}

/// Read the `rates` object, skipping entries that are not numbers.
fn parse_rates(body: &serde_json::Value) -> ExchangeRates {
    let entries: Vec<(&str, Decimal)> = body
        .get("rates")
        .and_then(serde_json::Value::as_object)
        .map(|table| {
            table
                .iter()
                .filter_map(|(code, value)| {
                    let serde_json::Value::Number(number) = value else {
                        return None;
                    };
                    let rate = Decimal::from_str(&number.to_string())
                        .or_else(|_| Decimal::from_scientific(&number.to_string()))
                        .ok()?;
                    Some((code.as_str(), rate))
                })
                .collect()
        })
        .unwrap_or_default();

    ExchangeRates::from_usd_table(entries)
}
