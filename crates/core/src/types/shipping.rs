//! Shipping-cost resolution by destination country and tier.
//!
//! Rates come from a settings table keyed by ISO country code, with one
//! designated [`REST_OF_WORLD`] row used when a country has no row of its own.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::status::ShippingTier;

/// Country code of the fallback row.
pub const REST_OF_WORLD: &str = "ROW";

/// One row of the shipping settings table.
///
/// A `None` price means the tier is not offered for that destination.
/// A zero price means the tier is offered for free.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct ShippingRate {
    pub country_code: String,
    pub country_name: String,
    pub standard_price: Option<Decimal>,
    pub express_price: Option<Decimal>,
}

impl ShippingRate {
    #[must_use]
    pub const fn price_for(&self, tier: ShippingTier) -> Option<Decimal> {
        match tier {
            ShippingTier::Standard => self.standard_price,
            ShippingTier::Express => self.express_price,
        }
    }

    #[must_use]
    pub fn is_rest_of_world(&self) -> bool {
        self.country_code.eq_ignore_ascii_case(REST_OF_WORLD)
    }

    /// Check a row before it is written and upper-case its country code.
    ///
    /// # Errors
    ///
    /// Returns the first problem found: a code that is neither two ASCII
    /// letters nor [`REST_OF_WORLD`], an empty name, or a negative price.
    pub fn normalized(mut self) -> Result<Self, ShippingRateError> {
        self.country_code = normalize_country_code(&self.country_code)?;
        self.country_name = self.country_name.trim().to_owned();
        if self.country_name.is_empty() {
            return Err(ShippingRateError::MissingName(self.country_code));
        }
        for (tier, price) in [
            (ShippingTier::Standard, self.standard_price),
            (ShippingTier::Express, self.express_price),
        ] {
            if price.is_some_and(|p| p < Decimal::ZERO) {
                return Err(ShippingRateError::NegativePrice {
                    country_code: self.country_code,
                    tier,
                });
            }
        }
        Ok(self)
    }
}

/// Invalid shipping settings row.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShippingRateError {
    #[error("invalid country code '{0}': expected two letters or '{REST_OF_WORLD}'")]
    InvalidCountryCode(String),
    #[error("country name is required for '{0}'")]
    MissingName(String),
    #[error("{tier} price for '{country_code}' cannot be negative")]
    NegativePrice {
        country_code: String,
        tier: ShippingTier,
    },
}

/// Upper-cased ISO alpha-2 code, or [`REST_OF_WORLD`].
///
/// # Errors
///
/// Returns `InvalidCountryCode` for anything else.
pub fn normalize_country_code(raw: &str) -> Result<String, ShippingRateError> {
    let code = raw.trim().to_ascii_uppercase();
    if code == REST_OF_WORLD || (code.len() == 2 && code.bytes().all(|b| b.is_ascii_uppercase()))
    {
        Ok(code)
    } else {
        Err(ShippingRateError::InvalidCountryCode(raw.trim().to_owned()))
    }
}

/// Resolved shipping price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "amount", rename_all = "lowercase")]
pub enum ShippingQuote {
    Cost(Decimal),
    Free,
    Unavailable,
}

impl ShippingQuote {
    /// Amount to charge, or `None` when the tier cannot be shipped.
    #[must_use]
    pub const fn amount(self) -> Option<Decimal> {
        match self {
            Self::Cost(amount) => Some(amount),
            Self::Free => Some(Decimal::ZERO),
            Self::Unavailable => None,
        }
    }

    #[must_use]
    pub const fn is_available(self) -> bool {
        !matches!(self, Self::Unavailable)
    }
}

/// Find the row that applies to a destination.
///
/// Exact country match (case-insensitive) wins; otherwise the rest-of-world row.
#[must_use]
pub fn find_rate<'a>(rates: &'a [ShippingRate], country_code: &str) -> Option<&'a ShippingRate> {
    let code = country_code.trim();
    rates
        .iter()
        .find(|r| !r.is_rest_of_world() && r.country_code.eq_ignore_ascii_case(code))
        .or_else(|| rates.iter().find(|r| r.is_rest_of_world()))
}

/// Price a tier for a destination.
///
/// The tier is looked up on the matched row only. A country row that does not
/// offer Express does not fall through to the rest-of-world Express price.
#[must_use]
pub fn resolve_shipping(
    rates: &[ShippingRate],
    country_code: &str,
    tier: ShippingTier,
) -> ShippingQuote {
    match find_rate(rates, country_code).and_then(|row| row.price_for(tier)) {
        Some(price) if price.is_zero() => ShippingQuote::Free,
        Some(price) if price.is_sign_negative() => ShippingQuote::Unavailable,
        Some(price) => ShippingQuote::Cost(price),
        None => ShippingQuote::Unavailable,
    }
}

/// Notice surfaced to the shopper when their tier choice could not be honored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShippingWarning {
    /// Express is not offered for the destination; Standard was selected.
    ExpressUnavailable,
    /// No tier ships to the destination.
    ShippingUnavailable,
}

impl ShippingWarning {
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ExpressUnavailable => {
                "Express shipping is not available for this address; switched to Standard"
            }
            Self::ShippingUnavailable => "We do not ship to this address yet",
        }
    }
}

/// Tier actually used after applying the fallback policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingSelection {
    pub tier: ShippingTier,
    pub quote: ShippingQuote,
    pub warning: Option<ShippingWarning>,
}

/// Re-evaluate a tier choice against a (possibly new) destination.
///
/// An unavailable Express choice falls back to Standard with a warning. When
/// Standard is unavailable too, the selection is Standard/unavailable and
/// checkout must refuse it.
#[must_use]
pub fn select_tier(
    rates: &[ShippingRate],
    country_code: &str,
    requested: ShippingTier,
) -> ShippingSelection {
    let quote = resolve_shipping(rates, country_code, requested);
    if quote.is_available() {
        return ShippingSelection {
            tier: requested,
            quote,
            warning: None,
        };
    }

    let standard = resolve_shipping(rates, country_code, ShippingTier::Standard);
    let warning = if standard.is_available() {
        ShippingWarning::ExpressUnavailable
    } else {
        ShippingWarning::ShippingUnavailable
    };
    ShippingSelection {
        tier: ShippingTier::Standard,
        quote: standard,
        warning: Some(warning),
    }
}
