//! Display currencies and USD-based price conversion.
//!
//! Catalog prices are stored in USD. The storefront converts them to the
//! visitor's display currency with a rate table fetched once at startup,
//! falling back to approximate hard-coded rates when the fetch fails.

use core::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Display currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Usd,
    Eur,
    Uah,
}

/// Unknown currency code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported currency: {0}")]
pub struct CurrencyError(pub String);

impl Currency {
    pub const ALL: [Self; 3] = [Self::Usd, Self::Eur, Self::Uah];

    /// ISO 4217 code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Uah => "UAH",
        }
    }

    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Usd => "$",
            Self::Eur => "€",
            Self::Uah => "₴",
        }
    }

    /// Round a converted amount for display.
    ///
    /// UAH snaps to the nearest 10 hryvnia. Every other currency is shown
    /// without fractional digits. Returns `None` if rounding up overflows.
    #[must_use]
    pub fn round_for_display(self, amount: Decimal) -> Option<Decimal> {
        match self {
            Self::Uah => {
                let ten = Decimal::TEN;
                (amount / ten)
                    .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                    .checked_mul(ten)
            }
            Self::Usd | Self::Eur => {
                Some(amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
            }
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Currency {
    type Err = CurrencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CurrencyError(s.to_owned()))
    }
}

/// Where the active rate table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateSource {
    Live,
    Fallback,
}

/// Units of each currency per 1 USD.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRates {
    pub usd: Decimal,
    pub eur: Decimal,
    pub uah: Decimal,
    pub source: RateSource,
}

impl ExchangeRates {
    /// Approximate rates used when the live table is unavailable.
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            usd: Decimal::ONE,
            eur: Decimal::new(92, 2),
            uah: Decimal::new(41, 0),
            source: RateSource::Fallback,
        }
    }

    /// Build a live table from `(code, rate)` pairs quoted against USD.
    ///
    /// Unknown codes and non-positive rates are ignored; currencies missing
    /// from the input keep their fallback rate. USD is always 1.
    pub fn from_usd_table<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Decimal)>,
    {
        let mut rates = Self {
            source: RateSource::Live,
            ..Self::fallback()
        };
        for (code, rate) in entries {
            if rate <= Decimal::ZERO {
                continue;
            }
            match code.parse::<Currency>() {
                Ok(Currency::Eur) => rates.eur = rate,
                Ok(Currency::Uah) => rates.uah = rate,
                Ok(Currency::Usd) | Err(_) => {}
            }
        }
        rates
    }

    #[must_use]
    pub const fn rate(&self, currency: Currency) -> Decimal {
        match currency {
            Currency::Usd => self.usd,
            Currency::Eur => self.eur,
            Currency::Uah => self.uah,
        }
    }

    /// Convert a USD amount and apply the currency's display rounding.
    ///
    /// Returns `None` when the result does not fit in a `Decimal`.
    #[must_use]
    pub fn convert(&self, usd: Decimal, currency: Currency) -> Option<Decimal> {
        usd.checked_mul(self.rate(currency))
            .and_then(|amount| currency.round_for_display(amount))
    }

    /// Convert and format in one step, e.g. `₴41,500`.
    #[must_use]
    pub fn display(&self, usd: Decimal, currency: Currency) -> Option<String> {
        self.convert(usd, currency)
            .map(|amount| format_display(amount, currency))
    }
}

/// Format an already-rounded amount with the currency symbol and
/// comma-grouped thousands.
#[must_use]
pub fn format_display(amount: Decimal, currency: Currency) -> String {
    let rounded = amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let digits = rounded.abs().trunc().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}{}{grouped}", currency.symbol())
}
