//! Status and selector enums shared by the storefront, admin, and CLI.

use serde::{Deserialize, Serialize};

/// Lifecycle state of an order.
///
/// ```text
/// pending ──► success | paid ──► shipped ──► completed
///    │
///    └──► failure
///
/// any non-cancelled state ──► cancelled
/// ```
///
/// `success`, `paid`, and `failure` are written only by payment confirmation.
/// `shipped`, `completed`, and `cancelled` are written only by administrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    /// Redirect-gateway callback reported `approved`.
    Success,
    /// Hosted-order capture completed.
    Paid,
    Failure,
    Shipped,
    Completed,
    Cancelled,
}

/// Rejected administrator status edit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusTransitionError {
    #[error("status '{0}' can only be set by payment confirmation")]
    PaymentDriven(OrderStatus),
    #[error("cannot move order from '{from}' to '{to}'")]
    NotAllowed { from: OrderStatus, to: OrderStatus },
}

impl OrderStatus {
    pub const ALL: [Self; 7] = [
        Self::Pending,
        Self::Success,
        Self::Paid,
        Self::Failure,
        Self::Shipped,
        Self::Completed,
        Self::Cancelled,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Paid => "paid",
            Self::Failure => "failure",
            Self::Shipped => "shipped",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// States reached only through a payment provider confirmation.
    #[must_use]
    pub const fn is_payment_driven(self) -> bool {
        matches!(self, Self::Success | Self::Paid | Self::Failure)
    }

    /// States reached only through a manual back-office edit.
    #[must_use]
    pub const fn is_admin_driven(self) -> bool {
        matches!(self, Self::Shipped | Self::Completed | Self::Cancelled)
    }

    /// Whether the order's total counts toward revenue.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(
            self,
            Self::Success | Self::Paid | Self::Shipped | Self::Completed
        )
    }

    /// Documented lifecycle edges.
    ///
    /// Payment reconciliation does not consult this: gateway updates are
    /// last-write-wins. It guards administrator edits.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Cancelled, _) => false,
            (_, Self::Cancelled) => true,
            (Self::Pending, Self::Success | Self::Paid | Self::Failure)
            | (Self::Success | Self::Paid, Self::Shipped)
            | (Self::Shipped, Self::Completed) => true,
            _ => false,
        }
    }

    /// Validate an administrator's status edit.
    ///
    /// # Errors
    ///
    /// Returns an error when `next` is payment-driven or not reachable from
    /// the current state.
    pub const fn admin_transition(self, next: Self) -> Result<Self, StatusTransitionError> {
        if !next.is_admin_driven() {
            return Err(StatusTransitionError::PaymentDriven(next));
        }
        if !self.can_transition_to(next) {
            return Err(StatusTransitionError::NotAllowed {
                from: self,
                to: next,
            });
        }
        Ok(next)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}

/// Payment backend chosen at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_method", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Redirect gateway with signed server callback.
    Fondy,
    /// Hosted order object with client-driven capture.
    Paypal,
}

impl PaymentMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fondy => "fondy",
            Self::Paypal => "paypal",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fondy" => Ok(Self::Fondy),
            "paypal" => Ok(Self::Paypal),
            _ => Err(format!("invalid payment method: {s}")),
        }
    }
}

/// Shipping service level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shipping_tier", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum ShippingTier {
    #[default]
    #[serde(alias = "Standard")]
    Standard,
    #[serde(alias = "Express")]
    Express,
}

impl std::fmt::Display for ShippingTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Express => write!(f, "express"),
        }
    }
}

/// Interface language passed to the redirect gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Uk,
}

impl Language {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Uk => "uk",
        }
    }
}
