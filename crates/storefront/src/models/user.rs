//! Account domain type.

use chrono::{DateTime, Utc};
use serde::Serialize;

use kramnytsia_core::{Email, UserId};

/// A storefront account.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    /// Checkout is refused until this is set.
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}
