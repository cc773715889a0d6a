//! Shipping addresses and the single-default rule.

use serde::{Deserialize, Serialize};

use super::id::{AddressId, UserId};

/// A saved shipping destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub full_name: String,
    /// ISO 3166-1 alpha-2, upper case.
    pub country_code: String,
    pub country_name: String,
    pub state: Option<String>,
    pub city: String,
    pub line1: String,
    pub line2: Option<String>,
    pub postal_code: String,
    pub phone: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("address {0} not found")]
    NotFound(AddressId),
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("country code must be two letters")]
    InvalidCountryCode,
}

/// Fields a shopper submits when creating or editing an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressDraft {
    pub full_name: String,
    pub country_code: String,
    pub country_name: String,
    #[serde(default)]
    pub state: Option<String>,
    pub city: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub postal_code: String,
    pub phone: String,
}

impl AddressDraft {
    /// Trim fields, upper-case the country code, and check required values.
    ///
    /// # Errors
    ///
    /// Returns the first missing or malformed field.
    pub fn normalize(mut self) -> Result<Self, AddressError> {
        fn required(value: &mut String, name: &'static str) -> Result<(), AddressError> {
            *value = value.trim().to_owned();
            if value.is_empty() {
                return Err(AddressError::MissingField(name));
            }
            Ok(())
        }
        fn optional(value: &mut Option<String>) {
            *value = value
                .take()
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty());
        }

        required(&mut self.full_name, "full_name")?;
        required(&mut self.country_code, "country_code")?;
        required(&mut self.country_name, "country_name")?;
        required(&mut self.city, "city")?;
        required(&mut self.line1, "line1")?;
        required(&mut self.postal_code, "postal_code")?;
        required(&mut self.phone, "phone")?;
        optional(&mut self.state);
        optional(&mut self.line2);

        if self.country_code.len() != 2 || !self.country_code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(AddressError::InvalidCountryCode);
        }
        self.country_code = self.country_code.to_ascii_uppercase();
        Ok(self)
    }
}

/// Make `id` the only default address in `addresses`.
///
/// Returns the ids whose flag changed, so callers only write those rows.
///
/// # Errors
///
/// [`AddressError::NotFound`] if `id` is not in the set; nothing is modified.
pub fn apply_default(
    addresses: &mut [Address],
    id: AddressId,
) -> Result<Vec<AddressId>, AddressError> {
    if !addresses.iter().any(|a| a.id == id) {
        return Err(AddressError::NotFound(id));
    }
    let mut changed = Vec::new();
    for address in addresses.iter_mut() {
        let should_be_default = address.id == id;
        if address.is_default != should_be_default {
            address.is_default = should_be_default;
            changed.push(address.id);
        }
    }
    Ok(changed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn address(id: i32, is_default: bool) -> Address {
        Address {
            id: AddressId::new(id),
            user_id: UserId::new(1),
            full_name: "Olena K".into(),
            country_code: "UA".into(),
            country_name: "Ukraine".into(),
            state: None,
            city: "Lviv".into(),
            line1: "Rynok 1".into(),
            line2: None,
            postal_code: "79000".into(),
            phone: "+380000000000".into(),
            is_default,
        }
    }

    #[test]
    fn test_switching_default_leaves_exactly_one() {
        let mut set = vec![address(1, true), address(2, false), address(3, false)];
        let changed = apply_default(&mut set, AddressId::new(3)).unwrap();
        assert_eq!(changed, vec![AddressId::new(1), AddressId::new(3)]);
        assert_eq!(set.iter().filter(|a| a.is_default).count(), 1);
        assert!(set[2].is_default);
    }

    #[test]
    fn test_repairs_multiple_defaults() {
        let mut set = vec![address(1, true), address(2, true)];
        apply_default(&mut set, AddressId::new(2)).unwrap();
        assert_eq!(set.iter().filter(|a| a.is_default).count(), 1);
    }

    #[test]
    fn test_unknown_id_changes_nothing() {
        let mut set = vec![address(1, true)];
        assert_eq!(
            apply_default(&mut set, AddressId::new(9)),
            Err(AddressError::NotFound(AddressId::new(9)))
        );
        assert!(set[0].is_default);
    }

    #[test]
    fn test_draft_normalize() {
        let draft = AddressDraft {
            full_name: " Olena ".into(),
            country_code: "ua".into(),
            country_name: "Ukraine".into(),
            state: Some("  ".into()),
            city: "Lviv".into(),
            line1: "Rynok 1".into(),
            line2: None,
            postal_code: "79000".into(),
            phone: "+380".into(),
        };
        let clean = draft.clone().normalize().unwrap();
        assert_eq!(clean.country_code, "UA");
        assert_eq!(clean.full_name, "Olena");
        assert_eq!(clean.state, None);

        let bad = AddressDraft {
            country_code: "UKR".into(),
            ..draft.clone()
        };
        assert_eq!(bad.normalize(), Err(AddressError::InvalidCountryCode));

        let missing = AddressDraft {
            city: " ".into(),
            ..draft
        };
        assert_eq!(missing.normalize(), Err(AddressError::MissingField("city")));
    }
}
