//! Session-related types.
//!
//! Anonymous and signed-in shoppers both keep their working cart in the
//! session; signed-in carts are additionally mirrored to `cart_items`.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use kramnytsia_core::{Cart, Email, UserId};

/// Session-stored user identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: Email,
}

/// Session keys.
pub mod keys {
    /// The logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// The shopper's local cart and wishlist.
    pub const CART: &str = "cart";
}

/// Read the session cart, or an empty cart for a fresh session.
///
/// # Errors
///
/// Returns an error if the session store cannot be read.
pub async fn load_cart(session: &Session) -> Result<Cart, tower_sessions::session::Error> {
    Ok(session.get::<Cart>(keys::CART).await?.unwrap_or_default())
}

/// Persist the session cart.
///
/// # Errors
///
/// Returns an error if the session store cannot be written.
pub async fn store_cart(session: &Session, cart: &Cart) -> Result<(), tower_sessions::session::Error> {
    session.insert(keys::CART, cart).await
}
