//! Cart and wishlist state machine.
//!
//! [`Cart`] holds the shopper's line items and wishlist. Every successful
//! mutation returns the [`CartChange`] that must be mirrored to remote
//! storage for signed-in shoppers; a rejected mutation leaves the cart
//! untouched. The cart itself never performs I/O.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;

/// Catalog data captured when a product is added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub product_id: ProductId,
    pub title: String,
    /// Unit price in USD.
    pub unit_price: Decimal,
    pub images: Vec<String>,
    /// Units in stock at the time of the snapshot.
    pub stock: u32,
}

/// A line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub title: String,
    pub unit_price: Decimal,
    pub images: Vec<String>,
    /// Always between 1 and `stock`.
    pub quantity: u32,
    /// Stock ceiling recorded when the item first entered the cart.
    pub stock: u32,
}

impl CartItem {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// A mutation to replay against remote storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CartChange {
    Upsert { item: CartItem },
    Remove { product_id: ProductId },
    Clear,
    WishlistAdd { product_id: ProductId },
    WishlistRemove { product_id: ProductId },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    #[error("only {available} of this item in stock (requested {requested})")]
    OutOfStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },
    #[error("quantity must be at least 1")]
    ZeroQuantity,
    #[error("product {0} is not in the cart")]
    NotInCart(ProductId),
    #[error("product {0} is not in the wishlist")]
    NotInWishlist(ProductId),
}

/// Result of reconciling a local cart into the remote copy at sign-in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Local-only entries that must be written to remote storage.
    pub uploads: Vec<CartChange>,
    /// Local lines dropped because the remote copy already had the product.
    pub superseded: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<CartItem>,
    wishlist: Vec<ProductId>,
}

impl Cart {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            items: Vec::new(),
            wishlist: Vec::new(),
        }
    }

    /// Rebuild from stored parts, dropping lines that violate the quantity
    /// bounds and duplicate wishlist ids.
    #[must_use]
    pub fn from_parts(items: Vec<CartItem>, wishlist: Vec<ProductId>) -> Self {
        let mut cart = Self::new();
        for mut item in items {
            if item.quantity == 0 || cart.position(item.product_id).is_some() {
                continue;
            }
            item.quantity = item.quantity.min(item.stock.max(1));
            cart.items.push(item);
        }
        for id in wishlist {
            if !cart.wishlist.contains(&id) {
                cart.wishlist.push(id);
            }
        }
        cart
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub fn wishlist(&self) -> &[ProductId] {
        &self.wishlist
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// `(unit_price, quantity)` pairs for order totals.
    pub fn lines(&self) -> impl Iterator<Item = (Decimal, u32)> + '_ {
        self.items.iter().map(|i| (i.unit_price, i.quantity))
    }

    #[must_use]
    pub fn get(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    fn position(&self, product_id: ProductId) -> Option<usize> {
        self.items.iter().position(|i| i.product_id == product_id)
    }

    /// Insert a product or increment its quantity.
    ///
    /// # Errors
    ///
    /// [`CartError::OutOfStock`] if the resulting quantity would exceed the
    /// recorded stock ceiling; [`CartError::ZeroQuantity`] for `qty == 0`.
    pub fn add_to_cart(
        &mut self,
        product: &ProductSnapshot,
        qty: u32,
    ) -> Result<CartChange, CartError> {
        if qty == 0 {
            return Err(CartError::ZeroQuantity);
        }

        if let Some(item) = self
            .items
            .iter_mut()
            .find(|i| i.product_id == product.product_id)
        {
            let requested = item.quantity.saturating_add(qty);
            if requested > item.stock {
                return Err(CartError::OutOfStock {
                    product_id: item.product_id,
                    requested,
                    available: item.stock,
                });
            }
            item.quantity = requested;
            return Ok(CartChange::Upsert { item: item.clone() });
        }

        if qty > product.stock {
            return Err(CartError::OutOfStock {
                product_id: product.product_id,
                requested: qty,
                available: product.stock,
            });
        }
        let item = CartItem {
            product_id: product.product_id,
            title: product.title.clone(),
            unit_price: product.unit_price,
            images: product.images.clone(),
            quantity: qty,
            stock: product.stock,
        };
        self.items.push(item.clone());
        Ok(CartChange::Upsert { item })
    }

    /// Add one unit of an item already in the cart.
    ///
    /// # Errors
    ///
    /// Fails if the item is absent or already at its stock ceiling.
    pub fn increase_quantity(&mut self, product_id: ProductId) -> Result<CartChange, CartError> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.product_id == product_id)
            .ok_or(CartError::NotInCart(product_id))?;
        if item.quantity >= item.stock {
            return Err(CartError::OutOfStock {
                product_id,
                requested: item.quantity.saturating_add(1),
                available: item.stock,
            });
        }
        item.quantity += 1;
        Ok(CartChange::Upsert { item: item.clone() })
    }

    /// Remove one unit; the line disappears when it reaches zero.
    ///
    /// # Errors
    ///
    /// Fails if the item is absent.
    pub fn decrease_quantity(&mut self, product_id: ProductId) -> Result<CartChange, CartError> {
        let idx = self
            .position(product_id)
            .ok_or(CartError::NotInCart(product_id))?;
        let Some(item) = self.items.get_mut(idx) else {
            return Err(CartError::NotInCart(product_id));
        };
        if item.quantity <= 1 {
            self.items.remove(idx);
            return Ok(CartChange::Remove { product_id });
        }
        item.quantity -= 1;
        Ok(CartChange::Upsert { item: item.clone() })
    }

    /// # Errors
    ///
    /// Fails if the item is absent.
    pub fn remove_from_cart(&mut self, product_id: ProductId) -> Result<CartChange, CartError> {
        let idx = self
            .position(product_id)
            .ok_or(CartError::NotInCart(product_id))?;
        self.items.remove(idx);
        Ok(CartChange::Remove { product_id })
    }

    /// Empty the cart. The wishlist is kept.
    pub fn clear_cart(&mut self) -> CartChange {
        self.items.clear();
        CartChange::Clear
    }

    /// Returns `None` if the product was already wishlisted.
    pub fn add_to_wishlist(&mut self, product_id: ProductId) -> Option<CartChange> {
        if self.wishlist.contains(&product_id) {
            return None;
        }
        self.wishlist.push(product_id);
        Some(CartChange::WishlistAdd { product_id })
    }

    /// # Errors
    ///
    /// Fails if the product is not wishlisted.
    pub fn remove_from_wishlist(
        &mut self,
        product_id: ProductId,
    ) -> Result<CartChange, CartError> {
        let before = self.wishlist.len();
        self.wishlist.retain(|id| *id != product_id);
        if self.wishlist.len() == before {
            return Err(CartError::NotInWishlist(product_id));
        }
        Ok(CartChange::WishlistRemove { product_id })
    }

    /// Move a wishlisted product into the cart with quantity 1.
    ///
    /// Either both halves apply or neither does.
    ///
    /// # Errors
    ///
    /// Fails if the product is not wishlisted or cannot be added.
    pub fn move_to_cart(
        &mut self,
        product: &ProductSnapshot,
    ) -> Result<Vec<CartChange>, CartError> {
        if !self.wishlist.contains(&product.product_id) {
            return Err(CartError::NotInWishlist(product.product_id));
        }
        let added = self.add_to_cart(product, 1)?;
        let removed = self.remove_from_wishlist(product.product_id)?;
        Ok(vec![added, removed])
    }

    /// Reconcile this (local) cart with the remote copy loaded at sign-in.
    ///
    /// Remote lines supersede local lines for the same product. Local-only
    /// lines and wishlist ids are kept and reported for upload.
    pub fn merge_remote(&mut self, remote: Self) -> MergeOutcome {
        let local = std::mem::replace(self, remote);
        let mut outcome = MergeOutcome::default();

        for item in local.items {
            if self.position(item.product_id).is_some() {
                outcome.superseded += 1;
                continue;
            }
            outcome.uploads.push(CartChange::Upsert { item: item.clone() });
            self.items.push(item);
        }
        for product_id in local.wishlist {
            if let Some(change) = self.add_to_wishlist(product_id) {
                outcome.uploads.push(change);
            }
        }
        outcome
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(id: i32, price: i64, stock: u32) -> ProductSnapshot {
        ProductSnapshot {
            product_id: ProductId::new(id),
            title: format!("Product {id}"),
            unit_price: Decimal::from(price),
            images: vec![format!("/img/{id}.jpg")],
            stock,
        }
    }

    #[test]
    fn test_add_then_increment() {
        let mut cart = Cart::new();
        cart.add_to_cart(&product(1, 10, 5), 2).unwrap();
        let change = cart.add_to_cart(&product(1, 10, 5), 1).unwrap();
        assert!(matches!(change, CartChange::Upsert { ref item } if item.quantity == 3));
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.subtotal(), Decimal::from(30));
    }

    #[test]
    fn test_add_over_stock_leaves_cart_unchanged() {
        let mut cart = Cart::new();
        cart.add_to_cart(&product(1, 10, 3), 2).unwrap();
        let snapshot = cart.clone();
        let err = cart.add_to_cart(&product(1, 10, 3), 2).unwrap_err();
        assert_eq!(
            err,
            CartError::OutOfStock {
                product_id: ProductId::new(1),
                requested: 4,
                available: 3
            }
        );
        assert_eq!(cart, snapshot);

        assert!(cart.add_to_cart(&product(2, 10, 1), 2).is_err());
        assert_eq!(cart, snapshot);
    }

    #[test]
    fn test_ceiling_is_recorded_at_add_time() {
        let mut cart = Cart::new();
        cart.add_to_cart(&product(1, 10, 2), 1).unwrap();
        // Catalog now claims more stock, but the recorded ceiling stands
        assert!(cart.add_to_cart(&product(1, 10, 50), 2).is_err());
    }

    #[test]
    fn test_increase_stops_at_ceiling() {
        let mut cart = Cart::new();
        cart.add_to_cart(&product(1, 10, 2), 1).unwrap();
        cart.increase_quantity(ProductId::new(1)).unwrap();
        assert!(matches!(
            cart.increase_quantity(ProductId::new(1)),
            Err(CartError::OutOfStock { .. })
        ));
        assert_eq!(cart.get(ProductId::new(1)).unwrap().quantity, 2);
    }

    #[test]
    fn test_decrease_from_one_removes() {
        let mut cart = Cart::new();
        cart.add_to_cart(&product(1, 10, 5), 1).unwrap();
        let change = cart.decrease_quantity(ProductId::new(1)).unwrap();
        assert_eq!(
            change,
            CartChange::Remove {
                product_id: ProductId::new(1)
            }
        );
        assert!(cart.is_empty());
    }

    #[test]
    fn test_increase_decrease_sequences_never_exceed_bounds() {
        // Walk every up/down sequence of length 8 from quantity 1
        for mask in 0u32..256 {
            let mut cart = Cart::new();
            cart.add_to_cart(&product(1, 10, 4), 1).unwrap();
            for step in 0..8 {
                if cart.is_empty() {
                    break;
                }
                let id = ProductId::new(1);
                if mask & (1 << step) == 0 {
                    let _ = cart.increase_quantity(id);
                } else {
                    cart.decrease_quantity(id).unwrap();
                }
                if let Some(item) = cart.get(id) {
                    assert!(item.quantity >= 1 && item.quantity <= 4);
                }
            }
        }
    }

    #[test]
    fn test_clear_keeps_wishlist() {
        let mut cart = Cart::new();
        cart.add_to_cart(&product(1, 10, 5), 1).unwrap();
        cart.add_to_wishlist(ProductId::new(2));
        assert_eq!(cart.clear_cart(), CartChange::Clear);
        assert!(cart.is_empty());
        assert_eq!(cart.wishlist(), &[ProductId::new(2)]);
    }

    #[test]
    fn test_wishlist_add_is_idempotent() {
        let mut cart = Cart::new();
        assert!(cart.add_to_wishlist(ProductId::new(2)).is_some());
        assert!(cart.add_to_wishlist(ProductId::new(2)).is_none());
        assert!(cart.remove_from_wishlist(ProductId::new(3)).is_err());
    }

    #[test]
    fn test_move_to_cart_is_all_or_nothing() {
        let mut cart = Cart::new();
        cart.add_to_wishlist(ProductId::new(1));
        let changes = cart.move_to_cart(&product(1, 10, 3)).unwrap();
        assert_eq!(changes.len(), 2);
        assert!(cart.wishlist().is_empty());
        assert_eq!(cart.get(ProductId::new(1)).unwrap().quantity, 1);

        let mut cart = Cart::new();
        cart.add_to_wishlist(ProductId::new(9));
        assert!(cart.move_to_cart(&product(9, 10, 0)).is_err());
        assert_eq!(cart.wishlist(), &[ProductId::new(9)]);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_merge_remote_wins_on_conflict() {
        let mut local = Cart::new();
        local.add_to_cart(&product(1, 10, 5), 4).unwrap();
        local.add_to_cart(&product(2, 7, 5), 1).unwrap();
        local.add_to_wishlist(ProductId::new(8));

        let mut remote = Cart::new();
        remote.add_to_cart(&product(1, 10, 5), 1).unwrap();
        remote.add_to_wishlist(ProductId::new(9));

        let outcome = local.merge_remote(remote);
        assert_eq!(local.get(ProductId::new(1)).unwrap().quantity, 1);
        assert_eq!(local.get(ProductId::new(2)).unwrap().quantity, 1);
        assert_eq!(local.wishlist(), &[ProductId::new(9), ProductId::new(8)]);
        assert_eq!(outcome.superseded, 1);
        assert_eq!(outcome.uploads.len(), 2);
    }

    #[test]
    fn test_from_parts_sanitizes() {
        let item = CartItem {
            product_id: ProductId::new(1),
            title: "x".into(),
            unit_price: Decimal::ONE,
            images: vec![],
            quantity: 9,
            stock: 3,
        };
        let zero = CartItem {
            product_id: ProductId::new(2),
            quantity: 0,
            ..item.clone()
        };
        let cart = Cart::from_parts(
            vec![item.clone(), item, zero],
            vec![ProductId::new(5), ProductId::new(5)],
        );
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 3);
        assert_eq!(cart.wishlist().len(), 1);
    }
}
