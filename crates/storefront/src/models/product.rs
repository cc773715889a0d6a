//! Catalog product.

use rust_decimal::Decimal;
use serde::Serialize;

use kramnytsia_core::{ProductId, ProductSnapshot};

#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub description: String,
    /// Unit price in USD.
    pub price: Decimal,
    pub images: Vec<String>,
    pub stock: u32,
}

impl Product {
    /// Copy of the fields a cart line keeps.
    #[must_use]
    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            product_id: self.id,
            title: self.title.clone(),
            unit_price: self.price,
            images: self.images.clone(),
            stock: self.stock,
        }
    }
}
