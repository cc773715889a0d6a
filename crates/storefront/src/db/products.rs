//! Catalog repository.

use rust_decimal::Decimal;
use sqlx::PgPool;

use kramnytsia_core::ProductId;

use super::{RepositoryError, to_u32};
use crate::models::Product;

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    title: String,
    description: String,
    price: Decimal,
    images: Vec<String>,
    stock: i32,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            title: row.title,
            description: row.description,
            price: row.price,
            images: row.images,
            stock: to_u32(row.stock, "stock")?,
        })
    }
}

pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Active products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(&self, limit: i64, offset: i64) -> Result<Vec<Product>, RepositoryError> {
        sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, title, description, price, images, stock
            FROM products
            WHERE active
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            ",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(Product::try_from)
        .collect()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_active(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, title, description, price, images, stock
            FROM products
            WHERE id = $1 AND active
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .map(Product::try_from)
        .transpose()
    }
}
