//! Remote copy of signed-in carts and wishlists.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;

use kramnytsia_core::{Cart, CartChange, CartItem, ProductId, UserId};

use super::{RepositoryError, to_i32, to_u32};
use crate::services::cart::CartRemote;

#[derive(sqlx::FromRow)]
struct CartItemRow {
    product_id: ProductId,
    title: String,
    unit_price: Decimal,
    images: Vec<String>,
    quantity: i32,
    stock: i32,
}

impl TryFrom<CartItemRow> for CartItem {
    type Error = RepositoryError;

    fn try_from(row: CartItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            product_id: row.product_id,
            title: row.title,
            unit_price: row.unit_price,
            images: row.images,
            quantity: to_u32(row.quantity, "quantity")?,
            stock: to_u32(row.stock, "stock")?,
        })
    }
}

/// Owns its pool handle so it can be used from background sync tasks.
#[derive(Clone)]
pub struct CartRepository {
    pool: PgPool,
}

impl CartRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn upsert_item<'e, E>(executor: E, user_id: UserId, item: &CartItem) -> Result<(), RepositoryError>
where
    E: sqlx::PgExecutor<'e>,
{
    // Last write wins on (user_id, product_id)
    sqlx::query(
        r"
        INSERT INTO cart_items (user_id, product_id, title, unit_price, images, quantity, stock)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (user_id, product_id) DO UPDATE
        SET title = EXCLUDED.title,
            unit_price = EXCLUDED.unit_price,
            images = EXCLUDED.images,
            quantity = EXCLUDED.quantity,
            stock = EXCLUDED.stock,
            updated_at = NOW()
        ",
    )
    .bind(user_id)
    .bind(item.product_id)
    .bind(&item.title)
    .bind(item.unit_price)
    .bind(&item.images)
    .bind(to_i32(item.quantity, "quantity")?)
    .bind(to_i32(item.stock, "stock")?)
    .execute(executor)
    .await?;
    Ok(())
}

async fn add_wishlist<'e, E>(executor: E, user_id: UserId, product_id: ProductId) -> Result<(), RepositoryError>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO wishlist_items (user_id, product_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(product_id)
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl CartRemote for CartRepository {
    async fn load(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        let items = sqlx::query_as::<_, CartItemRow>(
            r"
            SELECT product_id, title, unit_price, images, quantity, stock
            FROM cart_items
            WHERE user_id = $1
            ORDER BY updated_at, product_id
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(CartItem::try_from)
        .collect::<Result<Vec<_>, _>>()?;

        let wishlist = sqlx::query_scalar::<_, ProductId>(
            "SELECT product_id FROM wishlist_items WHERE user_id = $1 ORDER BY created_at, product_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Cart::from_parts(items, wishlist))
    }

    async fn apply(&self, user_id: UserId, change: &CartChange) -> Result<(), RepositoryError> {
        match change {
            CartChange::Upsert { item } => upsert_item(&self.pool, user_id, item).await?,
            CartChange::Remove { product_id } => {
                sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
                    .bind(user_id)
                    .bind(*product_id)
                    .execute(&self.pool)
                    .await?;
            }
            CartChange::Clear => {
                sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
                    .bind(user_id)
                    .execute(&self.pool)
                    .await?;
            }
            CartChange::WishlistAdd { product_id } => {
                add_wishlist(&self.pool, user_id, *product_id).await?;
            }
            CartChange::WishlistRemove { product_id } => {
                sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1 AND product_id = $2")
                    .bind(user_id)
                    .bind(*product_id)
                    .execute(&self.pool)
                    .await?;
            }
        }
        Ok(())
    }

    async fn replace(&self, user_id: UserId, cart: &Cart) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        for item in cart.items() {
            upsert_item(&mut *tx, user_id, item).await?;
        }
        for product_id in cart.wishlist() {
            add_wishlist(&mut *tx, user_id, *product_id).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
