//! Order repository.
//!
//! Checkout writes the order row and its item snapshot as separate
//! statements, before the payment call and without a wrapping transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use kramnytsia_core::{
    OrderId, OrderItemId, OrderStatus, PaymentMethod, ProductId, ShippingTier, UserId,
};

use super::{RepositoryError, to_i32, to_u32};
use crate::models::{NewOrder, NewOrderItem, Order, OrderItem, OrderSummary};
use crate::services::orders::OrderStore;

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    status: OrderStatus,
    payment_method: PaymentMethod,
    subtotal: Decimal,
    shipping_cost: Decimal,
    total_amount: Decimal,
    shipping_tier: ShippingTier,
    shipping_address: serde_json::Value,
    provider_order_id: Option<String>,
    tracking_number: Option<String>,
    tracking_url: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    product_id: ProductId,
    title: String,
    unit_price: Decimal,
    image: Option<String>,
    quantity: i32,
}

#[derive(sqlx::FromRow)]
struct OrderSummaryRow {
    id: OrderId,
    status: OrderStatus,
    payment_method: PaymentMethod,
    total_amount: Decimal,
    created_at: DateTime<Utc>,
    item_count: i64,
}

/// Owns its pool handle so it can sit behind `Arc<dyn OrderStore>`.
#[derive(Clone)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<OrderSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderSummaryRow>(
            r"
            SELECT o.id, o.status, o.payment_method, o.total_amount, o.created_at,
                   COALESCE(SUM(i.quantity), 0)::BIGINT AS item_count
            FROM orders o
            LEFT JOIN order_items i ON i.order_id = o.id
            WHERE o.user_id = $1
            GROUP BY o.id
            ORDER BY o.created_at DESC
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| OrderSummary {
                id: r.id,
                status: r.status,
                payment_method: r.payment_method,
                total_amount: r.total_amount,
                created_at: r.created_at,
                item_count: r.item_count,
            })
            .collect())
    }

    /// One of the customer's orders with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_user(
        &self,
        user_id: UserId,
        id: &OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, user_id, status, payment_method, subtotal, shipping_cost, total_amount,
                   shipping_tier, shipping_address, provider_order_id, tracking_number,
                   tracking_url, created_at
            FROM orders
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT id, product_id, title, unit_price, image, quantity
            FROM order_items
            WHERE order_id = $1
            ORDER BY id
            ",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|r| {
            Ok(OrderItem {
                id: r.id,
                product_id: r.product_id,
                title: r.title,
                unit_price: r.unit_price,
                image: r.image,
                quantity: to_u32(r.quantity, "quantity")?,
            })
        })
        .collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok(Some(Order {
            id: row.id,
            user_id: row.user_id,
            status: row.status,
            payment_method: row.payment_method,
            subtotal: row.subtotal,
            shipping_cost: row.shipping_cost,
            total_amount: row.total_amount,
            shipping_tier: row.shipping_tier,
            shipping_address: row.shipping_address,
            provider_order_id: row.provider_order_id,
            tracking_number: row.tracking_number,
            tracking_url: row.tracking_url,
            created_at: row.created_at,
            items,
        }))
    }
}

#[async_trait]
impl OrderStore for OrderRepository {
    async fn insert_order(&self, order: &NewOrder) -> Result<(), RepositoryError> {
        let address = serde_json::to_value(&order.shipping_address).map_err(|e| {
            RepositoryError::DataCorruption(format!("unserializable address: {e}"))
        })?;

        sqlx::query(
            r"
            INSERT INTO orders
                (id, user_id, status, payment_method, subtotal, shipping_cost, total_amount,
                 shipping_tier, shipping_address)
            VALUES ($1, $2, 'pending', $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(&order.id)
        .bind(order.user_id)
        .bind(order.payment_method)
        .bind(order.subtotal)
        .bind(order.shipping_cost)
        .bind(order.total_amount)
        .bind(order.shipping_tier)
        .bind(address)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "order id"))?;
        Ok(())
    }

    async fn insert_items(
        &self,
        order_id: &OrderId,
        items: &[NewOrderItem],
    ) -> Result<(), RepositoryError> {
        for item in items {
            sqlx::query(
                r"
                INSERT INTO order_items (order_id, product_id, title, unit_price, image, quantity)
                VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(order_id)
            .bind(item.product_id)
            .bind(&item.title)
            .bind(item.unit_price)
            .bind(&item.image)
            .bind(to_i32(item.quantity, "quantity")?)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn set_provider_order_id(
        &self,
        order_id: &OrderId,
        provider_order_id: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE orders SET provider_order_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(order_id)
            .bind(provider_order_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn status(&self, order_id: &OrderId) -> Result<Option<OrderStatus>, RepositoryError> {
        Ok(
            sqlx::query_scalar::<_, OrderStatus>("SELECT status FROM orders WHERE id = $1")
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_by_provider_order_id(
        &self,
        provider_order_id: &str,
    ) -> Result<Option<OrderId>, RepositoryError> {
        Ok(sqlx::query_scalar::<_, OrderId>(
            "SELECT id FROM orders WHERE provider_order_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(provider_order_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn record_payment(
        &self,
        order_id: &OrderId,
        status: OrderStatus,
        payment_result: &serde_json::Value,
    ) -> Result<bool, RepositoryError> {
        // Unconditional: the last confirmation to arrive wins
        let result = sqlx::query(
            r"
            UPDATE orders
            SET status = $2, payment_result = $3, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(order_id)
        .bind(status)
        .bind(payment_result)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
