//! Order queries and manual edits.
//!
//! Edits are plain `UPDATE`s: no version check, the last write wins.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use kramnytsia_core::{OrderId, OrderItemId, OrderStatus, PaymentMethod, ProductId, ShippingTier};

use super::RepositoryError;
use crate::models::{Order, OrderItem, OrderPage, OrderSummary};

const SUMMARY_COLUMNS: &str = r"
    o.id, u.email AS customer_email, o.status, o.payment_method, o.total_amount,
    o.shipping_tier, o.tracking_number, o.created_at,
    (SELECT COALESCE(SUM(i.quantity), 0)::BIGINT FROM order_items i WHERE i.order_id = o.id)
        AS item_count
";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    customer_email: String,
    status: OrderStatus,
    payment_method: PaymentMethod,
    subtotal: Decimal,
    shipping_cost: Decimal,
    total_amount: Decimal,
    shipping_tier: ShippingTier,
    shipping_address: serde_json::Value,
    provider_order_id: Option<String>,
    payment_result: Option<serde_json::Value>,
    tracking_number: Option<String>,
    tracking_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
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

/// Order list filter and page window.
#[derive(Debug, Clone, Copy)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub limit: i64,
    pub offset: i64,
}

/// Repository for order records.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Newest-first page of orders, optionally restricted to one status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(&self, filter: OrderFilter) -> Result<OrderPage, RepositoryError> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM orders WHERE ($1::order_status IS NULL OR status = $1)",
        )
        .bind(filter.status)
        .fetch_one(self.pool)
        .await?;

        let sql = format!(
            r"
            SELECT {SUMMARY_COLUMNS}
            FROM orders o
            JOIN users u ON u.id = o.user_id
            WHERE ($1::order_status IS NULL OR o.status = $1)
            ORDER BY o.created_at DESC
            LIMIT $2 OFFSET $3
            "
        );
        let orders = sqlx::query_as::<_, OrderSummary>(&sql)
            .bind(filter.status)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(self.pool)
            .await?;

        Ok(OrderPage { orders, total })
    }

    /// Every order created in `[from, to)`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<OrderSummary>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {SUMMARY_COLUMNS}
            FROM orders o
            JOIN users u ON u.id = o.user_id
            WHERE o.created_at >= $1 AND o.created_at < $2
            ORDER BY o.created_at DESC
            "
        );
        Ok(sqlx::query_as::<_, OrderSummary>(&sql)
            .bind(from)
            .bind(to)
            .fetch_all(self.pool)
            .await?)
    }

    /// Full order with items and the raw payment payload.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails, or
    /// `RepositoryError::DataCorruption` for a negative stored quantity.
    pub async fn get(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT o.id, u.email AS customer_email, o.status, o.payment_method, o.subtotal,
                   o.shipping_cost, o.total_amount, o.shipping_tier, o.shipping_address,
                   o.provider_order_id, o.payment_result, o.tracking_number, o.tracking_url,
                   o.created_at, o.updated_at
            FROM orders o
            JOIN users u ON u.id = o.user_id
            WHERE o.id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
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
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(|r| {
            let quantity = u32::try_from(r.quantity).map_err(|_| {
                RepositoryError::DataCorruption(format!("negative quantity: {}", r.quantity))
            })?;
            Ok(OrderItem {
                id: r.id,
                product_id: r.product_id,
                title: r.title,
                unit_price: r.unit_price,
                image: r.image,
                quantity,
            })
        })
        .collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok(Some(Order {
            id: row.id,
            customer_email: row.customer_email,
            status: row.status,
            payment_method: row.payment_method,
            subtotal: row.subtotal,
            shipping_cost: row.shipping_cost,
            total_amount: row.total_amount,
            shipping_tier: row.shipping_tier,
            shipping_address: row.shipping_address,
            provider_order_id: row.provider_order_id,
            payment_result: row.payment_result,
            tracking_number: row.tracking_number,
            tracking_url: row.tracking_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
            items,
        }))
    }

    /// Current status of an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn status(&self, id: &OrderId) -> Result<Option<OrderStatus>, RepositoryError> {
        Ok(
            sqlx::query_scalar::<_, OrderStatus>("SELECT status FROM orders WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool)
                .await?,
        )
    }

    /// Overwrite an order's status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no order has this id.
    pub async fn set_status(&self, id: &OrderId, status: OrderStatus) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(status)
                .execute(self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Overwrite an order's tracking fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no order has this id.
    pub async fn set_tracking(
        &self,
        id: &OrderId,
        tracking_number: &str,
        tracking_url: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE orders
            SET tracking_number = $2, tracking_url = $3, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(tracking_number)
        .bind(tracking_url)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
