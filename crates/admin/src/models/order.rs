//! Order views.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use kramnytsia_core::{OrderId, OrderItemId, OrderStatus, PaymentMethod, ProductId, ShippingTier};

/// One row of the order list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct OrderSummary {
    pub id: OrderId,
    pub customer_email: String,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub total_amount: Decimal,
    pub shipping_tier: ShippingTier,
    pub tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub item_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderPage {
    pub orders: Vec<OrderSummary>,
    pub total: i64,
}

/// Order detail, including what the payment provider returned.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_email: String,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub total_amount: Decimal,
    pub shipping_tier: ShippingTier,
    pub shipping_address: serde_json::Value,
    pub provider_order_id: Option<String>,
    pub payment_result: Option<serde_json::Value>,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub title: String,
    pub unit_price: Decimal,
    pub image: Option<String>,
    pub quantity: u32,
}
