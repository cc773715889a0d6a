//! Order records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use kramnytsia_core::{
    Address, OrderId, OrderItemId, OrderStatus, PaymentMethod, ProductId, ShippingTier, UserId,
};

/// Order row written at checkout, before the payment call.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: OrderId,
    pub user_id: UserId,
    pub payment_method: PaymentMethod,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub total_amount: Decimal,
    pub shipping_tier: ShippingTier,
    /// Address as it was at checkout; later edits do not affect the order.
    pub shipping_address: Address,
}

/// Snapshot of one purchased product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub title: String,
    pub unit_price: Decimal,
    pub image: Option<String>,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub total_amount: Decimal,
    pub shipping_tier: ShippingTier,
    pub shipping_address: serde_json::Value,
    pub provider_order_id: Option<String>,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    pub created_at: DateTime<Utc>,
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

/// Row in the customer's order history.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    pub id: OrderId,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub item_count: i64,
}
