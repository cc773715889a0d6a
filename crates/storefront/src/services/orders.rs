//! Order persistence seam used by checkout and payment reconciliation.

use async_trait::async_trait;

use kramnytsia_core::{OrderId, OrderStatus};

use crate::db::RepositoryError;
use crate::models::{NewOrder, NewOrderItem};

/// Writes that the payment pipeline performs against stored orders.
///
/// Implemented by [`crate::db::OrderRepository`]; tests substitute an
/// in-memory store.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert a new order in `pending` status.
    async fn insert_order(&self, order: &NewOrder) -> Result<(), RepositoryError>;

    /// Snapshot the purchased products under an existing order.
    async fn insert_items(
        &self,
        order_id: &OrderId,
        items: &[NewOrderItem],
    ) -> Result<(), RepositoryError>;

    /// Remember the provider-side identifier returned at payment creation.
    async fn set_provider_order_id(
        &self,
        order_id: &OrderId,
        provider_order_id: &str,
    ) -> Result<(), RepositoryError>;

    async fn status(&self, order_id: &OrderId) -> Result<Option<OrderStatus>, RepositoryError>;

    async fn find_by_provider_order_id(
        &self,
        provider_order_id: &str,
    ) -> Result<Option<OrderId>, RepositoryError>;

    /// Overwrite status and payment payload. Returns `false` if no such order.
    async fn record_payment(
        &self,
        order_id: &OrderId,
        status: OrderStatus,
        payment_result: &serde_json::Value,
    ) -> Result<bool, RepositoryError>;
}
