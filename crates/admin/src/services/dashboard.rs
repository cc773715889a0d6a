//! Dashboard aggregation.
//!
//! Metrics are computed in memory from the orders created inside a date
//! window, so the arithmetic can be tested without a database.

use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use kramnytsia_core::OrderStatus;

use crate::models::OrderSummary;

/// Days covered when the caller gives no `from` date.
pub const DEFAULT_WINDOW_DAYS: u64 = 30;

/// Orders shown in the "recent" panel.
pub const RECENT_ORDER_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error("'from' ({from}) is after 'to' ({to})")]
    Reversed { from: NaiveDate, to: NaiveDate },
    #[error("date out of range")]
    OutOfRange,
}

/// Half-open UTC interval `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateWindow {
    /// Build a window from inclusive calendar days.
    ///
    /// A missing `to` means `today`; a missing `from` means the
    /// [`DEFAULT_WINDOW_DAYS`] days ending at `to`.
    ///
    /// # Errors
    ///
    /// Returns `WindowError::Reversed` when `from` is after `to`.
    pub fn from_days(
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Self, WindowError> {
        let to = to.unwrap_or(today);
        let from = match from {
            Some(from) => from,
            None => to
                .checked_sub_days(Days::new(DEFAULT_WINDOW_DAYS - 1))
                .ok_or(WindowError::OutOfRange)?,
        };
        if from > to {
            return Err(WindowError::Reversed { from, to });
        }
        let end = to
            .checked_add_days(Days::new(1))
            .ok_or(WindowError::OutOfRange)?;

        Ok(Self {
            from: from.and_time(chrono::NaiveTime::MIN).and_utc(),
            to: end.and_time(chrono::NaiveTime::MIN).and_utc(),
        })
    }

    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from <= at && at < self.to
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: u64,
}

/// Dashboard figures for one window.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardMetrics {
    pub window: DateWindow,
    /// Sum of totals of orders that were paid for and not cancelled.
    pub revenue: Decimal,
    /// Every order in the window, whatever its status.
    pub order_count: u64,
    pub paid_order_count: u64,
    /// `revenue / paid_order_count`, zero when nothing was paid.
    pub average_order_value: Decimal,
    pub status_counts: Vec<StatusCount>,
    pub recent_orders: Vec<OrderSummary>,
}

impl DashboardMetrics {
    /// Aggregate the orders that fall inside `window`.
    #[must_use]
    pub fn compute(window: DateWindow, orders: Vec<OrderSummary>) -> Self {
        let mut orders: Vec<OrderSummary> = orders
            .into_iter()
            .filter(|o| window.contains(o.created_at))
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut revenue = Decimal::ZERO;
        let mut paid_order_count = 0u64;
        for order in orders.iter().filter(|o| o.status.is_settled()) {
            revenue += order.total_amount;
            paid_order_count += 1;
        }

        let average_order_value = if paid_order_count == 0 {
            Decimal::ZERO
        } else {
            (revenue / Decimal::from(paid_order_count)).round_dp(2)
        };

        let status_counts = OrderStatus::ALL
            .into_iter()
            .map(|status| StatusCount {
                status,
                count: orders.iter().filter(|o| o.status == status).count() as u64,
            })
            .collect();

        let order_count = orders.len() as u64;
        orders.truncate(RECENT_ORDER_LIMIT);

        Self {
            window,
            revenue,
            order_count,
            paid_order_count,
            average_order_value,
            status_counts,
            recent_orders: orders,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use kramnytsia_core::{OrderId, PaymentMethod, ShippingTier};

    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn order(n: u32, status: OrderStatus, total: i64, hour_of_march_10: u32) -> OrderSummary {
        OrderSummary {
            id: OrderId::from_parts(1_770_000_000_000 + i64::from(n), "abcdef"),
            customer_email: format!("buyer{n}@example.ua"),
            status,
            payment_method: PaymentMethod::Fondy,
            total_amount: Decimal::from(total),
            shipping_tier: ShippingTier::Standard,
            tracking_number: None,
            created_at: Utc.with_ymd_and_hms(2026, 3, 10, hour_of_march_10, 0, 0).unwrap(),
            item_count: 1,
        }
    }

    #[test]
    fn test_window_defaults_to_last_thirty_days() {
        let window = DateWindow::from_days(None, None, day(31)).unwrap();
        assert_eq!(window.from, Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap());
        assert_eq!(window.to, Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_window_includes_whole_to_day() {
        let window = DateWindow::from_days(Some(day(10)), Some(day(10)), day(31)).unwrap();
        assert!(window.contains(Utc.with_ymd_and_hms(2026, 3, 10, 23, 59, 59).unwrap()));
        assert!(!window.contains(Utc.with_ymd_and_hms(2026, 3, 11, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_window_rejects_reversed_dates() {
        assert_eq!(
            DateWindow::from_days(Some(day(12)), Some(day(10)), day(31)),
            Err(WindowError::Reversed {
                from: day(12),
                to: day(10)
            })
        );
    }

    #[test]
    fn test_revenue_counts_settled_orders_only() {
        let window = DateWindow::from_days(Some(day(1)), Some(day(31)), day(31)).unwrap();
        let metrics = DashboardMetrics::compute(
            window,
            vec![
                order(1, OrderStatus::Success, 100, 1),
                order(2, OrderStatus::Paid, 50, 2),
                order(3, OrderStatus::Shipped, 25, 3),
                order(4, OrderStatus::Completed, 25, 4),
                order(5, OrderStatus::Pending, 999, 5),
                order(6, OrderStatus::Failure, 999, 6),
                order(7, OrderStatus::Cancelled, 999, 7),
            ],
        );

        assert_eq!(metrics.revenue, Decimal::from(200));
        assert_eq!(metrics.order_count, 7);
        assert_eq!(metrics.paid_order_count, 4);
        assert_eq!(metrics.average_order_value, Decimal::from(50));
        assert!(metrics.status_counts.iter().all(|c| c.count == 1));
    }

    #[test]
    fn test_average_is_zero_without_paid_orders() {
        let window = DateWindow::from_days(Some(day(1)), Some(day(31)), day(31)).unwrap();
        let metrics =
            DashboardMetrics::compute(window, vec![order(1, OrderStatus::Pending, 10, 1)]);
        assert_eq!(metrics.revenue, Decimal::ZERO);
        assert_eq!(metrics.average_order_value, Decimal::ZERO);
        assert_eq!(metrics.order_count, 1);
    }

    #[test]
    fn test_recent_orders_newest_first_and_capped() {
        let window = DateWindow::from_days(Some(day(1)), Some(day(31)), day(31)).unwrap();
        let orders = (1..=7)
            .map(|n| order(n, OrderStatus::Paid, 10, n))
            .collect();
        let metrics = DashboardMetrics::compute(window, orders);

        assert_eq!(metrics.recent_orders.len(), RECENT_ORDER_LIMIT);
        assert_eq!(metrics.recent_orders[0].customer_email, "buyer7@example.ua");
        assert_eq!(metrics.order_count, 7);
    }

    #[test]
    fn test_orders_outside_window_ignored() {
        let window = DateWindow::from_days(Some(day(11)), Some(day(20)), day(31)).unwrap();
        let metrics = DashboardMetrics::compute(window, vec![order(1, OrderStatus::Paid, 10, 1)]);
        assert_eq!(metrics.order_count, 0);
        assert!(metrics.recent_orders.is_empty());
    }
}
