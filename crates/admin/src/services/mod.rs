//! Business logic services for the back office.

pub mod dashboard;

pub use dashboard::{DashboardMetrics, DateWindow, StatusCount, WindowError};
