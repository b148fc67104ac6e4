//! HTTP handlers for usage-service.

pub mod account;
pub mod dashboard;
pub mod health;
pub mod metrics;
pub mod usage;

pub use account::{login, register};
pub use dashboard::{admin_dashboard, user_dashboard};
pub use health::health_check;
pub use usage::update_water_usage;
