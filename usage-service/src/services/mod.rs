//! Services layer for usage-service.
//!
//! Business logic for accounts, usage ingestion, and the daily rollover,
//! plus the persistence seam they share.

pub mod account;
pub mod clock;
mod database;
pub mod error;
pub mod ingestion;
pub mod metrics;
pub mod rollover;
pub mod store;

pub use account::AccountService;
pub use clock::{Clock, ManualClock, SystemClock};
pub use database::MongoDb;
pub use error::ServiceError;
pub use ingestion::IngestionService;
pub use metrics::{get_metrics, init_metrics};
pub use rollover::{next_day_start, RolloverFailure, RolloverReport, RolloverScheduler};
pub use store::{InMemoryUserStore, UserStore};
