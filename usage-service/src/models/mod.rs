pub mod usage;
pub mod user;

pub use usage::{parse_reading, InvalidReading, LatestUsage, UsageEntry, UsageLedger, NOT_AVAILABLE};
pub use user::{User, ADMIN_USERNAME};
