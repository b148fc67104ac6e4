use serde::{Deserialize, Serialize};

use crate::models::{LatestUsage, UsageEntry};

/// Query string of the ingestion endpoint. Both fields stay optional so a
/// missing one is reported as a missing parameter, not a parse failure.
#[derive(Debug, Default, Deserialize)]
pub struct IngestParams {
    pub apikey: Option<String>,
    pub new_usage: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub message: String,
    pub entry: UsageEntry,
}

#[derive(Debug, Deserialize)]
pub struct UserDashboardQuery {
    pub username: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserDashboardResponse {
    pub username: String,
    pub api_key: String,
    pub latest_usage: LatestUsage,
    pub usage_history: Vec<UsageEntry>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct AdminUserRow {
    pub username: String,
    pub api_key: String,
    pub latest_usage: u64,
}

#[derive(Debug, Serialize)]
pub struct AdminDashboardResponse {
    pub users: Vec<AdminUserRow>,
}
