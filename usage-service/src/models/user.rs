use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::usage::UsageLedger;

/// The one account allowed to see every user's readings.
pub const ADMIN_USERNAME: &str = "admin";

/// A registrant and their usage ledger, stored as one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub password_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(flatten)]
    pub ledger: UsageLedger,
}

impl User {
    /// A regular user with a fresh API key and a zero entry for `today`.
    pub fn new(username: String, password_hash: String, today: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            username,
            password_hash,
            api_key: Some(generate_api_key()),
            is_admin: false,
            ledger: UsageLedger::opened(today),
        }
    }

    /// The admin account. Admins never get an API key.
    pub fn new_admin(password_hash: String, today: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            username: ADMIN_USERNAME.to_string(),
            password_hash,
            api_key: None,
            is_admin: true,
            ledger: UsageLedger::opened(today),
        }
    }
}

pub fn generate_api_key() -> String {
    Uuid::new_v4().to_string()
}
