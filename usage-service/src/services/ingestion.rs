use std::sync::Arc;

use super::metrics::INGEST_TOTAL;
use crate::{
    models::{parse_reading, UsageEntry},
    services::{Clock, ServiceError, UserStore},
};

/// Applies API-key-authenticated meter readings to a user's ledger.
///
/// Each call reads the document, updates a local copy, and writes the open
/// entries back. Two concurrent calls for the same key race and the later
/// write wins; no locking is attempted.
#[derive(Clone)]
pub struct IngestionService {
    store: Arc<dyn UserStore>,
    clock: Arc<dyn Clock>,
}

impl IngestionService {
    pub fn new(store: Arc<dyn UserStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn ingest(
        &self,
        api_key: Option<&str>,
        raw_usage: Option<&str>,
    ) -> Result<UsageEntry, ServiceError> {
        let result = self.apply(api_key, raw_usage).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(ServiceError::MissingParameter(_)) => "missing_parameter",
            Err(ServiceError::InvalidReading(_)) => "invalid_reading",
            Err(ServiceError::UserNotFound) => "user_not_found",
            Err(_) => "error",
        };
        metrics::counter!(INGEST_TOTAL, "outcome" => outcome).increment(1);

        result
    }

    async fn apply(
        &self,
        api_key: Option<&str>,
        raw_usage: Option<&str>,
    ) -> Result<UsageEntry, ServiceError> {
        let api_key = non_empty(api_key).ok_or(ServiceError::MissingParameter("apikey"))?;
        let raw_usage = non_empty(raw_usage).ok_or(ServiceError::MissingParameter("new_usage"))?;

        let mut user = self
            .store
            .find_by_api_key(api_key)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        let usage = parse_reading(raw_usage)?;
        let today = self.clock.today();
        let entry = user.ledger.apply_reading(usage, today);

        self.store
            .save_open_entries(&user.id, user.ledger.open_entries())
            .await?;

        tracing::info!(
            user_id = %user.id,
            date = %entry.date,
            usage = entry.usage,
            "Water usage updated"
        );

        Ok(entry)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
