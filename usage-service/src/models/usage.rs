//! Daily usage entries and the per-user ledger that owns them.
//!
//! A ledger keeps the *open* entries (normally exactly one, dated today) and
//! an append-only history. Readings overwrite the open entry for the day;
//! rollover archives it and opens a fresh zero entry.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

/// Display value used when a user has no entry at all.
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEntry {
    pub date: NaiveDate,
    pub usage: u64,
}

impl UsageEntry {
    pub fn new(date: NaiveDate, usage: u64) -> Self {
        Self { date, usage }
    }

    pub fn zero(date: NaiveDate) -> Self {
        Self::new(date, 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid usage reading '{raw}': expected a non-negative integer")]
pub struct InvalidReading {
    pub raw: String,
}

/// Parse a raw reading as reported by a meter.
pub fn parse_reading(raw: &str) -> Result<u64, InvalidReading> {
    // Bounded by i64 so every accepted reading fits a BSON integer.
    match raw.trim().parse::<i64>() {
        Ok(value) if value >= 0 => Ok(value as u64),
        _ => Err(InvalidReading {
            raw: raw.to_string(),
        }),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageLedger {
    #[serde(rename = "usage_entries", default)]
    entries: Vec<UsageEntry>,
    #[serde(rename = "usage_history", default)]
    history: Vec<UsageEntry>,
}

impl UsageLedger {
    /// A ledger for a new user: one zero entry for `today`, no history.
    pub fn opened(today: NaiveDate) -> Self {
        Self {
            entries: vec![UsageEntry::zero(today)],
            history: Vec::new(),
        }
    }

    pub fn from_parts(entries: Vec<UsageEntry>, history: Vec<UsageEntry>) -> Self {
        Self { entries, history }
    }

    pub fn open_entries(&self) -> &[UsageEntry] {
        &self.entries
    }

    pub fn history(&self) -> &[UsageEntry] {
        &self.history
    }

    /// Record the absolute usage reported for `today`.
    ///
    /// Overwrites the open entry for `today` if there is one, otherwise opens
    /// it. History is never touched.
    pub fn apply_reading(&mut self, new_usage: u64, today: NaiveDate) -> UsageEntry {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.date == today) {
            entry.usage = new_usage;
            return *entry;
        }

        let entry = UsageEntry::new(today, new_usage);
        self.entries.push(entry);
        entry
    }

    /// Archive the most recent open entry and reset to a zero entry for `today`.
    ///
    /// Not idempotent: a second call on the same day archives the fresh zero
    /// entry too. Callers run this at most once per calendar day.
    pub fn rollover(&mut self, today: NaiveDate) {
        if let Some(last) = self.entries.last() {
            self.history.push(*last);
        }
        self.entries = vec![UsageEntry::zero(today)];
    }

    pub fn latest(&self) -> LatestUsage {
        match self.entries.last() {
            Some(entry) => LatestUsage {
                date: Some(entry.date),
                usage: entry.usage,
            },
            None => LatestUsage::not_available(),
        }
    }
}

/// Latest reading for display. A missing date renders as `"N/A"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LatestUsage {
    #[serde(serialize_with = "serialize_display_date")]
    pub date: Option<NaiveDate>,
    pub usage: u64,
}

impl LatestUsage {
    pub fn not_available() -> Self {
        Self {
            date: None,
            usage: 0,
        }
    }
}

fn serialize_display_date<S>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match date {
        Some(date) => serializer.collect_str(&date.format("%Y-%m-%d")),
        None => serializer.serialize_str(NOT_AVAILABLE),
    }
}
