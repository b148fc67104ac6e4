//! Calendar source for "today" in the service's configured time zone.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use std::sync::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}

/// A clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl ManualClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Midday on `date` in UTC.
    pub fn on(date: NaiveDate) -> Self {
        Self::new(midday(date))
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn set_date(&self, date: NaiveDate) {
        self.set(midday(date));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

fn midday(date: NaiveDate) -> DateTime<FixedOffset> {
    date.and_hms_opt(12, 0, 0)
        .unwrap_or_default()
        .and_utc()
        .fixed_offset()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn today_follows_configured_offset() {
        let plus_ten = FixedOffset::east_opt(10 * 3600).unwrap();
        let utc_evening = Utc.with_ymd_and_hms(2024, 1, 31, 20, 0, 0).unwrap();

        let clock = ManualClock::new(utc_evening.with_timezone(&plus_ten));

        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    }

    #[test]
    fn manual_clock_moves_on_demand() {
        let first = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let clock = ManualClock::on(first);
        assert_eq!(clock.today(), first);

        let next = first.succ_opt().unwrap();
        clock.set_date(next);
        assert_eq!(clock.today(), next);
    }
}
