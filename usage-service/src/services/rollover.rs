//! Daily rollover: archive each user's open entry and open a zero entry for the new day.
//!
//! Rollover fires at the start of each local calendar day (midnight in the
//! configured UTC offset), so the date it opens is always the new day.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime};
use futures::stream::{self, StreamExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::metrics::{ROLLOVER_DURATION_SECONDS, ROLLOVER_FAILURES_TOTAL, ROLLOVER_USERS_TOTAL};
use crate::{
    config::RolloverConfig,
    services::{Clock, ServiceError, UserStore},
};

#[derive(Debug, Clone)]
pub struct RolloverFailure {
    pub user_id: String,
    pub username: String,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct RolloverReport {
    pub date: NaiveDate,
    pub rolled_over: usize,
    pub failures: Vec<RolloverFailure>,
}

pub struct RolloverScheduler {
    store: Arc<dyn UserStore>,
    clock: Arc<dyn Clock>,
    config: RolloverConfig,
    shutdown: CancellationToken,
}

impl RolloverScheduler {
    pub fn new(store: Arc<dyn UserStore>, clock: Arc<dyn Clock>, config: RolloverConfig) -> Self {
        Self {
            store,
            clock,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancelling this token stops the scheduling loop after any in-flight run.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Roll every non-admin user over to `today`.
    ///
    /// At most `concurrency` users are in flight at once. A failed write is
    /// logged and reported without stopping the others; only listing the
    /// users can fail the run as a whole.
    pub async fn run_once(&self, today: NaiveDate) -> Result<RolloverReport, ServiceError> {
        let users = self.store.list_non_admin().await?;
        tracing::info!(date = %today, users = users.len(), "Starting daily rollover");

        let outcomes: Vec<_> = stream::iter(users)
            .map(|mut user| {
                let store = Arc::clone(&self.store);
                async move {
                    user.ledger.rollover(today);
                    let result = store.save_ledger(&user.id, &user.ledger).await;
                    (user.id, user.username, result)
                }
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut report = RolloverReport {
            date: today,
            rolled_over: 0,
            failures: Vec::new(),
        };

        for (user_id, username, result) in outcomes {
            let Err(e) = result else {
                report.rolled_over += 1;
                continue;
            };

            tracing::error!(
                user_id = %user_id,
                username = %username,
                date = %today,
                error = %e,
                "Rollover failed for user"
            );
            report.failures.push(RolloverFailure {
                user_id,
                username,
                error: e.to_string(),
            });
        }

        tracing::info!(
            date = %today,
            rolled_over = report.rolled_over,
            failed = report.failures.len(),
            "Daily rollover finished"
        );

        Ok(report)
    }

    /// Spawn the scheduling loop. Returns immediately with a finished task when
    /// rollover is disabled.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        if !self.config.enabled {
            tracing::info!("Daily rollover disabled");
            return;
        }

        tracing::info!(
            utc_offset = %self.config.utc_offset,
            concurrency = self.config.concurrency,
            "Daily rollover scheduled"
        );

        let mut last_run: Option<NaiveDate> = None;

        loop {
            let now = self.clock.now().with_timezone(&self.config.utc_offset);
            let next = next_day_start(now);
            let wait = (next - now).to_std().unwrap_or_default();
            tracing::debug!(next = %next, "Waiting for next rollover");

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            // `next` is a local midnight, so its date is the day being opened.
            let date = next.date_naive();
            if last_run == Some(date) {
                continue;
            }
            last_run = Some(date);

            let started = Instant::now();
            match self.run_once(date).await {
                Ok(report) => {
                    metrics::counter!(ROLLOVER_USERS_TOTAL).increment(report.rolled_over as u64);
                    metrics::counter!(ROLLOVER_FAILURES_TOTAL)
                        .increment(report.failures.len() as u64);
                }
                Err(e) => {
                    tracing::error!(date = %date, error = %e, "Daily rollover could not list users");
                    metrics::counter!(ROLLOVER_FAILURES_TOTAL).increment(1);
                }
            }
            metrics::histogram!(ROLLOVER_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        }

        tracing::info!("Daily rollover scheduler stopped");
    }
}

/// The first local midnight, in `now`'s offset, strictly after `now`.
pub fn next_day_start(now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    now.date_naive()
        .succ_opt()
        .and_then(|tomorrow| {
            tomorrow
                .and_time(NaiveTime::MIN)
                .and_local_timezone(*now.offset())
                .single()
        })
        .unwrap_or(now + Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{UsageEntry, User};
    use crate::services::{InMemoryUserStore, ManualClock};
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
    }

    fn config(enabled: bool) -> RolloverConfig {
        RolloverConfig {
            enabled,
            utc_offset: FixedOffset::east_opt(0).unwrap(),
            concurrency: 2,
        }
    }

    #[test]
    fn next_day_start_is_the_coming_local_midnight() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = offset.with_ymd_and_hms(2024, 7, 1, 15, 30, 0).unwrap();

        let next = next_day_start(now);

        assert_eq!(next, offset.with_ymd_and_hms(2024, 7, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn next_day_start_is_strictly_after_now() {
        let offset = FixedOffset::east_opt(0).unwrap();
        let now = offset.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();

        let next = next_day_start(now);

        assert_eq!(next, offset.with_ymd_and_hms(2024, 7, 2, 0, 0, 0).unwrap());
        assert_eq!(next.date_naive(), day(2));
    }

    #[test]
    fn next_day_start_crosses_month_end() {
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        let now = offset.with_ymd_and_hms(2024, 7, 31, 23, 59, 59).unwrap();

        let next = next_day_start(now);

        assert_eq!(next, offset.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn next_day_start_follows_offset_not_utc() {
        let offset = FixedOffset::east_opt(10 * 3600).unwrap();
        let utc_evening = chrono::Utc.with_ymd_and_hms(2024, 7, 1, 13, 30, 0).unwrap();

        let next = next_day_start(utc_evening.with_timezone(&offset));

        assert_eq!(next, offset.with_ymd_and_hms(2024, 7, 2, 0, 0, 0).unwrap());
        assert_eq!(
            next.with_timezone(&chrono::Utc),
            chrono::Utc.with_ymd_and_hms(2024, 7, 1, 14, 0, 0).unwrap()
        );
    }

    async fn seeded_store() -> (Arc<InMemoryUserStore>, User, User) {
        let store = Arc::new(InMemoryUserStore::new());
        let mut alice = User::new("alice".into(), "h".into(), day(1));
        alice.ledger.apply_reading(40, day(1));
        let bob = User::new("bob".into(), "h".into(), day(1));
        store.insert_user(&alice).await.unwrap();
        store.insert_user(&bob).await.unwrap();
        store
            .insert_user(&User::new_admin("h".into(), day(1)))
            .await
            .unwrap();
        (store, alice, bob)
    }

    #[tokio::test]
    async fn run_once_rolls_every_regular_user() {
        let (store, _, _) = seeded_store().await;
        let clock = Arc::new(ManualClock::on(day(2)));
        let scheduler = RolloverScheduler::new(store.clone(), clock, config(true));

        let report = scheduler.run_once(day(2)).await.unwrap();

        assert_eq!(report.rolled_over, 2);
        assert!(report.failures.is_empty());

        let alice = store.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(alice.ledger.history(), &[UsageEntry::new(day(1), 40)]);
        assert_eq!(alice.ledger.open_entries(), &[UsageEntry::zero(day(2))]);

        let admin = store.find_by_username("admin").await.unwrap().unwrap();
        assert!(admin.ledger.history().is_empty());
        assert_eq!(admin.ledger.open_entries(), &[UsageEntry::zero(day(1))]);
    }

    #[tokio::test]
    async fn one_failed_write_does_not_stop_the_others() {
        let (store, alice, _) = seeded_store().await;
        store.fail_writes_for("alice");
        let clock = Arc::new(ManualClock::on(day(2)));
        let scheduler = RolloverScheduler::new(store.clone(), clock, config(true));

        let report = scheduler.run_once(day(2)).await.unwrap();

        assert_eq!(report.rolled_over, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].user_id, alice.id);
        assert_eq!(report.failures[0].username, "alice");

        let bob = store.find_by_username("bob").await.unwrap().unwrap();
        assert_eq!(bob.ledger.history(), &[UsageEntry::zero(day(1))]);
        let alice = store.find_by_username("alice").await.unwrap().unwrap();
        assert!(alice.ledger.history().is_empty());
    }

    #[tokio::test]
    async fn disabled_scheduler_returns_immediately() {
        let (store, _, _) = seeded_store().await;
        let clock = Arc::new(ManualClock::on(day(1)));

        RolloverScheduler::new(store.clone(), clock, config(false))
            .spawn()
            .await
            .unwrap();

        let bob = store.find_by_username("bob").await.unwrap().unwrap();
        assert!(bob.ledger.history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_run_fires_once_per_day_and_stops_on_shutdown() {
        let (store, _, _) = seeded_store().await;
        let offset = FixedOffset::east_opt(0).unwrap();
        let clock = Arc::new(ManualClock::new(
            offset.with_ymd_and_hms(2024, 7, 1, 23, 59, 0).unwrap(),
        ));
        let scheduler = RolloverScheduler::new(store.clone(), clock, config(true));
        let shutdown = scheduler.shutdown_token();
        let handle = scheduler.spawn();

        for _ in 0..50 {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            let bob = store.find_by_username("bob").await.unwrap().unwrap();
            if !bob.ledger.history().is_empty() {
                break;
            }
        }
        // The frozen clock keeps pointing at the same midnight; the loop must not repeat it.
        tokio::time::sleep(std::time::Duration::from_secs(600)).await;

        shutdown.cancel();
        handle.await.unwrap();

        let bob = store.find_by_username("bob").await.unwrap().unwrap();
        assert_eq!(bob.ledger.history(), &[UsageEntry::zero(day(1))]);
        assert_eq!(bob.ledger.open_entries(), &[UsageEntry::zero(day(2))]);
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_run_in_offset_zone_opens_the_new_local_day() {
        let (store, _, _) = seeded_store().await;
        let offset = FixedOffset::east_opt(10 * 3600).unwrap();
        // 23:30 local on 07-01; the local day ends 30 minutes later.
        let clock = Arc::new(ManualClock::new(
            offset.with_ymd_and_hms(2024, 7, 1, 23, 30, 0).unwrap(),
        ));
        let config = RolloverConfig {
            utc_offset: offset,
            ..config(true)
        };
        let scheduler = RolloverScheduler::new(store.clone(), clock, config);
        let shutdown = scheduler.shutdown_token();
        let handle = scheduler.spawn();

        tokio::time::sleep(std::time::Duration::from_secs(31 * 60)).await;
        shutdown.cancel();
        handle.await.unwrap();

        let alice = store.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(alice.ledger.history(), &[UsageEntry::new(day(1), 40)]);
        assert_eq!(alice.ledger.open_entries(), &[UsageEntry::zero(day(2))]);
        assert!(alice
            .ledger
            .history()
            .iter()
            .all(|h| h.date != alice.ledger.latest().date.unwrap()));
    }

    /// Delegates to an in-memory store and records the peak number of
    /// concurrent ledger writes.
    #[derive(Default)]
    struct ConcurrencyTrackingStore {
        inner: InMemoryUserStore,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl UserStore for ConcurrencyTrackingStore {
        async fn find_by_username(&self, username: &str) -> Result<Option<User>, ServiceError> {
            self.inner.find_by_username(username).await
        }

        async fn find_by_api_key(&self, api_key: &str) -> Result<Option<User>, ServiceError> {
            self.inner.find_by_api_key(api_key).await
        }

        async fn list_non_admin(&self) -> Result<Vec<User>, ServiceError> {
            self.inner.list_non_admin().await
        }

        async fn insert_user(&self, user: &User) -> Result<(), ServiceError> {
            self.inner.insert_user(user).await
        }

        async fn save_open_entries(
            &self,
            user_id: &str,
            entries: &[UsageEntry],
        ) -> Result<(), ServiceError> {
            self.inner.save_open_entries(user_id, entries).await
        }

        async fn save_ledger(
            &self,
            user_id: &str,
            ledger: &crate::models::UsageLedger,
        ) -> Result<(), ServiceError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            for _ in 0..5 {
                tokio::task::yield_now().await;
            }
            let result = self.inner.save_ledger(user_id, ledger).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }

        async fn health_check(&self) -> Result<(), ServiceError> {
            self.inner.health_check().await
        }
    }

    #[tokio::test]
    async fn run_once_keeps_writes_within_concurrency_limit() {
        let store = Arc::new(ConcurrencyTrackingStore::default());
        for i in 0..6 {
            store
                .insert_user(&User::new(format!("user{i}"), "h".into(), day(1)))
                .await
                .unwrap();
        }
        let clock = Arc::new(ManualClock::on(day(2)));
        let scheduler = RolloverScheduler::new(store.clone(), clock, config(true));

        let report = scheduler.run_once(day(2)).await.unwrap();

        assert_eq!(report.rolled_over, 6);
        let peak = store.peak.load(Ordering::SeqCst);
        assert!((1..=2).contains(&peak), "peak concurrent writes was {peak}");
    }
}
