//! Persistence seam for user documents.
//!
//! The store only serialises. Every operation reads a fresh copy and writes
//! whole fields back; there is no locking, so concurrent writers to the same
//! document are last-write-wins.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::models::{UsageEntry, UsageLedger, User};
use crate::services::ServiceError;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, ServiceError>;

    async fn find_by_api_key(&self, api_key: &str) -> Result<Option<User>, ServiceError>;

    async fn list_non_admin(&self) -> Result<Vec<User>, ServiceError>;

    /// Insert a new user. Fails with `DuplicateUsername` when the username
    /// is already taken.
    async fn insert_user(&self, user: &User) -> Result<(), ServiceError>;

    /// Overwrite only the open entries of a user.
    async fn save_open_entries(
        &self,
        user_id: &str,
        entries: &[UsageEntry],
    ) -> Result<(), ServiceError>;

    /// Overwrite both the open entries and the history of a user.
    async fn save_ledger(&self, user_id: &str, ledger: &UsageLedger) -> Result<(), ServiceError>;

    async fn health_check(&self) -> Result<(), ServiceError>;
}

/// Process-local store for tests and local runs.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<HashMap<String, User>>,
    failing_writes: Mutex<HashSet<String>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later write to `username`'s document fail.
    pub fn fail_writes_for(&self, username: &str) {
        if let Ok(mut failing) = self.failing_writes.lock() {
            failing.insert(username.to_string());
        }
    }

    /// Snapshot of every stored document, admins included.
    pub fn all_users(&self) -> Result<Vec<User>, ServiceError> {
        Ok(self.lock_users()?.values().cloned().collect())
    }

    fn lock_users(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, User>>, ServiceError> {
        self.users
            .lock()
            .map_err(|e| ServiceError::Persistence(anyhow::anyhow!("User store mutex poisoned: {}", e)))
    }

    fn update<F>(&self, user_id: &str, apply: F) -> Result<(), ServiceError>
    where
        F: FnOnce(&mut User),
    {
        let mut users = self.lock_users()?;
        let user = users
            .get_mut(user_id)
            .ok_or(ServiceError::UserNotFound)?;

        let failing = self
            .failing_writes
            .lock()
            .map(|f| f.contains(&user.username))
            .unwrap_or(false);
        if failing {
            return Err(ServiceError::Persistence(anyhow::anyhow!(
                "Simulated write failure for user {}",
                user.username
            )));
        }

        apply(user);
        Ok(())
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, ServiceError> {
        Ok(self
            .lock_users()?
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_api_key(&self, api_key: &str) -> Result<Option<User>, ServiceError> {
        Ok(self
            .lock_users()?
            .values()
            .find(|u| u.api_key.as_deref() == Some(api_key))
            .cloned())
    }

    async fn list_non_admin(&self) -> Result<Vec<User>, ServiceError> {
        let mut users: Vec<User> = self
            .lock_users()?
            .values()
            .filter(|u| !u.is_admin)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn insert_user(&self, user: &User) -> Result<(), ServiceError> {
        let mut users = self.lock_users()?;
        if users.values().any(|u| u.username == user.username) {
            return Err(ServiceError::DuplicateUsername);
        }
        if let Some(key) = user.api_key.as_deref() {
            if users.values().any(|u| u.api_key.as_deref() == Some(key)) {
                return Err(ServiceError::Persistence(anyhow::anyhow!(
                    "API key collision"
                )));
            }
        }
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn save_open_entries(
        &self,
        user_id: &str,
        entries: &[UsageEntry],
    ) -> Result<(), ServiceError> {
        self.update(user_id, |user| {
            let history = user.ledger.history().to_vec();
            user.ledger = UsageLedger::from_parts(entries.to_vec(), history);
        })
    }

    async fn save_ledger(&self, user_id: &str, ledger: &UsageLedger) -> Result<(), ServiceError> {
        self.update(user_id, |user| user.ledger = ledger.clone())
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        self.lock_users().map(|_| ())
    }
}
