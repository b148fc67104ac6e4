mod common;

use common::day;
use std::sync::Arc;
use usage_service::{
    services::{AccountService, InMemoryUserStore, ManualClock, UserStore},
    utils::Password,
};

#[tokio::test]
async fn admin_is_created_exactly_once() {
    let store = Arc::new(InMemoryUserStore::new());
    let clock = Arc::new(ManualClock::on(day(2024, 1, 1)));
    let accounts = AccountService::new(store.clone(), clock);
    let password = Password::new("admin123");

    assert!(accounts.ensure_admin_exists(&password).await.unwrap());
    assert!(!accounts.ensure_admin_exists(&password).await.unwrap());

    let admins: Vec<_> = store
        .all_users()
        .unwrap()
        .into_iter()
        .filter(|u| u.is_admin)
        .collect();
    assert_eq!(admins.len(), 1);
    assert_eq!(admins[0].username, "admin");
    assert!(admins[0].api_key.is_none());
    assert!(store.list_non_admin().await.unwrap().is_empty());
}

#[tokio::test]
async fn seeded_admin_can_log_in() {
    let store = Arc::new(InMemoryUserStore::new());
    let clock = Arc::new(ManualClock::on(day(2024, 1, 1)));
    let accounts = AccountService::new(store, clock);
    accounts
        .ensure_admin_exists(&Password::new("s3cret"))
        .await
        .unwrap();

    let outcome = accounts
        .login("admin", &Password::new("s3cret"))
        .await
        .unwrap();

    assert!(outcome.is_admin);
}
