//! Shared setup for usage-service integration tests.
//!
//! Everything runs in-process against an in-memory store and a manual clock.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use http_body_util::BodyExt;
use serde_json::Value;
use service_core::config::{Config, Environment};
use std::sync::Arc;
use tower::util::ServiceExt;
use usage_service::{
    build_router,
    config::{AdminConfig, MongoConfig, RolloverConfig, UsageConfig, DEFAULT_ADMIN_PASSWORD},
    services::{AccountService, InMemoryUserStore, ManualClock, RolloverScheduler},
    utils::Password,
    AppState,
};

pub const ADMIN_KEY: &str = "test-admin-key";

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn test_config(admin_api_key: Option<&str>) -> UsageConfig {
    UsageConfig {
        common: Config { port: 8080 },
        environment: Environment::Dev,
        service_name: "usage-service".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        mongodb: MongoConfig {
            uri: "mongodb://localhost:27017".to_string(),
            database: "water_usage_test".to_string(),
        },
        admin: AdminConfig {
            password: Password::new(DEFAULT_ADMIN_PASSWORD),
            api_key: admin_api_key.map(str::to_string),
        },
        rollover: RolloverConfig::default(),
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryUserStore>,
    pub clock: Arc<ManualClock>,
    pub config: UsageConfig,
}

impl TestApp {
    pub async fn spawn(today: NaiveDate) -> Self {
        Self::with_config(today, test_config(None)).await
    }

    pub async fn with_config(today: NaiveDate, config: UsageConfig) -> Self {
        let store = Arc::new(InMemoryUserStore::new());
        let clock = Arc::new(ManualClock::on(today));

        AccountService::new(store.clone(), clock.clone())
            .ensure_admin_exists(&config.admin.password)
            .await
            .expect("Failed to seed admin");

        let state = AppState::new(config.clone(), store.clone(), clock.clone());

        Self {
            router: build_router(state),
            store,
            clock,
            config,
        }
    }

    pub fn scheduler(&self) -> RolloverScheduler {
        RolloverScheduler::new(
            self.store.clone(),
            self.clock.clone(),
            self.config.rollover.clone(),
        )
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::String(
                String::from_utf8_lossy(&bytes).into_owned(),
            ))
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Register a user and return its API key.
    pub async fn register(&self, username: &str, password: &str) -> String {
        let (status, body) = self
            .post_json(
                "/register",
                serde_json::json!({ "username": username, "password": password }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        body["api_key"].as_str().unwrap().to_string()
    }

    pub async fn ingest(&self, api_key: &str, usage: &str) -> (StatusCode, Value) {
        self.get(&format!(
            "/update_water_usage?apikey={}&new_usage={}",
            api_key, usage
        ))
        .await
    }

    pub async fn dashboard(&self, username: &str) -> Value {
        let (status, body) = self
            .get(&format!("/user_dashboard?username={}", username))
            .await;
        assert_eq!(status, StatusCode::OK, "dashboard failed: {body}");
        body
    }
}
