pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use service_core::middleware::{http_metrics_middleware, http_request_span, request_id_middleware};
use tower_http::trace::TraceLayer;

use crate::config::UsageConfig;
use crate::services::{AccountService, Clock, IngestionService, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub config: UsageConfig,
    pub store: Arc<dyn UserStore>,
    pub accounts: AccountService,
    pub ingestion: IngestionService,
}

impl AppState {
    pub fn new(config: UsageConfig, store: Arc<dyn UserStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            accounts: AccountService::new(Arc::clone(&store), Arc::clone(&clock)),
            ingestion: IngestionService::new(Arc::clone(&store), clock),
            config,
            store,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/admin_dashboard", get(handlers::admin_dashboard))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::admin_auth_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route("/update_water_usage", get(handlers::update_water_usage))
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/user_dashboard", get(handlers::user_dashboard))
        .merge(admin_routes)
        .with_state(state)
        .layer(from_fn(http_metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(http_request_span::<axum::body::Body>))
        .layer(from_fn(request_id_middleware))
}
