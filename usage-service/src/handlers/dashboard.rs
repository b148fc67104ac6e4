use axum::{
    extract::{Query, State},
    Json,
};
use service_core::error::AppError;

use crate::dtos::{AdminDashboardResponse, UserDashboardQuery, UserDashboardResponse};
use crate::services::ServiceError;
use crate::AppState;

pub async fn user_dashboard(
    State(state): State<AppState>,
    Query(query): Query<UserDashboardQuery>,
) -> Result<Json<UserDashboardResponse>, AppError> {
    let username = query
        .username
        .filter(|u| !u.is_empty())
        .ok_or(ServiceError::MissingParameter("username"))?;

    Ok(Json(state.accounts.user_dashboard(&username).await?))
}

pub async fn admin_dashboard(
    State(state): State<AppState>,
) -> Result<Json<AdminDashboardResponse>, AppError> {
    Ok(Json(state.accounts.admin_overview().await?))
}
