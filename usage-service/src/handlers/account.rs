use axum::{extract::State, http::StatusCode, Json};
use service_core::error::AppError;

use crate::dtos::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use crate::utils::{Password, ValidatedJson};
use crate::AppState;

pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let registered = state
        .accounts
        .register(&req.username, &Password::new(req.password))
        .await?;

    Ok((StatusCode::CREATED, Json(registered)))
}

pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let outcome = state
        .accounts
        .login(&req.username, &Password::new(req.password))
        .await?;

    Ok(Json(outcome))
}
