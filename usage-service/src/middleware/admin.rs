use crate::AppState;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use service_core::error::AppError;

pub const ADMIN_API_KEY_HEADER: &str = "x-admin-api-key";

/// Guards admin routes with `X-Admin-Api-Key` when an admin key is configured.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.config.admin.api_key.as_deref() else {
        return next.run(request).await;
    };

    let provided = headers
        .get(ADMIN_API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match provided {
        Some(key) if key == expected => next.run(request).await,
        _ => {
            tracing::warn!("Failed admin authentication attempt");
            AppError::Unauthorized(anyhow::anyhow!("Invalid or missing admin API key"))
                .into_response()
        }
    }
}
