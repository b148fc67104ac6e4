use axum::{
    extract::{Query, State},
    Json,
};
use service_core::error::AppError;

use crate::dtos::{IngestParams, IngestResponse};
use crate::AppState;

/// Meter ingestion endpoint: `GET /update_water_usage?apikey=..&new_usage=..`.
pub async fn update_water_usage(
    State(state): State<AppState>,
    Query(params): Query<IngestParams>,
) -> Result<Json<IngestResponse>, AppError> {
    let entry = state
        .ingestion
        .ingest(params.apikey.as_deref(), params.new_usage.as_deref())
        .await?;

    Ok(Json(IngestResponse {
        message: "Water usage updated successfully!".to_string(),
        entry,
    }))
}
