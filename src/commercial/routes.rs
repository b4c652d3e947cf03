//! Commercial route handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::AppState;

use super::models::CommercialRecord;
use super::requests::SaveCommercialRequest;
use super::responses::{BreakdownResponse, CommercialRecordResponse, PreviewResponse, SaveResponse};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/commercial/breakdown", post(calculate_breakdown))
        .route(
            "/api/bookings/:booking_id/commercial",
            get(get_commercial).put(save_commercial),
        )
}

/// Recalculate a record as edited, without saving
async fn calculate_breakdown(
    State(state): State<AppState>,
    Json(record): Json<CommercialRecord>,
) -> Json<PreviewResponse> {
    let (record, breakdown) = state.service.preview(&record).await;
    Json(PreviewResponse {
        breakdown: BreakdownResponse::from(&breakdown),
        record,
    })
}

/// Stored record of a booking
async fn get_commercial(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<CommercialRecordResponse>> {
    let loaded = state
        .service
        .load(booking_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(CommercialRecordResponse::from(loaded)))
}

/// Save the record of a booking
async fn save_commercial(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(request): Json<SaveCommercialRequest>,
) -> Result<(StatusCode, Json<SaveResponse>)> {
    let mut record = request.record;
    record.booking_id = Some(booking_id);

    let outcome = state.service.save(&record, request.expected_version).await?;
    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(SaveResponse::from(outcome))))
}
