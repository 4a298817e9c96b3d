//! Event intake endpoints.
//!
//! `/batch` takes `{events: [{type, data, timestamp}]}`; `/track` takes the
//! unload summary sent by beacon, which may arrive as `text/plain`, so both
//! read the raw body.

use axum::{body::Bytes, extract::State, Json};
use footprint_core::{
    limits::MAX_BATCH_SIZE_BYTES, BatchPayload, Error, StoreErrorCode, UnloadBeacon,
    ValidationErrorCode,
};
use std::time::Instant;
use telemetry::metrics;
use tracing::{debug, error, info, warn};
use validator::Validate;

use crate::response::{ApiError, BatchResponse, TrackResponse};
use crate::state::AppState;

fn check_size(body: &Bytes) -> Result<(), ApiError> {
    if body.len() > MAX_BATCH_SIZE_BYTES {
        return Err(ApiError::validation(
            ValidationErrorCode::BatchTooLarge.code(),
            vec![format!(
                "Payload size {}KB exceeds {}KB limit",
                body.len() / 1024,
                MAX_BATCH_SIZE_BYTES / 1024
            )],
        ));
    }
    Ok(())
}

/// POST /api/analytics/batch
///
/// Valid events are stored even when others in the batch are rejected.
pub async fn batch_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<BatchResponse>, ApiError> {
    let start = Instant::now();
    metrics().batches_received.inc();
    check_size(&body)?;

    debug!(payload_size = body.len(), "Received event batch");

    let (events, rejected) = BatchPayload::parse(&body).map_err(|e| {
        warn!(error = %e, "Failed to parse batch");
        ApiError::from(e)
    })?;

    let accepted = events.len();
    metrics()
        .events_received
        .inc_by((accepted + rejected.len()) as u64);

    if !rejected.is_empty() {
        warn!(
            accepted = accepted,
            rejected = rejected.len(),
            "Some events failed validation"
        );
        metrics().events_rejected.inc_by(rejected.len() as u64);
    }

    if !events.is_empty() {
        state.store.append(events).await.map_err(|e| {
            error!(error = %e, "Failed to store events");
            ApiError::from(Error::store(StoreErrorCode::WriteFailed, "Failed to store events"))
        })?;
    }

    info!(
        accepted = accepted,
        rejected = rejected.len(),
        latency_ms = start.elapsed().as_millis() as u64,
        "Batch processed"
    );

    let errors: Vec<String> = rejected.into_iter().map(|e| e.to_string()).collect();
    if errors.is_empty() {
        Ok(Json(BatchResponse::success(accepted)))
    } else {
        Ok(Json(BatchResponse::partial(accepted, errors)))
    }
}

/// POST /api/analytics/track - unload summary of a page view.
pub async fn track_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TrackResponse>, ApiError> {
    check_size(&body)?;
    metrics().unload_beacons_received.inc();

    let beacon: UnloadBeacon = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("Invalid unload beacon: {}", e)))?;
    beacon.validate().map_err(|e| {
        ApiError::validation(
            ValidationErrorCode::InvalidFormat.code(),
            vec![e.to_string()],
        )
    })?;

    debug!(
        session_id = %beacon.session_id,
        page_path = %beacon.page_path,
        duration_seconds = beacon.duration_seconds,
        "Received unload beacon"
    );
    state.store.record_unload(beacon).await?;

    Ok(Json(TrackResponse { success: true }))
}
