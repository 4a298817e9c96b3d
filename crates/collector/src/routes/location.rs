//! Location lookup endpoint.

use axum::{extract::State, Json};
use footprint_core::GeoLocation;
use tracing::debug;

use crate::extractors::ClientIp;
use crate::response::ApiError;
use crate::state::AppState;

/// GET /api/analytics/location - resolves the caller's address.
pub async fn location_handler(
    State(state): State<AppState>,
    ClientIp(client_ip): ClientIp,
) -> Result<Json<GeoLocation>, ApiError> {
    let location = state.geo.lookup(client_ip.as_deref()).await?;
    debug!(
        client_ip = client_ip.as_deref().unwrap_or("-"),
        country_code = %location.country_code,
        "Resolved location"
    );
    Ok(Json(location))
}
