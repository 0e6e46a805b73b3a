//! HTTP handlers for bookings. All writes go through `BookingService`, which
//! owns the no-overlap invariant; these handlers only translate the wire
//! format.

use crate::{errors::AppError, state::AppState};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateRentalReq {
    pub item_id: Uuid,
    pub user_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Serialize, Debug)]
pub struct AvailabilityResponse {
    pub available: bool,
}

/// POST `/rentals` — book an item for `[start_date, end_date)`.
pub async fn create_rental(
    State(state): State<AppState>,
    Json(payload): Json<CreateRentalReq>,
) -> Result<impl IntoResponse, AppError> {
    let rental = state
        .booking
        .create_rental(
            payload.item_id,
            payload.user_id,
            payload.start_date,
            payload.end_date,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(rental)))
}

/// DELETE `/rentals/{id}` — cancel a booking, freeing its interval.
pub async fn cancel_rental(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.booking.cancel_rental(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET `/items/{id}/availability?start=&end=` — read-only availability check
/// (RFC 3339 instants).
pub async fn check_availability(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<impl IntoResponse, AppError> {
    // Unknown items answer 404 here even though the checker itself would
    // happily report an empty interval set as available.
    crate::handlers::item_handlers::fetch_item(&state, item_id).await?;

    let available = state
        .booking
        .is_available(item_id, query.start, query.end)
        .await?;
    Ok(Json(AvailabilityResponse { available }))
}
