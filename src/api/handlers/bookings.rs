use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{
    api::{authenticate, state::AppState},
    auth::{Identity, Role},
    domain::{Booking, ReserveRequest},
    error::{AppError, Result},
    payments::GatewayOrder,
};

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub trip_id: Uuid,
    pub batch_id: String,
    pub number_of_travelers: i64,
}

#[derive(Debug, Serialize)]
pub struct CreateBookingResponse {
    pub booking: Booking,
    pub order: GatewayOrder,
}

pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<CreateBookingResponse>)> {
    let identity = authenticate(&state, &headers).await?;

    let (booking, order) = state
        .service_context
        .booking_service
        .reserve_and_create_order(ReserveRequest {
            trip_id: request.trip_id,
            batch_id: request.batch_id,
            traveler_id: identity.user_id,
            number_of_travelers: request.number_of_travelers,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(CreateBookingResponse { booking, order })))
}

pub async fn get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>> {
    let identity = authenticate(&state, &headers).await?;
    let booking = find_authorized(&state, &identity, id).await?;
    Ok(Json(booking))
}

pub async fn cancel(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>> {
    let identity = authenticate(&state, &headers).await?;
    find_authorized(&state, &identity, id).await?;

    let booking = state.service_context.booking_service.cancel(id).await?;
    Ok(Json(booking))
}

pub async fn grant_ai_credits(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    let identity = authenticate(&state, &headers).await?;
    find_authorized(&state, &identity, id).await?;

    let granted = state
        .service_context
        .booking_service
        .grant_ai_credits(id)
        .await?;

    Ok(Json(json!({ "granted": granted })))
}

/// Travelers can only touch their own bookings; admins see everything.
async fn find_authorized(
    state: &AppState,
    identity: &Identity,
    booking_id: Uuid,
) -> Result<Booking> {
    let booking = state
        .service_context
        .booking_repo
        .find_by_id(booking_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Booking {} not found", booking_id)))?;

    if identity.role != Role::Admin && booking.traveler_id != identity.user_id {
        return Err(AppError::Unauthorized);
    }
    Ok(booking)
}
