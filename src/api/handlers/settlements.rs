use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};

use crate::{
    api::{authenticate, state::AppState},
    auth::Role,
    domain::{BatchSettlement, SettlementFilter},
    error::{AppError, Result},
};

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(mut filter): Query<SettlementFilter>,
) -> Result<Json<Vec<BatchSettlement>>> {
    let identity = authenticate(&state, &headers).await?;

    // Organizers are scoped to their own settlements; only admins may
    // query platform-wide or for another organizer.
    match identity.role {
        Role::Admin => {}
        Role::Organizer => filter.organizer_id = Some(identity.user_id),
        Role::Traveler => return Err(AppError::Unauthorized),
    }

    let settlements = state
        .service_context
        .settlement_service
        .compute_settlements(filter)
        .await?;

    Ok(Json(settlements))
}
