use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};

use crate::{api::state::AppState, error::AppError, error::Result};

pub const SIGNATURE_HEADER: &str = "x-gateway-signature";

/// Webhook intake: signature verification and parsing happen inside
/// the reconciliation service against the raw body, so this handler
/// only plucks the header. Store failures surface as 500 so the
/// gateway redelivers; the dedup set makes redelivery safe.
pub async fn payment_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::InvalidSignature)?;

    state
        .service_context
        .reconciliation_service
        .handle_event(&body, signature)
        .await?;

    Ok(StatusCode::OK)
}
