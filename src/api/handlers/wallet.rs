use axum::{extract::State, http::HeaderMap, Json};
use serde::Serialize;

use crate::{
    api::{authenticate, state::AppState},
    domain::{WalletAudit, WalletTransaction},
    error::Result,
};

#[derive(Debug, Serialize)]
pub struct WalletResponse {
    pub audit: WalletAudit,
    pub transactions: Vec<WalletTransaction>,
}

/// The caller's own wallet: materialized balance, ledger history and
/// the drift audit in one response.
pub async fn get_wallet(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<WalletResponse>> {
    let identity = authenticate(&state, &headers).await?;

    let wallet = &state.service_context.wallet_service;
    let audit = wallet.reconcile(identity.user_id).await?;
    let transactions = wallet.history(identity.user_id).await?;

    Ok(Json(WalletResponse {
        audit,
        transactions,
    }))
}
