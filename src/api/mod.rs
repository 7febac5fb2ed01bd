pub mod handlers;
pub mod state;

use std::sync::Arc;

use axum::{
    http::{header, HeaderMap},
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    auth::{Identity, IdentityProvider},
    config::Settings,
    error::{AppError, Result},
    service::ServiceContext,
};
use state::AppState;

pub fn create_app(
    service_context: Arc<ServiceContext>,
    identity: Arc<dyn IdentityProvider>,
    settings: Arc<Settings>,
) -> Router {
    let app_state = AppState::new(service_context, identity, settings);

    Router::new()
        // Root and health endpoints
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))
        // API routes
        .nest("/api", api_routes())
        // Add state to the router
        .with_state(app_state)
        // Middleware
        .layer(CorsLayer::permissive()) // Configure properly for production
        .layer(TraceLayer::new_for_http())
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/bookings", post(handlers::bookings::create))
        .route("/bookings/:id", get(handlers::bookings::get))
        .route("/bookings/:id/cancel", post(handlers::bookings::cancel))
        .route(
            "/bookings/:id/ai-credits",
            post(handlers::bookings::grant_ai_credits),
        )
        // Public webhook endpoint (no auth; authenticity comes from the
        // gateway signature over the raw body)
        .route("/webhooks/payments", post(handlers::webhooks::payment_event))
        .route("/settlements", get(handlers::settlements::list))
        .route("/wallet", get(handlers::wallet::get_wallet))
}

/// Resolve the bearer token through the identity boundary. Session
/// minting happens elsewhere; a missing or bad token is Unauthorized.
pub(crate) async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Identity> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    state.identity.verify(token).await
}
