use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use junket::{
    api,
    auth::HmacIdentityProvider,
    config::Settings,
    payments::{FakeGateway, HttpGatewayClient, PaymentGateway},
    service::ServiceContext,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "junket=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    tracing::info!(
        "Starting Junket server on {}:{}",
        settings.server.host,
        settings.server.port
    );

    // Initialize database
    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations").run(&db_pool).await?;

    // Pick the payment gateway. Without credentials we fall back to the
    // in-process fake, which keeps local development bookable.
    let gateway: Arc<dyn PaymentGateway> = if settings.gateway.enabled {
        match (
            settings.gateway.base_url.clone(),
            settings.gateway.key_id.clone(),
            settings.gateway.key_secret.clone(),
        ) {
            (Some(base_url), Some(key_id), Some(key_secret)) => {
                tracing::info!("Payment gateway enabled at {}", base_url);
                Arc::new(HttpGatewayClient::new(base_url, key_id, key_secret))
            }
            _ => {
                tracing::warn!("Gateway enabled but missing configuration, using fake gateway");
                Arc::new(FakeGateway::new())
            }
        }
    } else {
        tracing::info!("Payment gateway disabled, using fake gateway");
        Arc::new(FakeGateway::new())
    };

    let identity = Arc::new(HmacIdentityProvider::new(
        settings.auth.session_secret.clone(),
    ));

    // Create service context
    let service_context = Arc::new(ServiceContext::new(db_pool, gateway, &settings));

    let app = api::create_app(service_context, identity, Arc::new(settings.clone()));

    let listener = tokio::net::TcpListener::bind(format!(
        "{}:{}",
        settings.server.host, settings.server.port
    ))
    .await?;

    tracing::info!(
        "Server listening on http://{}:{}",
        settings.server.host,
        settings.server.port
    );

    axum::serve(listener, app).await?;

    Ok(())
}
