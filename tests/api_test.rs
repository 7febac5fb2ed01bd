use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde_json::json;
use sha2::Sha256;
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;
use uuid::Uuid;

use junket::{
    api::create_app,
    auth::{HmacIdentityProvider, Role},
    config::Settings,
    domain::{NewBatch, NewOrganizer, NewTrip, NewUser, TripStatus},
    payments::FakeGateway,
    repository::{OrganizerRepository, TripRepository, UserRepository},
    service::ServiceContext,
};

const WEBHOOK_SECRET: &str = "test-webhook-secret";
const SESSION_SECRET: &str = "test-session-secret";

struct TestApp {
    app: Router,
    context: Arc<ServiceContext>,
    identity: HmacIdentityProvider,
    organizer_id: Uuid,
    traveler_id: Uuid,
    trip_id: Uuid,
}

async fn spawn_app() -> anyhow::Result<TestApp> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let mut settings = Settings::default();
    settings.auth.session_secret = SESSION_SECRET.to_string();
    settings.gateway.webhook_secret = Some(WEBHOOK_SECRET.to_string());

    let context = Arc::new(ServiceContext::new(
        pool,
        Arc::new(FakeGateway::new()),
        &settings,
    ));

    let organizer = context
        .organizer_repo
        .create(NewOrganizer {
            name: "Summit Treks".to_string(),
            email: "summit@example.com".to_string(),
            commission_rate: None,
        })
        .await?;
    let traveler = context
        .user_repo
        .create(NewUser {
            name: "Asha Traveler".to_string(),
            email: "asha@example.com".to_string(),
        })
        .await?;

    let now = Utc::now();
    let trip = context
        .trip_repo
        .create(NewTrip {
            organizer_id: organizer.id,
            title: "Ladakh Circuit".to_string(),
            price: Decimal::from(1500),
            status: TripStatus::Published,
            balance_due_days: 30,
            commission_rate_override: None,
            batches: vec![NewBatch {
                id: "b1".to_string(),
                start_date: now + Duration::days(10),
                end_date: now + Duration::days(17),
                capacity: 4,
                deal_price: None,
            }],
        })
        .await?;

    let identity = HmacIdentityProvider::new(SESSION_SECRET.to_string());
    let app = create_app(
        context.clone(),
        Arc::new(HmacIdentityProvider::new(SESSION_SECRET.to_string())),
        Arc::new(settings),
    );

    Ok(TestApp {
        app,
        context,
        identity,
        organizer_id: organizer.id,
        traveler_id: traveler.id,
        trip_id: trip.id,
    })
}

impl TestApp {
    fn token(&self, user_id: Uuid, role: Role) -> String {
        self.identity.mint(user_id, role).unwrap()
    }

    fn booking_request(&self, token: &str, travelers: i64) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/bookings")
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {}", token))
            .body(Body::from(
                json!({
                    "trip_id": self.trip_id,
                    "batch_id": "b1",
                    "number_of_travelers": travelers
                })
                .to_string(),
            ))
            .unwrap()
    }
}

fn sign(body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

#[tokio::test]
async fn test_health_check() -> anyhow::Result<()> {
    let t = spawn_app().await?;
    let response = t
        .app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_booking_requires_token() -> anyhow::Result<()> {
    let t = spawn_app().await?;

    let request = Request::builder()
        .method("POST")
        .uri("/api/bookings")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "trip_id": t.trip_id, "batch_id": "b1", "number_of_travelers": 1 }).to_string(),
        ))?;
    let response = t.app.clone().oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_booking_flow_over_http() -> anyhow::Result<()> {
    let t = spawn_app().await?;
    let token = t.token(t.traveler_id, Role::Traveler);

    let response = t.app.clone().oneshot(t.booking_request(&token, 2)).await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let payload: serde_json::Value = serde_json::from_slice(&bytes)?;
    let booking_id = payload["booking"]["id"].as_str().unwrap().to_string();
    assert_eq!(payload["booking"]["payment_status"], "Reserved");
    assert!(payload["order"]["id"].as_str().is_some());

    let batch = t.context.trip_repo.find_batch(t.trip_id, "b1").await?.unwrap();
    assert_eq!(batch.available_slots, 2);

    // Owner can read their booking back
    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/bookings/{}", booking_id))
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    // A different traveler cannot
    let stranger = t.token(Uuid::new_v4(), Role::Traveler);
    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/bookings/{}", booking_id))
                .header("authorization", format!("Bearer {}", stranger))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_overbooking_returns_conflict() -> anyhow::Result<()> {
    let t = spawn_app().await?;
    let token = t.token(t.traveler_id, Role::Traveler);

    let response = t.app.clone().oneshot(t.booking_request(&token, 3)).await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = t.app.clone().oneshot(t.booking_request(&token, 3)).await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn test_tampered_token_is_rejected() -> anyhow::Result<()> {
    let t = spawn_app().await?;
    // Token minted with the wrong secret
    let forged = HmacIdentityProvider::new("wrong-secret".to_string())
        .mint(t.traveler_id, Role::Admin)?;

    let response = t.app.clone().oneshot(t.booking_request(&forged, 1)).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_webhook_signature_enforcement() -> anyhow::Result<()> {
    let t = spawn_app().await?;

    let body = json!({
        "id": "evt_http_1",
        "event": "payment.captured",
        "payload": {
            "payment": {
                "entity": { "id": "pay_1", "amount": 100000, "notes": {} }
            }
        }
    })
    .to_string();

    // No signature header
    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/webhooks/payments")
                .header("content-type", "application/json")
                .body(Body::from(body.clone()))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Valid signature over the raw body
    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/webhooks/payments")
                .header("content-type", "application/json")
                .header("x-gateway-signature", sign(body.as_bytes()))
                .body(Body::from(body))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_settlement_access_is_role_scoped() -> anyhow::Result<()> {
    let t = spawn_app().await?;

    let traveler = t.token(t.traveler_id, Role::Traveler);
    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/settlements")
                .header("authorization", format!("Bearer {}", traveler))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let organizer = t.token(t.organizer_id, Role::Organizer);
    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/settlements")
                .header("authorization", format!("Bearer {}", organizer))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let admin = t.token(Uuid::new_v4(), Role::Admin);
    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/settlements")
                .header("authorization", format!("Bearer {}", admin))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_wallet_endpoint_returns_audit_and_history() -> anyhow::Result<()> {
    let t = spawn_app().await?;
    t.context
        .wallet_service
        .credit(t.traveler_id, Decimal::from(250), "Referral bonus")
        .await?;

    let token = t.token(t.traveler_id, Role::Traveler);
    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/wallet")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let payload: serde_json::Value = serde_json::from_slice(&bytes)?;
    assert_eq!(payload["audit"]["balance"], "250");
    assert_eq!(payload["audit"]["drift"], "0");
    assert_eq!(payload["transactions"].as_array().unwrap().len(), 1);
    Ok(())
}
