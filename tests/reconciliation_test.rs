use std::sync::Arc;

use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde_json::json;
use sha2::Sha256;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use uuid::Uuid;

use junket::{
    config::BookingConfig,
    domain::{
        Booking, LeadStatus, NewBatch, NewOrganizer, NewTrip, NewUser, OrganizerTier,
        PaymentStatus, ReserveRequest, TripStatus,
    },
    error::AppError,
    payments::FakeGateway,
    repository::{
        BookingRepository, OrganizerRepository, SqliteBookingRepository,
        SqliteOrganizerRepository, SqliteTripRepository, SqliteUserRepository, TripRepository,
        UserRepository,
    },
    service::{BookingService, ReconciliationService},
};

const WEBHOOK_SECRET: &str = "test-webhook-secret";

struct Fixture {
    pool: SqlitePool,
    trip_repo: SqliteTripRepository,
    booking_repo: Arc<SqliteBookingRepository>,
    organizer_repo: SqliteOrganizerRepository,
    reconciliation: ReconciliationService,
    organizer_id: Uuid,
    trip_id: Uuid,
    booking: Booking,
}

fn sign(body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

async fn setup() -> anyhow::Result<Fixture> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let organizer_repo = SqliteOrganizerRepository::new(pool.clone());
    let organizer = organizer_repo
        .create(NewOrganizer {
            name: "Summit Treks".to_string(),
            email: "summit@example.com".to_string(),
            commission_rate: None,
        })
        .await?;

    let traveler = SqliteUserRepository::new(pool.clone())
        .create(NewUser {
            name: "Asha Traveler".to_string(),
            email: "asha@example.com".to_string(),
        })
        .await?;

    let trip_repo = SqliteTripRepository::new(pool.clone());
    let now = Utc::now();
    let trip = trip_repo
        .create(NewTrip {
            organizer_id: organizer.id,
            title: "Spiti Valley Expedition".to_string(),
            price: Decimal::from(2000),
            status: TripStatus::Published,
            balance_due_days: 30,
            commission_rate_override: None,
            batches: vec![NewBatch {
                id: "b1".to_string(),
                start_date: now + Duration::days(10),
                end_date: now + Duration::days(17),
                capacity: 6,
                deal_price: None,
            }],
        })
        .await?;

    let booking_repo = Arc::new(SqliteBookingRepository::new(pool.clone()));
    let booking_service = BookingService::new(
        pool.clone(),
        booking_repo.clone(),
        Arc::new(FakeGateway::new()),
        BookingConfig::default(),
        "INR".to_string(),
    );
    let booking = booking_service
        .reserve(ReserveRequest {
            trip_id: trip.id,
            batch_id: "b1".to_string(),
            traveler_id: traveler.id,
            number_of_travelers: 2,
        })
        .await?;

    let reconciliation = ReconciliationService::new(pool.clone(), WEBHOOK_SECRET.to_string());

    Ok(Fixture {
        pool,
        trip_repo,
        booking_repo,
        organizer_repo,
        reconciliation,
        organizer_id: organizer.id,
        trip_id: trip.id,
        booking,
    })
}

fn capture_event(event_id: &str, booking_id: Uuid, amount_minor: i64) -> Vec<u8> {
    json!({
        "id": event_id,
        "event": "payment.captured",
        "payload": {
            "payment": {
                "entity": {
                    "id": "pay_cap_1",
                    "amount": amount_minor,
                    "notes": { "booking_id": booking_id.to_string() }
                }
            }
        }
    })
    .to_string()
    .into_bytes()
}

#[tokio::test]
async fn test_capture_marks_booking_paid() -> anyhow::Result<()> {
    let f = setup().await?;

    let body = capture_event("evt_1", f.booking.id, 400000);
    f.reconciliation.handle_event(&body, &sign(&body)).await?;

    let booking = f.booking_repo.find_by_id(f.booking.id).await?.unwrap();
    assert_eq!(booking.payment_status, PaymentStatus::PaidInFull);
    assert_eq!(booking.amount_paid, Decimal::from(4000));
    assert_eq!(booking.gateway_payment_id.as_deref(), Some("pay_cap_1"));
    Ok(())
}

#[tokio::test]
async fn test_replayed_event_applies_once() -> anyhow::Result<()> {
    let f = setup().await?;

    let body = capture_event("evt_dup", f.booking.id, 400000);
    f.reconciliation.handle_event(&body, &sign(&body)).await?;

    // Same event id redelivered, even with a mutated amount, must be
    // acknowledged without touching state
    let replay = capture_event("evt_dup", f.booking.id, 999900);
    f.reconciliation.handle_event(&replay, &sign(&replay)).await?;

    let booking = f.booking_repo.find_by_id(f.booking.id).await?.unwrap();
    assert_eq!(booking.amount_paid, Decimal::from(4000));

    let processed: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM processed_events")
        .fetch_one(&f.pool)
        .await?;
    assert_eq!(processed, 1);
    Ok(())
}

#[tokio::test]
async fn test_invalid_signature_is_rejected_without_effects() -> anyhow::Result<()> {
    let f = setup().await?;

    let body = capture_event("evt_forged", f.booking.id, 400000);
    let err = f
        .reconciliation
        .handle_event(&body, &hex::encode([0u8; 32]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidSignature));

    let booking = f.booking_repo.find_by_id(f.booking.id).await?.unwrap();
    assert_eq!(booking.payment_status, PaymentStatus::Reserved);
    assert_eq!(booking.amount_paid, Decimal::ZERO);
    Ok(())
}

#[tokio::test]
async fn test_garbage_hex_signature_is_rejected() -> anyhow::Result<()> {
    let f = setup().await?;

    let body = capture_event("evt_garbage", f.booking.id, 400000);
    let err = f
        .reconciliation
        .handle_event(&body, "not-even-hex")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidSignature));
    Ok(())
}

#[tokio::test]
async fn test_well_signed_garbage_payload_is_malformed() -> anyhow::Result<()> {
    let f = setup().await?;

    let body = b"{\"event\": \"payment.captured\"".to_vec();
    let err = f
        .reconciliation
        .handle_event(&body, &sign(&body))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::MalformedEvent(_)));
    Ok(())
}

#[tokio::test]
async fn test_payment_failure_cancels_and_restores_slots() -> anyhow::Result<()> {
    let f = setup().await?;

    let body = json!({
        "id": "evt_fail",
        "event": "payment.failed",
        "payload": {
            "payment": {
                "entity": {
                    "id": "pay_fail_1",
                    "amount": 400000,
                    "notes": { "booking_id": f.booking.id.to_string() }
                }
            }
        }
    })
    .to_string()
    .into_bytes();
    f.reconciliation.handle_event(&body, &sign(&body)).await?;

    let booking = f.booking_repo.find_by_id(f.booking.id).await?.unwrap();
    assert_eq!(booking.payment_status, PaymentStatus::Cancelled);

    let batch = f.trip_repo.find_batch(f.trip_id, "b1").await?.unwrap();
    assert_eq!(batch.available_slots, 6);
    Ok(())
}

#[tokio::test]
async fn test_capture_resolves_booking_by_order_id() -> anyhow::Result<()> {
    let f = setup().await?;
    sqlx::query("UPDATE bookings SET gateway_order_id = 'order_abc' WHERE id = ?")
        .bind(f.booking.id.to_string())
        .execute(&f.pool)
        .await?;

    // Notes stripped by the gateway; only the order reference survives
    let body = json!({
        "id": "evt_orderref",
        "event": "payment.captured",
        "payload": {
            "payment": {
                "entity": {
                    "id": "pay_order_1",
                    "amount": 400000,
                    "order_id": "order_abc",
                    "notes": {}
                }
            }
        }
    })
    .to_string()
    .into_bytes();
    f.reconciliation.handle_event(&body, &sign(&body)).await?;

    let booking = f.booking_repo.find_by_id(f.booking.id).await?.unwrap();
    assert_eq!(booking.payment_status, PaymentStatus::PaidInFull);
    assert_eq!(booking.amount_paid, Decimal::from(4000));
    Ok(())
}

#[tokio::test]
async fn test_unknown_booking_is_acknowledged() -> anyhow::Result<()> {
    let f = setup().await?;

    let body = capture_event("evt_foreign", Uuid::new_v4(), 100000);
    // Possibly another system on the same gateway account; ack, don't 500
    f.reconciliation.handle_event(&body, &sign(&body)).await?;

    let booking = f.booking_repo.find_by_id(f.booking.id).await?.unwrap();
    assert_eq!(booking.payment_status, PaymentStatus::Reserved);
    Ok(())
}

#[tokio::test]
async fn test_unhandled_event_kind_is_ignored() -> anyhow::Result<()> {
    let f = setup().await?;

    let body = json!({
        "id": "evt_refund",
        "event": "refund.processed",
        "payload": {
            "payment": {
                "entity": { "id": "pay_x", "amount": 100, "notes": {} }
            }
        }
    })
    .to_string()
    .into_bytes();
    f.reconciliation.handle_event(&body, &sign(&body)).await?;
    Ok(())
}

#[tokio::test]
async fn test_subscription_purchase_upgrades_organizer() -> anyhow::Result<()> {
    let f = setup().await?;

    let body = json!({
        "id": "evt_sub",
        "event": "payment.captured",
        "payload": {
            "payment": {
                "entity": {
                    "id": "pay_sub_1",
                    "amount": 99900,
                    "notes": {
                        "purchase": "subscription",
                        "organizer_id": f.organizer_id.to_string(),
                        "plan": "monthly"
                    }
                }
            }
        }
    })
    .to_string()
    .into_bytes();
    f.reconciliation.handle_event(&body, &sign(&body)).await?;

    let organizer = f.organizer_repo.find_by_id(f.organizer_id).await?.unwrap();
    assert_eq!(organizer.tier, OrganizerTier::Pro);

    let history = f.organizer_repo.subscription_history(f.organizer_id).await?;
    assert_eq!(history.len(), 1);
    let window = history[0].ends_at - history[0].started_at;
    assert!(window >= Duration::days(28) && window <= Duration::days(31));
    Ok(())
}

#[tokio::test]
async fn test_lead_credit_purchase_tops_up_balance() -> anyhow::Result<()> {
    let f = setup().await?;

    let body = json!({
        "id": "evt_credits",
        "event": "payment.captured",
        "payload": {
            "payment": {
                "entity": {
                    "id": "pay_credits_1",
                    "amount": 50000,
                    "notes": {
                        "purchase": "lead_credits",
                        "organizer_id": f.organizer_id.to_string(),
                        "credits": "25"
                    }
                }
            }
        }
    })
    .to_string()
    .into_bytes();
    f.reconciliation.handle_event(&body, &sign(&body)).await?;

    let organizer = f.organizer_repo.find_by_id(f.organizer_id).await?.unwrap();
    assert_eq!(organizer.lead_credit_balance, 25);
    Ok(())
}

#[tokio::test]
async fn test_capture_converts_referenced_lead() -> anyhow::Result<()> {
    let f = setup().await?;
    let lead = f
        .organizer_repo
        .create_lead(f.organizer_id, "Ravi Prospect", "ravi@example.com")
        .await?;

    let body = json!({
        "id": "evt_lead",
        "event": "payment.captured",
        "payload": {
            "payment": {
                "entity": {
                    "id": "pay_lead_1",
                    "amount": 400000,
                    "notes": {
                        "booking_id": f.booking.id.to_string(),
                        "lead_id": lead.id.to_string()
                    }
                }
            }
        }
    })
    .to_string()
    .into_bytes();
    f.reconciliation.handle_event(&body, &sign(&body)).await?;

    let lead = f.organizer_repo.find_lead(lead.id).await?.unwrap();
    assert_eq!(lead.status, LeadStatus::Converted);
    Ok(())
}

#[tokio::test]
async fn test_missing_secret_refuses_all_events() -> anyhow::Result<()> {
    let f = setup().await?;
    let unconfigured = ReconciliationService::new(f.pool.clone(), String::new());

    let body = capture_event("evt_nosecret", f.booking.id, 400000);
    let err = unconfigured
        .handle_event(&body, &sign(&body))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Internal(_)));
    Ok(())
}
