use std::collections::HashMap;

use chrono::{Months, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    payments::verify_signature,
};

/// Shape of a gateway webhook delivery. Amounts arrive in minor
/// currency units; `notes` is the opaque metadata map we attached at
/// order creation, echoed back by the gateway.
#[derive(Debug, Deserialize)]
pub struct GatewayEvent {
    pub id: String,
    pub event: String,
    pub payload: EventPayload,
}

#[derive(Debug, Deserialize)]
pub struct EventPayload {
    pub payment: PaymentWrapper,
}

#[derive(Debug, Deserialize)]
pub struct PaymentWrapper {
    pub entity: PaymentEntity,
}

#[derive(Debug, Deserialize)]
pub struct PaymentEntity {
    pub id: String,
    pub amount: i64,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub notes: HashMap<String, String>,
}

/// Applies at-least-once gateway deliveries to booking, lead and
/// organizer state exactly once. Every event is deduplicated through
/// the processed_events table inside the same transaction as its
/// effects: a redelivery finds the row and applies nothing, and a
/// store failure rolls back the dedup row together with any partial
/// effect so the gateway's retry can re-apply cleanly.
pub struct ReconciliationService {
    pool: SqlitePool,
    webhook_secret: String,
}

impl ReconciliationService {
    pub fn new(pool: SqlitePool, webhook_secret: String) -> Self {
        Self {
            pool,
            webhook_secret,
        }
    }

    pub async fn handle_event(&self, raw_body: &[u8], signature: &str) -> Result<()> {
        if self.webhook_secret.is_empty() {
            return Err(AppError::Internal(
                "Gateway webhook secret not configured".to_string(),
            ));
        }
        verify_signature(raw_body, signature, &self.webhook_secret)?;

        let event: GatewayEvent = serde_json::from_slice(raw_body)
            .map_err(|e| AppError::MalformedEvent(e.to_string()))?;

        match event.event.as_str() {
            "payment.captured" | "payment.authorized" => self.apply_capture(&event).await,
            "payment.failed" => self.apply_failure(&event).await,
            other => {
                tracing::debug!("Ignoring unhandled gateway event kind: {}", other);
                Ok(())
            }
        }
    }

    async fn apply_capture(&self, event: &GatewayEvent) -> Result<()> {
        let entity = &event.payload.payment.entity;
        // Minor units to major units, exactly once, here.
        let amount = Decimal::from(entity.amount) / Decimal::from(100);
        let now = Utc::now().naive_utc();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if !mark_processed(&mut tx, &event.id).await? {
            tracing::info!("Gateway event {} already applied, acknowledging replay", event.id);
            return Ok(());
        }

        if let Some(booking_id) = resolve_booking(&mut tx, entity).await? {
            let exists = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM bookings WHERE id = ?",
            )
            .bind(&booking_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

            if exists == 0 {
                // Not an error: the event may belong to another system
                // sharing the gateway account. Ack and move on.
                tracing::warn!(
                    "Gateway event {} references unknown booking {}, ignoring",
                    event.id,
                    booking_id
                );
            } else {
                // Absolute set, not an increment: replays and
                // out-of-order deliveries converge on the same state.
                sqlx::query(
                    r#"
                    UPDATE bookings
                    SET gateway_payment_id = ?,
                        payment_status = 'Paid in Full',
                        amount_paid = ?,
                        updated_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(&entity.id)
                .bind(amount.to_string())
                .bind(now)
                .bind(&booking_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

                tracing::info!(
                    "Booking {} marked Paid in Full ({}) by gateway event {}",
                    booking_id,
                    amount,
                    event.id
                );
            }
        }

        if let Some(lead_id) = entity.notes.get("lead_id") {
            sqlx::query("UPDATE leads SET status = 'Converted', updated_at = ? WHERE id = ?")
                .bind(now)
                .bind(lead_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }

        match entity.notes.get("purchase").map(String::as_str) {
            Some("subscription") => {
                self.apply_subscription(&mut tx, event, &entity.notes).await?;
            }
            Some("lead_credits") => {
                self.apply_lead_credits(&mut tx, event, &entity.notes).await?;
            }
            _ => {}
        }

        tx.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn apply_subscription(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        event: &GatewayEvent,
        notes: &HashMap<String, String>,
    ) -> Result<()> {
        let (Some(organizer_id), Some(plan)) = (notes.get("organizer_id"), notes.get("plan"))
        else {
            tracing::warn!(
                "Gateway event {} is a subscription purchase without organizer_id/plan, ignoring",
                event.id
            );
            return Ok(());
        };

        let started_at = Utc::now();
        let months = match plan.as_str() {
            "monthly" => Months::new(1),
            "annual" => Months::new(12),
            other => {
                tracing::warn!(
                    "Gateway event {} carries unknown subscription plan '{}', ignoring",
                    event.id,
                    other
                );
                return Ok(());
            }
        };
        let ends_at = started_at
            .checked_add_months(months)
            .ok_or_else(|| AppError::Internal("Subscription end date overflow".to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO subscription_history (id, organizer_id, plan, started_at, ends_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(organizer_id)
        .bind(plan)
        .bind(started_at.naive_utc())
        .bind(ends_at.naive_utc())
        .execute(&mut **tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        sqlx::query("UPDATE organizers SET tier = 'pro', updated_at = ? WHERE id = ?")
            .bind(started_at.naive_utc())
            .bind(organizer_id)
            .execute(&mut **tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!(
            "Organizer {} subscribed to pro ({}) until {}",
            organizer_id,
            plan,
            ends_at
        );
        Ok(())
    }

    async fn apply_lead_credits(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        event: &GatewayEvent,
        notes: &HashMap<String, String>,
    ) -> Result<()> {
        let (Some(organizer_id), Some(credits)) = (notes.get("organizer_id"), notes.get("credits"))
        else {
            tracing::warn!(
                "Gateway event {} is a lead-credit purchase without organizer_id/credits, ignoring",
                event.id
            );
            return Ok(());
        };

        let credits: i64 = credits.parse().map_err(|_| {
            AppError::MalformedEvent(format!("Invalid credits amount '{}'", credits))
        })?;

        sqlx::query(
            "UPDATE organizers SET lead_credit_balance = lead_credit_balance + ?, updated_at = ? WHERE id = ?",
        )
        .bind(credits)
        .bind(Utc::now().naive_utc())
        .bind(organizer_id)
        .execute(&mut **tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!("Credited {} leads to organizer {}", credits, organizer_id);
        Ok(())
    }

    async fn apply_failure(&self, event: &GatewayEvent) -> Result<()> {
        let entity = &event.payload.payment.entity;
        let now = Utc::now().naive_utc();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if !mark_processed(&mut tx, &event.id).await? {
            tracing::info!("Gateway event {} already applied, acknowledging replay", event.id);
            return Ok(());
        }

        let Some(booking_id) = resolve_booking(&mut tx, entity).await? else {
            tracing::warn!(
                "payment.failed event {} carries no booking reference, ignoring",
                event.id
            );
            return tx
                .commit()
                .await
                .map_err(|e| AppError::Database(e.to_string()));
        };

        let row = sqlx::query_as::<_, (String, String, String, i64)>(
            "SELECT payment_status, trip_id, batch_id, number_of_travelers FROM bookings WHERE id = ?",
        )
        .bind(&booking_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            None => {
                tracing::warn!(
                    "payment.failed event {} references unknown booking {}, ignoring",
                    event.id,
                    booking_id
                );
            }
            Some((status, _, _, _)) if status == "Cancelled" => {
                tracing::info!("Booking {} already cancelled, nothing to apply", booking_id);
            }
            Some((_, trip_id, batch_id, travelers)) => {
                sqlx::query(
                    "UPDATE bookings SET payment_status = 'Cancelled', gateway_payment_id = ?, updated_at = ? WHERE id = ?",
                )
                .bind(&entity.id)
                .bind(now)
                .bind(&booking_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

                // Confirmed payment failure releases the seats.
                super::booking_service::restore_slots(&mut tx, &trip_id, &batch_id, travelers)
                    .await?;

                tracing::info!(
                    "Booking {} cancelled and {} slot(s) restored by gateway event {}",
                    booking_id,
                    travelers,
                    event.id
                );
            }
        }

        tx.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

/// Booking reference for a payment event: the `booking_id` we attach
/// to order notes, with a lookup through the gateway order id for
/// deliveries where the notes did not survive the round trip.
async fn resolve_booking(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    entity: &PaymentEntity,
) -> Result<Option<String>> {
    if let Some(id) = entity.notes.get("booking_id") {
        return Ok(Some(id.clone()));
    }
    let Some(order_id) = entity.order_id.as_deref() else {
        return Ok(None);
    };
    sqlx::query_scalar::<_, String>("SELECT id FROM bookings WHERE gateway_order_id = ?")
        .bind(order_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

/// Insert the event id into the dedup set. Returns false when the
/// event was applied before; the caller must treat that as an ack.
async fn mark_processed(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    event_id: &str,
) -> Result<bool> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO processed_events (event_id, processed_at) VALUES (?, ?)",
    )
    .bind(event_id)
    .bind(Utc::now().naive_utc())
    .execute(&mut **tx)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(result.rows_affected() > 0)
}
