use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    config::BookingConfig,
    domain::{Booking, ReserveRequest},
    error::{AppError, Result},
    payments::{GatewayOrder, PaymentGateway},
    repository::{parse_money, BookingRepository},
};

/// Turns reservation requests into durable bookings while guaranteeing
/// seats are never oversold. The seat decrement and the booking insert
/// land in one transaction; the decrement itself is a versioned
/// compare-and-swap on the batch row, retried with fresh data up to a
/// bounded attempt count when a concurrent writer got there first.
pub struct BookingService {
    pool: SqlitePool,
    booking_repo: Arc<dyn BookingRepository>,
    gateway: Arc<dyn PaymentGateway>,
    config: BookingConfig,
    currency: String,
}

impl BookingService {
    pub fn new(
        pool: SqlitePool,
        booking_repo: Arc<dyn BookingRepository>,
        gateway: Arc<dyn PaymentGateway>,
        config: BookingConfig,
        currency: String,
    ) -> Self {
        Self {
            pool,
            booking_repo,
            gateway,
            config,
            currency,
        }
    }

    pub async fn reserve(&self, request: ReserveRequest) -> Result<Booking> {
        if request.number_of_travelers < 1 {
            return Err(AppError::Validation(
                "number_of_travelers must be at least 1".to_string(),
            ));
        }

        for attempt in 0..self.config.max_reserve_attempts {
            match self.try_reserve(&request).await? {
                ReserveOutcome::Booked(id) => {
                    let booking = self.booking_repo.find_by_id(id).await?.ok_or_else(|| {
                        AppError::Database("Failed to retrieve created booking".to_string())
                    })?;
                    tracing::info!(
                        "Reserved {} slot(s) on trip {} batch {} as booking {}",
                        request.number_of_travelers,
                        request.trip_id,
                        request.batch_id,
                        booking.id
                    );
                    return Ok(booking);
                }
                ReserveOutcome::Contention => {
                    tracing::debug!(
                        "Reservation attempt {} lost a concurrent update on trip {} batch {}, retrying",
                        attempt + 1,
                        request.trip_id,
                        request.batch_id
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                }
            }
        }

        Err(AppError::Conflict(
            "Could not complete booking due to contention, please try again".to_string(),
        ))
    }

    /// Reserve and register a payment order with the gateway. A gateway
    /// failure after the reservation compensates it (slots restored,
    /// booking cancelled) so inventory is never consumed irreversibly
    /// by a payment-side error.
    pub async fn reserve_and_create_order(
        &self,
        request: ReserveRequest,
    ) -> Result<(Booking, GatewayOrder)> {
        let booking = self.reserve(request).await?;

        let mut notes = HashMap::new();
        notes.insert("booking_id".to_string(), booking.id.to_string());
        notes.insert("trip_id".to_string(), booking.trip_id.to_string());
        notes.insert("batch_id".to_string(), booking.batch_id.clone());
        let receipt = format!("bk_{}", booking.id.simple());

        let order = match self
            .gateway
            .create_order(booking.total_price, &self.currency, &receipt, notes)
            .await
        {
            Ok(order) => order,
            Err(e) => {
                tracing::warn!(
                    "Gateway order creation failed for booking {}, compensating reservation: {}",
                    booking.id,
                    e
                );
                self.cancel(booking.id).await?;
                return Err(e);
            }
        };

        sqlx::query("UPDATE bookings SET gateway_order_id = ?, updated_at = ? WHERE id = ?")
            .bind(&order.id)
            .bind(Utc::now().naive_utc())
            .bind(booking.id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let booking = self
            .booking_repo
            .find_by_id(booking.id)
            .await?
            .ok_or_else(|| AppError::Database("Booking disappeared after update".to_string()))?;

        Ok((booking, order))
    }

    /// Cancel a booking and return its seats to the batch. Idempotent:
    /// cancelling an already-cancelled booking is a no-op.
    pub async fn cancel(&self, booking_id: Uuid) -> Result<Booking> {
        let now = Utc::now().naive_utc();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let row = sqlx::query_as::<_, (String, String, String, i64)>(
            "SELECT payment_status, trip_id, batch_id, number_of_travelers FROM bookings WHERE id = ?",
        )
        .bind(booking_id.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let (status, trip_id, batch_id, travelers) = row
            .ok_or_else(|| AppError::NotFound(format!("Booking {} not found", booking_id)))?;

        if status != "Cancelled" {
            sqlx::query("UPDATE bookings SET payment_status = 'Cancelled', updated_at = ? WHERE id = ?")
                .bind(now)
                .bind(booking_id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

            restore_slots(&mut tx, &trip_id, &batch_id, travelers).await?;
            tracing::info!(
                "Cancelled booking {} and restored {} slot(s) to trip {} batch {}",
                booking_id,
                travelers,
                trip_id,
                batch_id
            );
        }

        tx.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        self.booking_repo
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::Database("Booking disappeared after cancel".to_string()))
    }

    /// One-time AI planner credit grant for a booking. The flag flip is
    /// guarded in SQL, so a replayed call returns false and grants
    /// nothing.
    pub async fn grant_ai_credits(&self, booking_id: Uuid) -> Result<bool> {
        let now = Utc::now().naive_utc();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let row = sqlx::query_as::<_, (String, i64)>(
            "SELECT traveler_id, ai_credits_granted FROM bookings WHERE id = ?",
        )
        .bind(booking_id.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let (traveler_id, granted) = row
            .ok_or_else(|| AppError::NotFound(format!("Booking {} not found", booking_id)))?;

        if granted != 0 {
            return Ok(false);
        }

        let result = sqlx::query(
            "UPDATE bookings SET ai_credits_granted = 1, updated_at = ? WHERE id = ? AND ai_credits_granted = 0",
        )
        .bind(now)
        .bind(booking_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query("UPDATE users SET ai_credits = ai_credits + ?, updated_at = ? WHERE id = ?")
            .bind(self.config.ai_credit_amount)
            .bind(now)
            .bind(&traveler_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!(
            "Granted {} AI credits to traveler {} for booking {}",
            self.config.ai_credit_amount,
            traveler_id,
            booking_id
        );
        Ok(true)
    }

    /// One optimistic attempt: read trip and batch, validate, CAS the
    /// slot decrement, insert the booking, commit. A lost CAS race
    /// rolls the whole attempt back.
    async fn try_reserve(&self, request: &ReserveRequest) -> Result<ReserveOutcome> {
        let travelers = request.number_of_travelers;
        let now = Utc::now().naive_utc();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let trip = sqlx::query_as::<_, (String, String, String)>(
            "SELECT price, status, organizer_id FROM trips WHERE id = ?",
        )
        .bind(request.trip_id.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let (price, trip_status, organizer_id) = trip
            .ok_or_else(|| AppError::NotFound(format!("Trip {} not found", request.trip_id)))?;

        if trip_status != "Published" {
            return Err(AppError::Validation(
                "Trip is not open for booking".to_string(),
            ));
        }

        let batch = sqlx::query_as::<_, (i64, i64, String, Option<String>)>(
            "SELECT available_slots, version, status, deal_price FROM batches WHERE trip_id = ? AND id = ?",
        )
        .bind(request.trip_id.to_string())
        .bind(&request.batch_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let (available, version, batch_status, deal_price) = batch.ok_or_else(|| {
            AppError::NotFound(format!(
                "Batch {} not found on trip {}",
                request.batch_id, request.trip_id
            ))
        })?;

        if batch_status == "Closed" {
            return Err(AppError::Validation("Batch is closed".to_string()));
        }

        if available < travelers {
            return Err(AppError::InsufficientSlots {
                requested: travelers,
                available,
            });
        }

        let remaining = available - travelers;
        let new_status = if remaining == 0 { "Full" } else { "Active" };

        let updated = match sqlx::query(
            r#"
            UPDATE batches
            SET available_slots = ?, status = ?, version = version + 1, updated_at = ?
            WHERE trip_id = ? AND id = ? AND version = ?
            "#,
        )
        .bind(remaining)
        .bind(new_status)
        .bind(now)
        .bind(request.trip_id.to_string())
        .bind(&request.batch_id)
        .bind(version)
        .execute(&mut *tx)
        .await
        {
            Ok(result) => result,
            // A concurrent writer holding the write lock, or one that
            // invalidated this transaction's read snapshot, surfaces
            // as a busy error rather than zero rows affected.
            Err(e) if is_busy(&e) => return Ok(ReserveOutcome::Contention),
            Err(e) => return Err(AppError::Database(e.to_string())),
        };

        if updated.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            return Ok(ReserveOutcome::Contention);
        }

        let unit_price = match deal_price {
            Some(ref dp) => parse_money(dp)?,
            None => parse_money(&price)?,
        };
        let total_price = unit_price * Decimal::from(travelers);

        let booking_id = Uuid::new_v4();
        if let Err(e) = sqlx::query(
            r#"
            INSERT INTO bookings (
                id, trip_id, batch_id, traveler_id, organizer_id,
                number_of_travelers, total_price, amount_paid,
                payment_status, ai_credits_granted, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, '0', 'Reserved', 0, ?, ?)
            "#,
        )
        .bind(booking_id.to_string())
        .bind(request.trip_id.to_string())
        .bind(&request.batch_id)
        .bind(request.traveler_id.to_string())
        .bind(&organizer_id)
        .bind(travelers)
        .bind(total_price.to_string())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        {
            if is_busy(&e) {
                return Ok(ReserveOutcome::Contention);
            }
            return Err(AppError::Database(e.to_string()));
        }

        match tx.commit().await {
            Ok(()) => Ok(ReserveOutcome::Booked(booking_id)),
            Err(e) if is_busy(&e) => Ok(ReserveOutcome::Contention),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }
}

enum ReserveOutcome {
    Booked(Uuid),
    Contention,
}

/// SQLITE_BUSY / SQLITE_LOCKED result codes, including the extended
/// variants SQLite reports for busy recovery, shared-cache table locks
/// and stale WAL snapshots. A write failing with one of these lost a
/// race against a concurrent writer and can be retried on fresh data.
fn is_busy(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => matches!(
            db.code().as_deref(),
            Some("5") | Some("6") | Some("261") | Some("262") | Some("517")
        ),
        _ => false,
    }
}

/// Return seats to a batch, flipping Full back to Active. Used by the
/// cancellation path here and the failed-payment path in
/// reconciliation, always inside the caller's transaction.
pub(crate) async fn restore_slots(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    trip_id: &str,
    batch_id: &str,
    travelers: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE batches
        SET available_slots = available_slots + ?,
            status = CASE WHEN status = 'Full' THEN 'Active' ELSE status END,
            version = version + 1,
            updated_at = ?
        WHERE trip_id = ? AND id = ?
        "#,
    )
    .bind(travelers)
    .bind(Utc::now().naive_utc())
    .bind(trip_id)
    .bind(batch_id)
    .execute(&mut **tx)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(())
}
