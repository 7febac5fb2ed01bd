use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Booking, PaymentStatus},
    error::{AppError, Result},
    repository::{parse_money, parse_uuid, BookingRepository},
};

#[derive(FromRow)]
struct BookingRow {
    id: String,
    trip_id: String,
    batch_id: String,
    traveler_id: String,
    organizer_id: String,
    number_of_travelers: i64,
    total_price: String,
    amount_paid: String,
    payment_status: String,
    gateway_order_id: Option<String>,
    gateway_payment_id: Option<String>,
    ai_credits_granted: i64,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

const BOOKING_COLUMNS: &str = r#"
    id, trip_id, batch_id, traveler_id, organizer_id,
    number_of_travelers, total_price, amount_paid, payment_status,
    gateway_order_id, gateway_payment_id, ai_credits_granted,
    created_at, updated_at
"#;

pub struct SqliteBookingRepository {
    pool: SqlitePool,
}

impl SqliteBookingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_booking(row: BookingRow) -> Result<Booking> {
        Ok(Booking {
            id: parse_uuid(&row.id)?,
            trip_id: parse_uuid(&row.trip_id)?,
            batch_id: row.batch_id,
            traveler_id: parse_uuid(&row.traveler_id)?,
            organizer_id: parse_uuid(&row.organizer_id)?,
            number_of_travelers: row.number_of_travelers,
            total_price: parse_money(&row.total_price)?,
            amount_paid: parse_money(&row.amount_paid)?,
            payment_status: parse_payment_status(&row.payment_status)?,
            gateway_order_id: row.gateway_order_id,
            gateway_payment_id: row.gateway_payment_id,
            ai_credits_granted: row.ai_credits_granted != 0,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }
}

pub(crate) fn parse_payment_status(s: &str) -> Result<PaymentStatus> {
    match s {
        "Reserved" => Ok(PaymentStatus::Reserved),
        "Paid in Full" => Ok(PaymentStatus::PaidInFull),
        "Cancelled" => Ok(PaymentStatus::Cancelled),
        _ => Err(AppError::Database(format!("Invalid payment status: {}", s))),
    }
}

#[async_trait]
impl BookingRepository for SqliteBookingRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE id = ?",
            BOOKING_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_booking(r)?)),
            None => Ok(None),
        }
    }

    async fn list_by_traveler(&self, traveler_id: Uuid) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE traveler_id = ? ORDER BY created_at DESC",
            BOOKING_COLUMNS
        ))
        .bind(traveler_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }

    async fn list_by_organizer(&self, organizer_id: Uuid) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE organizer_id = ? ORDER BY created_at DESC",
            BOOKING_COLUMNS
        ))
        .bind(organizer_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }

    async fn list_all(&self) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings ORDER BY created_at DESC",
            BOOKING_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }
}
