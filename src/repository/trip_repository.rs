use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Batch, BatchStatus, NewTrip, Trip, TripStatus},
    error::{AppError, Result},
    repository::{parse_money, parse_uuid, TripRepository},
};

#[derive(FromRow)]
struct TripRow {
    id: String,
    organizer_id: String,
    title: String,
    price: String,
    status: String,
    balance_due_days: i32,
    commission_rate_override: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(FromRow)]
pub(crate) struct BatchRow {
    trip_id: String,
    id: String,
    start_date: NaiveDateTime,
    end_date: NaiveDateTime,
    capacity: i64,
    available_slots: i64,
    status: String,
    deal_price: Option<String>,
    version: i64,
    updated_at: NaiveDateTime,
}

pub struct SqliteTripRepository {
    pool: SqlitePool,
}

impl SqliteTripRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_trip(row: TripRow, batches: Vec<Batch>) -> Result<Trip> {
        Ok(Trip {
            id: parse_uuid(&row.id)?,
            organizer_id: parse_uuid(&row.organizer_id)?,
            title: row.title,
            price: parse_money(&row.price)?,
            status: Self::parse_trip_status(&row.status)?,
            balance_due_days: row.balance_due_days,
            commission_rate_override: row
                .commission_rate_override
                .as_deref()
                .map(parse_money)
                .transpose()?,
            batches,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    pub(crate) fn row_to_batch(row: BatchRow) -> Result<Batch> {
        Ok(Batch {
            trip_id: parse_uuid(&row.trip_id)?,
            id: row.id,
            start_date: DateTime::from_naive_utc_and_offset(row.start_date, Utc),
            end_date: DateTime::from_naive_utc_and_offset(row.end_date, Utc),
            capacity: row.capacity,
            available_slots: row.available_slots,
            status: parse_batch_status(&row.status)?,
            deal_price: row.deal_price.as_deref().map(parse_money).transpose()?,
            version: row.version,
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn parse_trip_status(s: &str) -> Result<TripStatus> {
        match s {
            "Draft" => Ok(TripStatus::Draft),
            "Pending" => Ok(TripStatus::Pending),
            "Published" => Ok(TripStatus::Published),
            _ => Err(AppError::Database(format!("Invalid trip status: {}", s))),
        }
    }

    pub(crate) fn trip_status_to_str(status: TripStatus) -> &'static str {
        match status {
            TripStatus::Draft => "Draft",
            TripStatus::Pending => "Pending",
            TripStatus::Published => "Published",
        }
    }

    async fn load_batches(&self, trip_id: &str) -> Result<Vec<Batch>> {
        let rows = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT trip_id, id, start_date, end_date, capacity,
                   available_slots, status, deal_price, version, updated_at
            FROM batches
            WHERE trip_id = ?
            ORDER BY start_date
            "#,
        )
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_batch).collect()
    }
}

pub(crate) fn parse_batch_status(s: &str) -> Result<BatchStatus> {
    match s {
        "Active" => Ok(BatchStatus::Active),
        "Full" => Ok(BatchStatus::Full),
        "Closed" => Ok(BatchStatus::Closed),
        _ => Err(AppError::Database(format!("Invalid batch status: {}", s))),
    }
}

#[async_trait]
impl TripRepository for SqliteTripRepository {
    async fn create(&self, trip: NewTrip) -> Result<Trip> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let now = Utc::now().naive_utc();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO trips (
                id, organizer_id, title, price, status,
                balance_due_days, commission_rate_override,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id_str)
        .bind(trip.organizer_id.to_string())
        .bind(&trip.title)
        .bind(trip.price.to_string())
        .bind(Self::trip_status_to_str(trip.status))
        .bind(trip.balance_due_days)
        .bind(trip.commission_rate_override.map(|d| d.to_string()))
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        for batch in &trip.batches {
            sqlx::query(
                r#"
                INSERT INTO batches (
                    trip_id, id, start_date, end_date, capacity,
                    available_slots, status, deal_price, version, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, 'Active', ?, 0, ?)
                "#,
            )
            .bind(&id_str)
            .bind(&batch.id)
            .bind(batch.start_date.naive_utc())
            .bind(batch.end_date.naive_utc())
            .bind(batch.capacity)
            .bind(batch.capacity)
            .bind(batch.deal_price.map(|d| d.to_string()))
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created trip".to_string()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Trip>> {
        let id_str = id.to_string();
        let row = sqlx::query_as::<_, TripRow>(
            r#"
            SELECT id, organizer_id, title, price, status,
                   balance_due_days, commission_rate_override,
                   created_at, updated_at
            FROM trips
            WHERE id = ?
            "#,
        )
        .bind(&id_str)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => {
                let batches = self.load_batches(&id_str).await?;
                Ok(Some(Self::row_to_trip(r, batches)?))
            }
            None => Ok(None),
        }
    }

    async fn find_batch(&self, trip_id: Uuid, batch_id: &str) -> Result<Option<Batch>> {
        let row = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT trip_id, id, start_date, end_date, capacity,
                   available_slots, status, deal_price, version, updated_at
            FROM batches
            WHERE trip_id = ? AND id = ?
            "#,
        )
        .bind(trip_id.to_string())
        .bind(batch_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_batch(r)?)),
            None => Ok(None),
        }
    }

    async fn update_status(&self, id: Uuid, status: TripStatus) -> Result<()> {
        let result = sqlx::query(
            "UPDATE trips SET status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(Self::trip_status_to_str(status))
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Trip {} not found", id)));
        }
        Ok(())
    }
}
