use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub organizer_id: Uuid,
    pub title: String,
    /// Per-traveler price in major currency units.
    pub price: Decimal,
    pub status: TripStatus,
    pub balance_due_days: i32,
    /// Trip-level commission override; beats the organizer's rate.
    pub commission_rate_override: Option<Decimal>,
    pub batches: Vec<Batch>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TripStatus {
    Draft,
    Pending,
    Published,
}

/// A scheduled departure of a trip with its own date range and seat
/// capacity. `available_slots` is the authoritative seat count; the
/// `version` column backs optimistic compare-and-swap updates, so two
/// concurrent reservations against the same batch can never both win
/// the same seats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub trip_id: Uuid,
    /// Unique within the trip.
    pub id: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub capacity: i64,
    pub available_slots: i64,
    pub status: BatchStatus,
    pub deal_price: Option<Decimal>,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BatchStatus {
    Active,
    Full,
    Closed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTrip {
    pub organizer_id: Uuid,
    pub title: String,
    pub price: Decimal,
    pub status: TripStatus,
    pub balance_due_days: i32,
    pub commission_rate_override: Option<Decimal>,
    pub batches: Vec<NewBatch>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBatch {
    pub id: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub capacity: i64,
    pub deal_price: Option<Decimal>,
}
