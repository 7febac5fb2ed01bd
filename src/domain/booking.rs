use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A durable reservation against a batch. Created exactly once by the
/// booking engine; afterwards only the payment status, paid amount,
/// gateway ids and the one-time credit flag ever change. Bookings are
/// never deleted; cancellation is a status transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub batch_id: String,
    pub traveler_id: Uuid,
    pub organizer_id: Uuid,
    pub number_of_travelers: i64,
    /// Major currency units.
    pub total_price: Decimal,
    pub amount_paid: Decimal,
    pub payment_status: PaymentStatus,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub ai_credits_granted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentStatus {
    Reserved,
    #[serde(rename = "Paid in Full")]
    PaidInFull,
    Cancelled,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReserveRequest {
    pub trip_id: Uuid,
    pub batch_id: String,
    pub traveler_id: Uuid,
    pub number_of_travelers: i64,
}
