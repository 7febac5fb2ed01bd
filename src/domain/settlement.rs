use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payout execution is out of scope; every eligible batch is reported
/// with this fixed status.
pub const SETTLEMENT_STATUS_AVAILABLE: &str = "Available for Payout";

/// Derived settlement for one concluded (trip, batch) group. Computed
/// on read from bookings and the parent trip; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSettlement {
    pub trip_id: Uuid,
    pub batch_id: String,
    pub trip_title: String,
    pub organizer_id: Uuid,
    pub batch_end_date: DateTime<Utc>,
    /// Everything collected, cancellations included.
    pub gross_revenue: Decimal,
    /// Booked value of paid-in-full bookings only.
    pub successful_revenue: Decimal,
    pub cancellation_revenue: Decimal,
    pub commission_rate: Decimal,
    pub commission: Decimal,
    pub net_earning: Decimal,
    pub successful_bookings: u64,
    pub cancelled_bookings: u64,
    pub status: &'static str,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettlementFilter {
    /// None means platform-wide.
    pub organizer_id: Option<Uuid>,
    pub status: Option<String>,
}
