use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    domain::{
        BatchSettlement, Booking, Organizer, PaymentStatus, SettlementFilter, Trip,
        SETTLEMENT_STATUS_AVAILABLE,
    },
    error::Result,
    repository::{BookingRepository, OrganizerRepository, TripRepository},
};

/// Computes, on demand, what each organizer is owed per concluded
/// (trip, batch) group. Pure aggregation over persisted bookings and
/// trips; nothing here is written back. The default commission rate is
/// injected at construction rather than read from settings
/// mid-computation.
pub struct SettlementService {
    booking_repo: Arc<dyn BookingRepository>,
    trip_repo: Arc<dyn TripRepository>,
    organizer_repo: Arc<dyn OrganizerRepository>,
    default_commission_rate: Decimal,
}

impl SettlementService {
    pub fn new(
        booking_repo: Arc<dyn BookingRepository>,
        trip_repo: Arc<dyn TripRepository>,
        organizer_repo: Arc<dyn OrganizerRepository>,
        default_commission_rate: Decimal,
    ) -> Self {
        Self {
            booking_repo,
            trip_repo,
            organizer_repo,
            default_commission_rate,
        }
    }

    pub async fn compute_settlements(
        &self,
        filter: SettlementFilter,
    ) -> Result<Vec<BatchSettlement>> {
        let bookings = match filter.organizer_id {
            Some(organizer_id) => self.booking_repo.list_by_organizer(organizer_id).await?,
            None => self.booking_repo.list_all().await?,
        };

        let mut groups: HashMap<(Uuid, String), Vec<Booking>> = HashMap::new();
        for booking in bookings {
            groups
                .entry((booking.trip_id, booking.batch_id.clone()))
                .or_default()
                .push(booking);
        }

        let mut trips: HashMap<Uuid, Option<Trip>> = HashMap::new();
        let mut organizers: HashMap<Uuid, Option<Organizer>> = HashMap::new();
        let now = Utc::now();
        let mut settlements = Vec::new();

        for ((trip_id, batch_id), group) in groups {
            // One corrupt group must not block the whole report, so
            // missing trips/batches are skipped with a warning.
            let trip = match self.trip(&mut trips, trip_id).await? {
                Some(trip) => trip,
                None => {
                    tracing::warn!(
                        "Skipping settlement group for missing trip {} (batch {})",
                        trip_id,
                        batch_id
                    );
                    continue;
                }
            };

            let Some(batch) = trip.batches.iter().find(|b| b.id == batch_id) else {
                tracing::warn!(
                    "Skipping settlement group for missing batch {} on trip {}",
                    batch_id,
                    trip_id
                );
                continue;
            };

            // Hard eligibility filter: only concluded batches settle.
            if batch.end_date > now {
                continue;
            }

            let mut gross_revenue = Decimal::ZERO;
            let mut successful_revenue = Decimal::ZERO;
            let mut successful_bookings = 0u64;
            let mut cancelled_bookings = 0u64;

            for booking in &group {
                // Cancellations that retained partial payment still
                // count toward gross.
                gross_revenue += booking.amount_paid;
                match booking.payment_status {
                    PaymentStatus::PaidInFull => {
                        successful_revenue += booking.total_price;
                        successful_bookings += 1;
                    }
                    PaymentStatus::Cancelled => cancelled_bookings += 1,
                    PaymentStatus::Reserved => {}
                }
            }

            let commission_rate = match trip.commission_rate_override {
                Some(rate) => rate,
                None => self
                    .organizer(&mut organizers, trip.organizer_id)
                    .await?
                    .and_then(|o| o.commission_rate)
                    .unwrap_or(self.default_commission_rate),
            };

            let commission = successful_revenue * commission_rate / Decimal::from(100);
            let net_earning = successful_revenue - commission;
            let cancellation_revenue = gross_revenue - successful_revenue;

            settlements.push(BatchSettlement {
                trip_id,
                batch_id,
                trip_title: trip.title.clone(),
                organizer_id: trip.organizer_id,
                batch_end_date: batch.end_date,
                gross_revenue,
                successful_revenue,
                cancellation_revenue,
                commission_rate,
                commission,
                net_earning,
                successful_bookings,
                cancelled_bookings,
                status: SETTLEMENT_STATUS_AVAILABLE,
            });
        }

        if let Some(ref status) = filter.status {
            settlements.retain(|s| s.status == status.as_str());
        }

        settlements.sort_by(|a, b| b.batch_end_date.cmp(&a.batch_end_date));
        Ok(settlements)
    }

    async fn trip(
        &self,
        cache: &mut HashMap<Uuid, Option<Trip>>,
        trip_id: Uuid,
    ) -> Result<Option<Trip>> {
        if !cache.contains_key(&trip_id) {
            let trip = self.trip_repo.find_by_id(trip_id).await?;
            cache.insert(trip_id, trip);
        }
        Ok(cache.get(&trip_id).cloned().flatten())
    }

    async fn organizer(
        &self,
        cache: &mut HashMap<Uuid, Option<Organizer>>,
        organizer_id: Uuid,
    ) -> Result<Option<Organizer>> {
        if !cache.contains_key(&organizer_id) {
            let organizer = self.organizer_repo.find_by_id(organizer_id).await?;
            cache.insert(organizer_id, organizer);
        }
        Ok(cache.get(&organizer_id).cloned().flatten())
    }
}
