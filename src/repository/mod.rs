use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::*;
use crate::error::{AppError, Result};

pub mod booking_repository;
pub mod organizer_repository;
pub mod trip_repository;
pub mod user_repository;
pub mod wallet_repository;

pub use booking_repository::SqliteBookingRepository;
pub use organizer_repository::SqliteOrganizerRepository;
pub use trip_repository::SqliteTripRepository;
pub use user_repository::SqliteUserRepository;
pub use wallet_repository::SqliteWalletRepository;

#[async_trait]
pub trait TripRepository: Send + Sync {
    async fn create(&self, trip: NewTrip) -> Result<Trip>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Trip>>;
    async fn find_batch(&self, trip_id: Uuid, batch_id: &str) -> Result<Option<Batch>>;
    async fn update_status(&self, id: Uuid, status: TripStatus) -> Result<()>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>>;
    async fn list_by_traveler(&self, traveler_id: Uuid) -> Result<Vec<Booking>>;
    async fn list_by_organizer(&self, organizer_id: Uuid) -> Result<Vec<Booking>>;
    async fn list_all(&self) -> Result<Vec<Booking>>;
}

#[async_trait]
pub trait OrganizerRepository: Send + Sync {
    async fn create(&self, organizer: NewOrganizer) -> Result<Organizer>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Organizer>>;
    async fn subscription_history(&self, organizer_id: Uuid) -> Result<Vec<SubscriptionEntry>>;
    async fn create_lead(&self, organizer_id: Uuid, name: &str, email: &str) -> Result<Lead>;
    async fn find_lead(&self, id: Uuid) -> Result<Option<Lead>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: NewUser) -> Result<User>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
}

#[async_trait]
pub trait WalletRepository: Send + Sync {
    /// Append a signed ledger row and move the materialized balance in
    /// the same transaction.
    async fn apply(&self, user_id: Uuid, amount: Decimal, description: &str)
        -> Result<WalletTransaction>;
    async fn balance_of(&self, user_id: Uuid) -> Result<Decimal>;
    async fn ledger_sum(&self, user_id: Uuid) -> Result<Decimal>;
    async fn history(&self, user_id: Uuid) -> Result<Vec<WalletTransaction>>;
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| AppError::Database(e.to_string()))
}

pub(crate) fn parse_money(s: &str) -> Result<Decimal> {
    s.parse::<Decimal>()
        .map_err(|e| AppError::Database(format!("Invalid decimal '{}': {}", s, e)))
}
