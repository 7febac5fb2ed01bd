pub mod booking_service;
pub mod reconciliation_service;
pub mod settlement_service;
pub mod wallet_service;

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::Settings;
use crate::payments::PaymentGateway;
use crate::repository::*;

pub use booking_service::BookingService;
pub use reconciliation_service::ReconciliationService;
pub use settlement_service::SettlementService;
pub use wallet_service::WalletService;

pub struct ServiceContext {
    pub trip_repo: Arc<dyn TripRepository>,
    pub booking_repo: Arc<dyn BookingRepository>,
    pub organizer_repo: Arc<dyn OrganizerRepository>,
    pub user_repo: Arc<dyn UserRepository>,
    pub booking_service: Arc<BookingService>,
    pub reconciliation_service: Arc<ReconciliationService>,
    pub settlement_service: Arc<SettlementService>,
    pub wallet_service: Arc<WalletService>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    pub fn new(
        db_pool: SqlitePool,
        gateway: Arc<dyn PaymentGateway>,
        settings: &Settings,
    ) -> Self {
        let trip_repo: Arc<dyn TripRepository> =
            Arc::new(SqliteTripRepository::new(db_pool.clone()));
        let booking_repo: Arc<dyn BookingRepository> =
            Arc::new(SqliteBookingRepository::new(db_pool.clone()));
        let organizer_repo: Arc<dyn OrganizerRepository> =
            Arc::new(SqliteOrganizerRepository::new(db_pool.clone()));
        let user_repo: Arc<dyn UserRepository> =
            Arc::new(SqliteUserRepository::new(db_pool.clone()));
        let wallet_repo: Arc<dyn WalletRepository> =
            Arc::new(SqliteWalletRepository::new(db_pool.clone()));

        let booking_service = Arc::new(BookingService::new(
            db_pool.clone(),
            booking_repo.clone(),
            gateway,
            settings.booking.clone(),
            settings.gateway.currency.clone(),
        ));

        let reconciliation_service = Arc::new(ReconciliationService::new(
            db_pool.clone(),
            settings
                .gateway
                .webhook_secret
                .clone()
                .unwrap_or_default(),
        ));

        let settlement_service = Arc::new(SettlementService::new(
            booking_repo.clone(),
            trip_repo.clone(),
            organizer_repo.clone(),
            settings.settlement.default_commission_rate,
        ));

        let wallet_service = Arc::new(WalletService::new(wallet_repo));

        Self {
            trip_repo,
            booking_repo,
            organizer_repo,
            user_repo,
            booking_service,
            reconciliation_service,
            settlement_service,
            wallet_service,
            db_pool,
        }
    }
}
