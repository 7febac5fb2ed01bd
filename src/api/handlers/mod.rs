pub mod bookings;
pub mod root;
pub mod settlements;
pub mod wallet;
pub mod webhooks;
