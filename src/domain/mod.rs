pub mod booking;
pub mod organizer;
pub mod settlement;
pub mod trip;
pub mod wallet;

pub use booking::*;
pub use organizer::*;
pub use settlement::*;
pub use trip::*;
pub use wallet::*;
