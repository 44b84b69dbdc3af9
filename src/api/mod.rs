pub mod handler;
pub mod intake;
pub mod models;
pub mod status;

pub use handler::AppState;
pub use intake::BookingIntake;
pub use status::StatusQueryService;
