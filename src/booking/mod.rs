pub mod memory;
pub mod models;
pub mod notion;
pub mod store;

pub use memory::InMemoryBookingStore;
pub use models::{BookingPatch, BookingRecord, BookingStatus, NewBooking};
pub use notion::NotionBookingStore;
pub use store::BookingStore;
