use async_trait::async_trait;

use crate::booking::models::{BookingPatch, BookingRecord, BookingStatus, NewBooking};
use crate::error::StoreError;

/// Adapter over the external, manually-edited record store.
///
/// Every read is authoritative: implementations must not cache records, and
/// `update` must write only the fields set on the patch.
#[async_trait]
pub trait BookingStore: Send + Sync {
    fn name(&self) -> &'static str;

    /// All records whose status is one of `statuses`
    async fn query(&self, statuses: &[BookingStatus]) -> Result<Vec<BookingRecord>, StoreError>;

    async fn retrieve(&self, id: &str) -> Result<BookingRecord, StoreError>;

    async fn update(&self, id: &str, patch: &BookingPatch) -> Result<BookingRecord, StoreError>;

    async fn create(&self, booking: &NewBooking) -> Result<BookingRecord, StoreError>;

    /// Link a reviewer can open to edit the record, when the store has one
    fn record_url(&self, _id: &str) -> Option<String> {
        None
    }
}
