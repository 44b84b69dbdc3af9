use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::booking::models::{BookingPatch, BookingRecord, BookingStatus, NewBooking};
use crate::booking::store::BookingStore;
use crate::error::StoreError;

/// Process-local record store for development (`BOOKING_STORE=memory`) and tests.
/// `set_status` stands in for a reviewer editing the record by hand.
pub struct InMemoryBookingStore {
    records: RwLock<HashMap<String, BookingRecord>>,
    applied: parking_lot::Mutex<Vec<(String, BookingPatch)>>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            applied: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub async fn insert(&self, record: BookingRecord) {
        let mut records = self.records.write().await;
        records.insert(record.id.clone(), record);
    }

    pub async fn set_status(&self, id: &str, status: BookingStatus) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.status = status;
        Ok(())
    }

    /// Every patch applied through `update`, in order
    pub fn applied_patches(&self) -> Vec<(String, BookingPatch)> {
        self.applied.lock().clone()
    }
}

impl Default for InMemoryBookingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn query(&self, statuses: &[BookingStatus]) -> Result<Vec<BookingRecord>, StoreError> {
        let records = self.records.read().await;
        let mut matching: Vec<BookingRecord> = records
            .values()
            .filter(|r| statuses.contains(&r.status))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matching)
    }

    async fn retrieve(&self, id: &str) -> Result<BookingRecord, StoreError> {
        let records = self.records.read().await;
        records
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn update(&self, id: &str, patch: &BookingPatch) -> Result<BookingRecord, StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        record.apply(patch);
        self.applied.lock().push((id.to_string(), patch.clone()));
        debug!("💾 Patched booking {} in memory", id);

        Ok(record.clone())
    }

    async fn create(&self, booking: &NewBooking) -> Result<BookingRecord, StoreError> {
        let record = booking.clone().into_record(Uuid::new_v4().to_string());
        let mut records = self.records.write().await;
        records.insert(record.id.clone(), record.clone());
        Ok(record)
    }
}
