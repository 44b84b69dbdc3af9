use std::sync::Arc;
use tracing::debug;

use super::models::BookingStatusResponse;
use crate::booking::BookingStore;
use crate::error::{AppError, AppResult, StoreError};

/// Read-through status lookup. Nothing is cached; every call hits the store.
pub struct StatusQueryService {
    store: Arc<dyn BookingStore>,
}

impl StatusQueryService {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    pub async fn status(&self, booking_id: &str) -> AppResult<BookingStatusResponse> {
        let record = self.store.retrieve(booking_id).await.map_err(|e| match e {
            StoreError::NotFound(id) => AppError::NotFound(id),
            other => AppError::Store(other),
        })?;

        debug!("🔎 {} is {}", record.reference, record.status);
        Ok(BookingStatusResponse {
            status: record.status.to_string(),
            payment_url: record.payment_session_url.filter(|url| !url.is_empty()),
        })
    }
}
