use std::sync::Arc;
use tracing::info;

use crate::booking::{BookingRecord, BookingStatus};
use crate::error::{AppError, AppResult};
use crate::notifications::{templates, NotificationDispatcher};

/// Sends the denial notice for a Denied booking. Never writes to the store.
pub struct DenialNotifier {
    notifications: Arc<NotificationDispatcher>,
}

impl DenialNotifier {
    pub fn new(notifications: Arc<NotificationDispatcher>) -> Self {
        Self { notifications }
    }

    pub fn notify(&self, record: &BookingRecord) -> AppResult<()> {
        if record.status != BookingStatus::Denied {
            return Err(AppError::Validation(format!(
                "booking {} is {}, not Denied",
                record.id, record.status
            )));
        }
        let email = record
            .email
            .as_deref()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AppError::Validation(format!("booking {} has no email", record.id)))?;

        self.notifications
            .dispatch(templates::booking_denied(record, email));
        info!("📧 Denial sent: {}", record.reference);
        Ok(())
    }
}
