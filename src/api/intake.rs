use std::sync::Arc;
use tracing::info;
use validator::Validate;

use super::models::{CreateBookingRequest, CreateBookingResponse};
use crate::booking::models::generate_reference;
use crate::booking::BookingStore;
use crate::error::AppResult;
use crate::notifications::{templates, NotificationDispatcher};

/// Turns a form submission into a Pending booking and tells both sides
pub struct BookingIntake {
    store: Arc<dyn BookingStore>,
    notifications: Arc<NotificationDispatcher>,
    team_email: Option<String>,
}

impl BookingIntake {
    pub fn new(
        store: Arc<dyn BookingStore>,
        notifications: Arc<NotificationDispatcher>,
        team_email: Option<String>,
    ) -> Self {
        Self {
            store,
            notifications,
            team_email: team_email.filter(|e| !e.is_empty()),
        }
    }

    pub async fn submit(&self, request: CreateBookingRequest) -> AppResult<CreateBookingResponse> {
        request.validate()?;

        let booking = request.into_new_booking(generate_reference());
        let record = self.store.create(&booking).await?;

        if let Some(team_email) = &self.team_email {
            let review_url = self.store.record_url(&record.id);
            self.notifications.dispatch(templates::team_review_request(
                &booking,
                team_email,
                review_url.as_deref(),
            ));
        }
        self.notifications
            .dispatch(templates::request_received(&booking));

        info!("✅ Booking created: {} → {}", booking.reference, record.id);
        Ok(CreateBookingResponse {
            ok: true,
            booking_id: record.id,
            reference: booking.reference,
        })
    }
}
