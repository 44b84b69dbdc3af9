use std::sync::Arc;
use tracing::{info, warn};

use super::processor::{PaymentProcessor, WebhookEvent};
use crate::booking::{BookingPatch, BookingStatus, BookingStore};
use crate::error::{AppResult, SignatureError, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The booking was (re)written as Paid
    Finalized { booking_id: String, reference: String },
    /// Verified, but nothing to apply
    Acknowledged { reason: String },
}

/// Applies verified payment-completion events to the booking store.
///
/// Holds no lock shared with the poller: the only write is the Paid
/// transition, which the poller never touches.
pub struct WebhookFinalizer {
    processor: Arc<dyn PaymentProcessor>,
    store: Arc<dyn BookingStore>,
}

impl WebhookFinalizer {
    pub fn new(processor: Arc<dyn PaymentProcessor>, store: Arc<dyn BookingStore>) -> Self {
        Self { processor, store }
    }

    pub async fn handle(
        &self,
        payload: &[u8],
        signature_header: Option<&str>,
    ) -> AppResult<WebhookOutcome> {
        let header = signature_header.ok_or(SignatureError::MissingHeader)?;

        let event = self
            .processor
            .verify_and_parse(payload, header)
            .map_err(|e| {
                warn!("⚠️ Webhook rejected: {}", e);
                e
            })?;

        let (event_id, session) = match event {
            WebhookEvent::CheckoutCompleted { event_id, session } => (event_id, session),
            WebhookEvent::Other {
                event_id,
                event_type,
            } => {
                info!("📨 Ignoring webhook event {} ({})", event_id, event_type);
                return Ok(WebhookOutcome::Acknowledged {
                    reason: format!("unhandled event type {}", event_type),
                });
            }
        };

        let Some(correlation) = session.correlation else {
            warn!(
                "⚠️ Checkout {} completed without booking metadata (event {})",
                session.session_id, event_id
            );
            return Ok(WebhookOutcome::Acknowledged {
                reason: "no booking metadata".to_string(),
            });
        };

        let record = match self.store.retrieve(&correlation.booking_id).await {
            Ok(record) => record,
            Err(StoreError::NotFound(_)) => {
                warn!(
                    "⚠️ Payment {} references unknown booking {}",
                    session.session_id, correlation.booking_id
                );
                return Ok(WebhookOutcome::Acknowledged {
                    reason: format!("booking {} not found", correlation.booking_id),
                });
            }
            Err(e) => return Err(e.into()),
        };

        if !record.status.can_transition_to(BookingStatus::Paid) {
            warn!(
                "⚠️ Payment received for booking {} in status {}; left unchanged",
                record.reference, record.status
            );
            return Ok(WebhookOutcome::Acknowledged {
                reason: format!("booking is {}", record.status),
            });
        }

        // Replays write the same two values again
        let confirmation_id = session.payment_intent.unwrap_or_default();
        match self
            .store
            .update(&record.id, &BookingPatch::paid(confirmation_id))
            .await
        {
            Ok(_) => {}
            Err(StoreError::NotFound(_)) => {
                warn!(
                    "⚠️ Booking {} vanished before payment {} was recorded",
                    record.reference, session.session_id
                );
                return Ok(WebhookOutcome::Acknowledged {
                    reason: format!("booking {} not found", record.id),
                });
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            "💰 Payment confirmed: {} (event {})",
            record.reference, event_id
        );
        Ok(WebhookOutcome::Finalized {
            booking_id: record.id,
            reference: record.reference,
        })
    }
}
