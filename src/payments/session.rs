use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;
use tracing::{error, info};

use super::processor::{CheckoutRequest, CheckoutSession, PaymentProcessor, SessionCorrelation};
use crate::booking::{BookingPatch, BookingRecord, BookingStatus, BookingStore};
use crate::error::{AppError, AppResult, PaymentError};
use crate::notifications::{templates, NotificationDispatcher};

/// Decimal amount to integer minor units (cents), rounding halves away from zero
pub fn to_minor_units(amount: Decimal) -> Result<i64, PaymentError> {
    if amount <= Decimal::ZERO {
        return Err(PaymentError::InvalidAmount(format!(
            "amount must be positive, got {}",
            amount
        )));
    }

    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|minor| minor.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|minor| minor.to_i64())
        .ok_or_else(|| PaymentError::InvalidAmount(format!("amount {} is out of range", amount)))
}

/// Opens a checkout session for an approved booking and writes the session
/// reference back onto the record.
pub struct PaymentSessionInitiator {
    processor: Arc<dyn PaymentProcessor>,
    store: Arc<dyn BookingStore>,
    notifications: Arc<NotificationDispatcher>,
    frontend_url: String,
    currency: String,
}

impl PaymentSessionInitiator {
    pub fn new(
        processor: Arc<dyn PaymentProcessor>,
        store: Arc<dyn BookingStore>,
        notifications: Arc<NotificationDispatcher>,
        frontend_url: String,
        currency: String,
    ) -> Self {
        Self {
            processor,
            store,
            notifications,
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
            currency,
        }
    }

    fn checkout_request(&self, record: &BookingRecord, email: &str) -> AppResult<CheckoutRequest> {
        Ok(CheckoutRequest {
            amount_minor: to_minor_units(record.amount)?,
            currency: self.currency.clone(),
            product_name: format!("Space Rental — {}", record.event_type),
            description: format!("{} | Ref: {}", record.schedule_summary(), record.reference),
            correlation: SessionCorrelation {
                booking_id: record.id.clone(),
                reference: record.reference.clone(),
            },
            success_url: format!("{}/booking-confirmed?ref={}", self.frontend_url, record.reference),
            cancel_url: format!("{}/booking-cancelled", self.frontend_url),
            customer_email: email.to_string(),
        })
    }

    pub async fn initiate(&self, record: &BookingRecord) -> AppResult<CheckoutSession> {
        if record.status != BookingStatus::Approved {
            return Err(AppError::Validation(format!(
                "booking {} is {}, not Approved",
                record.id, record.status
            )));
        }
        if record.has_payment_session() {
            return Err(AppError::Validation(format!(
                "booking {} already has a payment session",
                record.id
            )));
        }
        let email = record
            .email
            .as_deref()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AppError::Validation(format!("booking {} has no email", record.id)))?;

        let request = self.checkout_request(record, email)?;
        let session = self.processor.create_session(&request).await?;

        // Only the two session fields are written; Status stays Approved
        if let Err(e) = self
            .store
            .update(&record.id, &BookingPatch::payment_session(&session.url, &session.id))
            .await
        {
            error!(
                "❌ Session {} created for {} but write-back failed: {}",
                session.id, record.reference, e
            );
            return Err(e.into());
        }

        self.notifications
            .dispatch(templates::booking_approved(record, email, &session.url));

        info!("✅ Approved & payment link sent: {}", record.reference);
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::InMemoryBookingStore;
    use crate::testing::{sample_record, test_dispatcher, FakePaymentProcessor, RecordingNotifier};
    use rust_decimal_macros::dec;

    #[test]
    fn test_minor_unit_rounding() {
        assert_eq!(to_minor_units(dec!(75)).unwrap(), 7500);
        assert_eq!(to_minor_units(dec!(12.345)).unwrap(), 1235);
        assert_eq!(to_minor_units(dec!(12.344)).unwrap(), 1234);
        assert_eq!(to_minor_units(dec!(0.005)).unwrap(), 1);
        assert_eq!(to_minor_units(dec!(150.5)).unwrap(), 15050);
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        assert!(matches!(to_minor_units(Decimal::ZERO), Err(PaymentError::InvalidAmount(_))));
        assert!(matches!(to_minor_units(dec!(-10)), Err(PaymentError::InvalidAmount(_))));
    }

    struct Fixture {
        store: Arc<InMemoryBookingStore>,
        processor: Arc<FakePaymentProcessor>,
        notifier: Arc<RecordingNotifier>,
        initiator: PaymentSessionInitiator,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryBookingStore::new());
        let processor = Arc::new(FakePaymentProcessor::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let initiator = PaymentSessionInitiator::new(
            processor.clone(),
            store.clone(),
            test_dispatcher(notifier.clone()),
            "http://localhost:3000/".into(),
            "usd".into(),
        );
        Fixture {
            store,
            processor,
            notifier,
            initiator,
        }
    }

    #[tokio::test]
    async fn test_initiate_writes_back_only_session_fields() {
        let f = fixture();
        let record = sample_record("rec-1", BookingStatus::Approved);
        f.store.insert(record.clone()).await;

        let session = f.initiator.initiate(&record).await.unwrap();

        let stored = f.store.retrieve("rec-1").await.unwrap();
        assert_eq!(stored.status, BookingStatus::Approved);
        assert_eq!(stored.payment_session_url.as_deref(), Some(session.url.as_str()));
        assert_eq!(stored.payment_session_id.as_deref(), Some(session.id.as_str()));
        assert_eq!(
            f.store.applied_patches(),
            vec![(
                "rec-1".to_string(),
                BookingPatch::payment_session(&session.url, &session.id)
            )]
        );

        let requests = f.processor.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].amount_minor, 15050);
        assert_eq!(requests[0].correlation.booking_id, "rec-1");
        assert_eq!(
            requests[0].success_url,
            format!("http://localhost:3000/booking-confirmed?ref={}", record.reference)
        );
        assert_eq!(requests[0].cancel_url, "http://localhost:3000/booking-cancelled");

        f.notifier.wait_for(1).await;
        let sent = f.notifier.delivered();
        assert_eq!(sent[0].to, "ada@example.com");
        assert!(sent[0].html.contains(&session.url));
    }

    #[tokio::test]
    async fn test_initiate_rejects_non_approved_and_missing_email() {
        let f = fixture();

        let pending = sample_record("rec-1", BookingStatus::Pending);
        assert!(matches!(
            f.initiator.initiate(&pending).await,
            Err(AppError::Validation(_))
        ));

        let mut no_email = sample_record("rec-2", BookingStatus::Approved);
        no_email.email = None;
        assert!(matches!(
            f.initiator.initiate(&no_email).await,
            Err(AppError::Validation(_))
        ));

        let mut free = sample_record("rec-3", BookingStatus::Approved);
        free.amount = Decimal::ZERO;
        assert!(matches!(
            f.initiator.initiate(&free).await,
            Err(AppError::Payment(PaymentError::InvalidAmount(_)))
        ));

        assert!(f.processor.requests().is_empty());
    }

    #[tokio::test]
    async fn test_processor_failure_propagates_without_write() {
        let f = fixture();
        f.processor.fail_next();
        let record = sample_record("rec-1", BookingStatus::Approved);
        f.store.insert(record.clone()).await;

        let result = f.initiator.initiate(&record).await;

        assert!(matches!(result, Err(AppError::Payment(_))));
        assert!(f.store.applied_patches().is_empty());
        assert!(f.notifier.delivered().is_empty());
    }
}
