//! Shared fakes for unit tests

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::booking::{
    BookingPatch, BookingRecord, BookingStatus, BookingStore, InMemoryBookingStore, NewBooking,
};
use crate::config::{Config, StoreBackend};
use crate::error::{NotificationError, PaymentError, SignatureError, StoreError};
use crate::notifications::{Notification, NotificationDispatcher, Notifier, RetryPolicy};
use crate::payments::processor::{parse_event, CheckoutRequest, CheckoutSession, PaymentProcessor, WebhookEvent};
use crate::payments::signature;

pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_fixture";

pub fn sample_record(id: &str, status: BookingStatus) -> BookingRecord {
    BookingRecord {
        id: id.to_string(),
        reference: format!("BK-{}", id.to_uppercase()),
        status,
        email: Some("ada@example.com".to_string()),
        first_name: "Ada".to_string(),
        event_type: "Workshop".to_string(),
        date: "2026-11-02".to_string(),
        start_time: "10:00".to_string(),
        end_time: "12:00".to_string(),
        amount: dec!(150.50),
        payment_session_url: None,
        payment_session_id: None,
        payment_confirmation_id: None,
    }
}

pub fn sample_new_booking() -> NewBooking {
    NewBooking {
        reference: "BK-NEW001".to_string(),
        first_name: "Grace".to_string(),
        last_name: "Hopper".to_string(),
        email: "grace@example.com".to_string(),
        phone: Some("555-0100".to_string()),
        organization: None,
        event_type: "Workshop".to_string(),
        date: "2026-11-02".to_string(),
        start_time: "10:00".to_string(),
        end_time: "12:00".to_string(),
        duration_hours: dec!(2),
        attendees: 12,
        total_amount: dec!(150),
        house_rules_agreed: true,
        sound: None,
        equipment: vec!["Projector".to_string()],
        referral: None,
        description: None,
    }
}

/// Payload of a `checkout.session.completed` event for `booking_id`
pub fn completed_event(booking_id: &str, payment_intent: Option<&str>) -> Vec<u8> {
    json!({
        "id": format!("evt_{}", booking_id),
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": format!("cs_{}", booking_id),
            "payment_intent": payment_intent,
            "metadata": { "booking_id": booking_id, "ref": format!("BK-{}", booking_id.to_uppercase()) }
        }}
    })
    .to_string()
    .into_bytes()
}

/// Current-time `Stripe-Signature` value for `payload` under the test secret
pub fn signed_header(payload: &[u8]) -> String {
    let now = Utc::now().timestamp();
    format!(
        "t={},v1={}",
        now,
        signature::sign(payload, TEST_WEBHOOK_SECRET, now)
    )
}

/// Records what would have been sent. Can fail a number of times first or
/// reject everything.
#[derive(Default)]
pub struct RecordingNotifier {
    attempts: AtomicU32,
    failures_left: AtomicU32,
    reject: bool,
    delivered: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_first(failures: u32) -> Self {
        Self {
            failures_left: AtomicU32::new(failures),
            ..Self::default()
        }
    }

    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().clone()
    }

    /// Yield until `count` notifications went out (dispatch runs on its own task)
    pub async fn wait_for(&self, count: usize) {
        for _ in 0..200 {
            if self.delivered.lock().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, notification: &Notification) -> Result<String, NotificationError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        if self.reject {
            return Err(NotificationError::Rejected {
                status: 422,
                message: "invalid recipient".to_string(),
            });
        }
        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            return Err(NotificationError::Unavailable(format!("attempt {} failed", attempt)));
        }

        self.delivered.lock().push(notification.clone());
        Ok(format!("msg_{}", attempt))
    }
}

pub fn test_dispatcher(notifier: Arc<RecordingNotifier>) -> Arc<NotificationDispatcher> {
    Arc::new(NotificationDispatcher::new(notifier, RetryPolicy::default()))
}

/// Checkout sessions without a network. Webhooks are verified for real
/// against `TEST_WEBHOOK_SECRET`.
#[derive(Default)]
pub struct FakePaymentProcessor {
    requests: Mutex<Vec<CheckoutRequest>>,
    fail_next: AtomicBool,
}

impl FakePaymentProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Every create call, including failed ones
    pub fn requests(&self) -> Vec<CheckoutRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl PaymentProcessor for FakePaymentProcessor {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn create_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession, PaymentError> {
        let n = {
            let mut requests = self.requests.lock();
            requests.push(request.clone());
            requests.len()
        };

        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(PaymentError::Unavailable("processor down".to_string()));
        }

        let id = format!("cs_test_{}", n);
        Ok(CheckoutSession {
            url: format!("https://checkout.stripe.test/c/pay/{}", id),
            id,
        })
    }

    fn verify_and_parse(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookEvent, SignatureError> {
        signature::verify(
            payload,
            signature_header,
            TEST_WEBHOOK_SECRET,
            300,
            Utc::now().timestamp(),
        )?;
        parse_event(payload)
    }
}

/// Store that is always unreachable
pub struct FailingStore;

#[async_trait]
impl BookingStore for FailingStore {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn query(&self, _statuses: &[BookingStatus]) -> Result<Vec<BookingRecord>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn retrieve(&self, _id: &str) -> Result<BookingRecord, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn update(&self, _id: &str, _patch: &BookingPatch) -> Result<BookingRecord, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn create(&self, _booking: &NewBooking) -> Result<BookingRecord, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

/// In-memory store whose reads take `delay`
pub struct SlowStore {
    inner: Arc<InMemoryBookingStore>,
    delay: Duration,
}

impl SlowStore {
    pub fn new(inner: Arc<InMemoryBookingStore>, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl BookingStore for SlowStore {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn query(&self, statuses: &[BookingStatus]) -> Result<Vec<BookingRecord>, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.query(statuses).await
    }

    async fn retrieve(&self, id: &str) -> Result<BookingRecord, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.retrieve(id).await
    }

    async fn update(&self, id: &str, patch: &BookingPatch) -> Result<BookingRecord, StoreError> {
        self.inner.update(id, patch).await
    }

    async fn create(&self, booking: &NewBooking) -> Result<BookingRecord, StoreError> {
        self.inner.create(booking).await
    }
}

/// Memory store, no outbound credentials beyond dummies
pub fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".into(),
        frontend_url: "http://localhost:3000".into(),
        booking_store: StoreBackend::Memory,
        notion_token: None,
        notion_database_id: None,
        notion_api_url: "https://api.notion.com".into(),
        notion_version: "2022-06-28".into(),
        stripe_secret_key: Some("sk_test".into()),
        stripe_webhook_secret: Some(TEST_WEBHOOK_SECRET.into()),
        stripe_api_url: "https://api.stripe.com".into(),
        currency: "usd".into(),
        webhook_tolerance_secs: 300,
        resend_api_key: None,
        from_email: "bookings@localhost".into(),
        team_email: None,
        poll_interval_secs: 15,
        http_timeout_secs: 30,
        notify_max_attempts: 3,
        rate_limit_per_minute: 30,
        database_url: None,
    }
}
