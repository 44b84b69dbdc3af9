use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::denial::DenialNotifier;
use super::ledger::{DispatchOutcome, IdempotencyGuard, TransitionKind};
use crate::booking::{BookingRecord, BookingStatus, BookingStore};
use crate::error::AppResult;
use crate::payments::PaymentSessionInitiator;

/// Statuses the poller reacts to
const WATCHED: [BookingStatus; 2] = [BookingStatus::Approved, BookingStatus::Denied];

/// Summary of one poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub examined: usize,
    pub dispatched: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Another cycle held the guard; nothing was examined
    pub overlapped: bool,
}

/// Watches the record store for reviewer decisions and fires the matching
/// side effect once per booking.
///
/// Every booking is claimed in the ledger before its side effect runs, and a
/// claim is never released, so a failed dispatch is not retried here.
pub struct StatusPoller {
    store: Arc<dyn BookingStore>,
    guard: Arc<IdempotencyGuard>,
    sessions: Arc<PaymentSessionInitiator>,
    denial: Arc<DenialNotifier>,
    interval: Duration,
    in_flight: Mutex<()>,
}

impl StatusPoller {
    pub fn new(
        store: Arc<dyn BookingStore>,
        guard: Arc<IdempotencyGuard>,
        sessions: Arc<PaymentSessionInitiator>,
        denial: Arc<DenialNotifier>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            guard,
            sessions,
            denial,
            interval,
            in_flight: Mutex::new(()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Spawn the poll loop. Each tick runs as its own task so a slow cycle
    /// shows up as an overlap instead of silently delaying the schedule.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "⏰ Status poller started (every {}s, {} ledger)",
                self.interval().as_secs(),
                if self.guard.is_durable() { "durable" } else { "in-memory" }
            );

            let mut ticker = interval(self.interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let poller = self.clone();
                tokio::spawn(async move {
                    poller.run_cycle().await;
                });
            }
        })
    }

    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        let Ok(_flight) = self.in_flight.try_lock() else {
            warn!("⚠️ Previous poll cycle still running; skipping this tick");
            report.overlapped = true;
            return report;
        };

        let records = match self.store.query(&WATCHED).await {
            Ok(records) => records,
            Err(e) => {
                error!("❌ Poll query failed, retrying next tick: {}", e);
                return report;
            }
        };

        for record in &records {
            report.examined += 1;
            match self.reconcile(record).await {
                Ok(true) => report.dispatched += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    error!("❌ Error processing {}: {}", record.id, e);
                    self.guard
                        .settle(&record.id, DispatchOutcome::Failed(e.to_string()))
                        .await;
                    report.failed += 1;
                }
            }
        }

        if report.dispatched > 0 || report.failed > 0 {
            info!(
                "🔄 Poll cycle: {} examined, {} dispatched, {} skipped, {} failed",
                report.examined, report.dispatched, report.skipped, report.failed
            );
        } else {
            debug!("🔄 Poll cycle: {} examined, nothing to do", report.examined);
        }

        report
    }

    /// Ok(true) when a side effect ran for the record
    async fn reconcile(&self, record: &BookingRecord) -> AppResult<bool> {
        if record.has_payment_session() {
            return Ok(false);
        }

        let transition = match record.status {
            BookingStatus::Approved => TransitionKind::Approved,
            BookingStatus::Denied => TransitionKind::Denied,
            BookingStatus::Pending | BookingStatus::Paid => return Ok(false),
        };

        if !self.guard.claim(&record.id, transition).await? {
            return Ok(false);
        }

        if record.email.as_deref().map_or(true, str::is_empty) {
            warn!("⚠️ No email for {}; nothing to send", record.reference);
            self.guard
                .settle(&record.id, DispatchOutcome::Failed("no contact email".into()))
                .await;
            return Ok(false);
        }

        match transition {
            TransitionKind::Approved => {
                self.sessions.initiate(record).await?;
            }
            TransitionKind::Denied => self.denial.notify(record)?,
        }

        self.guard.settle(&record.id, DispatchOutcome::Succeeded).await;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::InMemoryBookingStore;
    use crate::reconcile::ledger::{DispatchLedger, InMemoryDispatchLedger};
    use crate::testing::{
        sample_record, test_dispatcher, FailingStore, FakePaymentProcessor, RecordingNotifier,
        SlowStore,
    };

    const INTERVAL: Duration = Duration::from_secs(15);

    struct Fixture {
        store: Arc<InMemoryBookingStore>,
        ledger: Arc<InMemoryDispatchLedger>,
        processor: Arc<FakePaymentProcessor>,
        notifier: Arc<RecordingNotifier>,
        poller: Arc<StatusPoller>,
    }

    fn poller_over(
        store: Arc<dyn BookingStore>,
        ledger: Arc<InMemoryDispatchLedger>,
        processor: Arc<FakePaymentProcessor>,
        notifier: Arc<RecordingNotifier>,
    ) -> Arc<StatusPoller> {
        let dispatcher = test_dispatcher(notifier);
        let sessions = Arc::new(PaymentSessionInitiator::new(
            processor,
            store.clone(),
            dispatcher.clone(),
            "http://localhost:3000".into(),
            "usd".into(),
        ));
        Arc::new(StatusPoller::new(
            store,
            Arc::new(IdempotencyGuard::new(ledger)),
            sessions,
            Arc::new(DenialNotifier::new(dispatcher)),
            INTERVAL,
        ))
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryBookingStore::new());
        let ledger = Arc::new(InMemoryDispatchLedger::new());
        let processor = Arc::new(FakePaymentProcessor::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let poller = poller_over(store.clone(), ledger.clone(), processor.clone(), notifier.clone());
        Fixture {
            store,
            ledger,
            processor,
            notifier,
            poller,
        }
    }

    #[tokio::test]
    async fn test_pending_and_paid_never_dispatched() {
        let f = fixture();
        f.store.insert(sample_record("a", BookingStatus::Pending)).await;
        f.store.insert(sample_record("b", BookingStatus::Paid)).await;

        let report = f.poller.run_cycle().await;

        assert_eq!(report.examined, 0);
        assert!(f.processor.requests().is_empty());
        assert_eq!(f.ledger.len(), 0);
    }

    #[tokio::test]
    async fn test_record_with_session_is_skipped() {
        let f = fixture();
        let mut record = sample_record("a", BookingStatus::Approved);
        record.payment_session_url = Some("https://checkout.example/cs_old".into());
        f.store.insert(record).await;

        let report = f.poller.run_cycle().await;

        assert_eq!(report.skipped, 1);
        assert_eq!(report.dispatched, 0);
        assert!(f.processor.requests().is_empty());
        assert!(f.store.applied_patches().is_empty());
    }

    #[tokio::test]
    async fn test_approval_creates_one_session_across_cycles() {
        let f = fixture();
        f.store.insert(sample_record("a", BookingStatus::Approved)).await;
        f.store.insert(sample_record("d", BookingStatus::Denied)).await;

        let first = f.poller.run_cycle().await;
        let second = f.poller.run_cycle().await;

        assert_eq!(first.dispatched, 2);
        assert_eq!(second.dispatched, 0);
        assert_eq!(second.skipped, 2);
        assert_eq!(f.processor.requests().len(), 1);

        f.notifier.wait_for(2).await;
        assert_eq!(f.notifier.delivered().len(), 2);

        let approved = f.ledger.entry("a").await.unwrap().unwrap();
        assert_eq!(approved.outcome, DispatchOutcome::Succeeded);
        assert_eq!(approved.transition, TransitionKind::Approved);
        // Denials never write to the store
        assert!(f.store.applied_patches().iter().all(|(id, _)| id == "a"));
    }

    #[tokio::test]
    async fn test_dispatch_failure_stays_claimed() {
        let f = fixture();
        f.processor.fail_next();
        f.store.insert(sample_record("a", BookingStatus::Approved)).await;

        let first = f.poller.run_cycle().await;
        let second = f.poller.run_cycle().await;

        assert_eq!(first.failed, 1);
        assert_eq!(second.skipped, 1);
        assert_eq!(f.processor.requests().len(), 1);
        assert!(matches!(
            f.ledger.entry("a").await.unwrap().unwrap().outcome,
            DispatchOutcome::Failed(_)
        ));
        assert!(!f.store.retrieve("a").await.unwrap().has_payment_session());
    }

    #[tokio::test]
    async fn test_missing_email_is_claimed_and_skipped() {
        let f = fixture();
        let mut record = sample_record("a", BookingStatus::Approved);
        record.email = None;
        f.store.insert(record).await;

        let report = f.poller.run_cycle().await;

        assert_eq!(report.skipped, 1);
        assert!(f.ledger.entry("a").await.unwrap().is_some());
        assert!(f.processor.requests().is_empty());
        assert_eq!(f.notifier.attempts(), 0);
    }

    #[tokio::test]
    async fn test_query_failure_aborts_cycle() {
        let ledger = Arc::new(InMemoryDispatchLedger::new());
        let processor = Arc::new(FakePaymentProcessor::new());
        let poller = poller_over(
            Arc::new(FailingStore),
            ledger.clone(),
            processor.clone(),
            Arc::new(RecordingNotifier::new()),
        );

        let report = poller.run_cycle().await;

        assert_eq!(report, CycleReport::default());
        assert_eq!(ledger.len(), 0);
        assert!(processor.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_cycle_is_skipped() {
        let inner = Arc::new(InMemoryBookingStore::new());
        inner.insert(sample_record("a", BookingStatus::Approved)).await;
        let processor = Arc::new(FakePaymentProcessor::new());
        let poller = poller_over(
            Arc::new(SlowStore::new(inner, Duration::from_secs(5))),
            Arc::new(InMemoryDispatchLedger::new()),
            processor.clone(),
            Arc::new(RecordingNotifier::new()),
        );

        let (first, second) = tokio::join!(poller.run_cycle(), poller.run_cycle());

        assert!(!first.overlapped);
        assert_eq!(first.dispatched, 1);
        assert!(second.overlapped);
        assert_eq!(second.examined, 0);
        assert_eq!(processor.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_approval_observed_within_one_interval() {
        let f = fixture();
        f.store.insert(sample_record("a", BookingStatus::Pending)).await;

        let handle = f.poller.clone().start();
        // First tick fires immediately and sees only Pending
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(f.processor.requests().is_empty());

        f.store.set_status("a", BookingStatus::Approved).await.unwrap();
        tokio::time::sleep(INTERVAL + Duration::from_millis(100)).await;

        let record = f.store.retrieve("a").await.unwrap();
        assert!(record.has_payment_session());
        assert_eq!(record.status, BookingStatus::Approved);

        f.notifier.wait_for(1).await;
        assert_eq!(f.notifier.delivered()[0].to, "ada@example.com");

        handle.abort();
    }
}
