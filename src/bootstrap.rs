use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

use crate::{
    api::{AppState, BookingIntake, StatusQueryService},
    booking::{BookingStore, InMemoryBookingStore, NotionBookingStore},
    config::{Config, StoreBackend},
    error::{AppError, AppResult},
    notifications::{LogNotifier, NotificationDispatcher, Notifier, ResendEmailClient, RetryPolicy},
    payments::{PaymentProcessor, PaymentSessionInitiator, StripeClient, WebhookFinalizer},
    reconcile::{
        DenialNotifier, DispatchLedger, IdempotencyGuard, InMemoryDispatchLedger,
        PgDispatchLedger, StatusPoller,
    },
};

/// Everything `main` needs: HTTP state plus the poller to spawn
pub struct Application {
    pub state: AppState,
    pub poller: Arc<StatusPoller>,
}

pub async fn initialize_app(config: &Config) -> AppResult<Application> {
    info!("Initializing application components ...");

    let store = initialize_store(config)?;
    info!("✅ Booking store: {}", store.name());

    let processor: Arc<dyn PaymentProcessor> = Arc::new(StripeClient::new(
        config.stripe_api_url.clone(),
        required(&config.stripe_secret_key, "STRIPE_SECRET_KEY")?,
        required(&config.stripe_webhook_secret, "STRIPE_WEBHOOK_SECRET")?,
        config.webhook_tolerance_secs,
        config.http_timeout(),
    )?);
    info!("✅ Payment processor: {}", processor.name());

    let notifier: Arc<dyn Notifier> = match &config.resend_api_key {
        Some(key) if !key.is_empty() => Arc::new(ResendEmailClient::new(
            key.clone(),
            config.from_email.clone(),
            config.http_timeout(),
        )?),
        _ => {
            warn!("⚠️  RESEND_API_KEY not set - emails will only be logged");
            Arc::new(LogNotifier)
        }
    };
    let notifications = Arc::new(NotificationDispatcher::new(
        notifier,
        RetryPolicy::with_max_attempts(config.notify_max_attempts),
    ));
    info!("✅ Notifications via {}", notifications.notifier_name());

    let ledger = initialize_ledger(config).await?;
    let durable_ledger = ledger.is_durable();
    let guard = Arc::new(IdempotencyGuard::new(ledger));

    let sessions = Arc::new(PaymentSessionInitiator::new(
        processor.clone(),
        store.clone(),
        notifications.clone(),
        config.frontend_url.clone(),
        config.currency.clone(),
    ));
    let denial = Arc::new(DenialNotifier::new(notifications.clone()));

    let poller = Arc::new(StatusPoller::new(
        store.clone(),
        guard,
        sessions,
        denial,
        config.poll_interval(),
    ));

    let state = AppState {
        intake: Arc::new(BookingIntake::new(
            store.clone(),
            notifications,
            config.team_email.clone(),
        )),
        status: Arc::new(StatusQueryService::new(store.clone())),
        webhooks: Arc::new(WebhookFinalizer::new(processor, store)),
        poll_interval_secs: config.poll_interval_secs,
        durable_ledger,
    };

    Ok(Application { state, poller })
}

fn required(value: &Option<String>, key: &str) -> AppResult<String> {
    value
        .clone()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Config(format!("{} must be set", key)))
}

fn initialize_store(config: &Config) -> AppResult<Arc<dyn BookingStore>> {
    match config.booking_store {
        StoreBackend::Notion => {
            let store = NotionBookingStore::new(
                config.notion_api_url.clone(),
                required(&config.notion_token, "NOTION_TOKEN")?,
                required(&config.notion_database_id, "NOTION_DATABASE_ID")?,
                config.notion_version.clone(),
                config.http_timeout(),
            )?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            warn!("⚠️  Using in-memory booking store - records are lost on restart");
            Ok(Arc::new(InMemoryBookingStore::new()))
        }
    }
}

async fn initialize_ledger(config: &Config) -> AppResult<Arc<dyn DispatchLedger>> {
    match config.database_url.as_deref().filter(|url| !url.is_empty()) {
        Some(database_url) => {
            let pool = initialize_database(database_url).await?;
            info!("✅ Durable dispatch ledger enabled");
            Ok(Arc::new(PgDispatchLedger::new(pool)))
        }
        None => {
            warn!(
                "⚠️  DATABASE_URL not set - dispatch ledger is in-memory; \
                 approvals seen before a restart may be dispatched again"
            );
            Ok(Arc::new(InMemoryDispatchLedger::new()))
        }
    }
}

async fn initialize_database(database_url: &str) -> AppResult<PgPool> {
    info!("📊 Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await?;

    info!("🔄 Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;

    info!("✓ Database initialized");
    Ok(pool)
}
