use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    Approved,
    Denied,
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::Approved => "approved",
            TransitionKind::Denied => "denied",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "approved" => Some(TransitionKind::Approved),
            "denied" => Some(TransitionKind::Denied),
            _ => None,
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Claimed,
    Succeeded,
    Failed(String),
}

impl DispatchOutcome {
    fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::Claimed => "claimed",
            DispatchOutcome::Succeeded => "succeeded",
            DispatchOutcome::Failed(_) => "failed",
        }
    }

    fn reason(&self) -> Option<&str> {
        match self {
            DispatchOutcome::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub record_id: String,
    pub transition: TransitionKind,
    pub outcome: DispatchOutcome,
    pub claimed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Record ids the poller has already acted on.
///
/// A claim succeeds at most once per record id for the lifetime of the
/// ledger, whatever the transition kind or later outcome.
#[async_trait]
pub trait DispatchLedger: Send + Sync {
    /// Whether claims survive a process restart
    fn is_durable(&self) -> bool;

    /// True only for the caller that inserted the entry
    async fn try_claim(&self, record_id: &str, transition: TransitionKind) -> AppResult<bool>;

    async fn record_outcome(&self, record_id: &str, outcome: &DispatchOutcome) -> AppResult<()>;

    async fn entry(&self, record_id: &str) -> AppResult<Option<LedgerEntry>>;
}

/// Process-lifetime ledger; every claim is forgotten on restart
#[derive(Default)]
pub struct InMemoryDispatchLedger {
    entries: Mutex<HashMap<String, LedgerEntry>>,
}

impl InMemoryDispatchLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[async_trait]
impl DispatchLedger for InMemoryDispatchLedger {
    fn is_durable(&self) -> bool {
        false
    }

    async fn try_claim(&self, record_id: &str, transition: TransitionKind) -> AppResult<bool> {
        let mut entries = self.entries.lock();
        if entries.contains_key(record_id) {
            return Ok(false);
        }
        let now = Utc::now();
        entries.insert(
            record_id.to_string(),
            LedgerEntry {
                record_id: record_id.to_string(),
                transition,
                outcome: DispatchOutcome::Claimed,
                claimed_at: now,
                updated_at: now,
            },
        );
        Ok(true)
    }

    async fn record_outcome(&self, record_id: &str, outcome: &DispatchOutcome) -> AppResult<()> {
        let mut entries = self.entries.lock();
        let entry = entries
            .get_mut(record_id)
            .ok_or_else(|| AppError::Internal(format!("no ledger entry for {}", record_id)))?;
        entry.outcome = outcome.clone();
        entry.updated_at = Utc::now();
        Ok(())
    }

    async fn entry(&self, record_id: &str) -> AppResult<Option<LedgerEntry>> {
        Ok(self.entries.lock().get(record_id).cloned())
    }
}

/// Postgres-backed ledger (`dispatch_ledger` table); claims survive restarts
pub struct PgDispatchLedger {
    pool: PgPool,
}

impl PgDispatchLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DispatchLedger for PgDispatchLedger {
    fn is_durable(&self) -> bool {
        true
    }

    async fn try_claim(&self, record_id: &str, transition: TransitionKind) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO dispatch_ledger (record_id, transition)
            VALUES ($1, $2)
            ON CONFLICT (record_id) DO NOTHING
            "#,
        )
        .bind(record_id)
        .bind(transition.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_outcome(&self, record_id: &str, outcome: &DispatchOutcome) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE dispatch_ledger
            SET outcome = $2, reason = $3, updated_at = NOW()
            WHERE record_id = $1
            "#,
        )
        .bind(record_id)
        .bind(outcome.label())
        .bind(outcome.reason())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Internal(format!("no ledger entry for {}", record_id)));
        }
        Ok(())
    }

    async fn entry(&self, record_id: &str) -> AppResult<Option<LedgerEntry>> {
        let row = sqlx::query(
            r#"
            SELECT record_id, transition, outcome, reason, claimed_at, updated_at
            FROM dispatch_ledger
            WHERE record_id = $1
            "#,
        )
        .bind(record_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let transition: String = row.try_get("transition")?;
        let outcome: String = row.try_get("outcome")?;
        let reason: Option<String> = row.try_get("reason")?;

        let transition = TransitionKind::parse(&transition).ok_or_else(|| {
            AppError::Internal(format!("unknown transition {:?} for {}", transition, record_id))
        })?;
        let outcome = match outcome.as_str() {
            "claimed" => DispatchOutcome::Claimed,
            "succeeded" => DispatchOutcome::Succeeded,
            "failed" => DispatchOutcome::Failed(reason.unwrap_or_default()),
            other => {
                return Err(AppError::Internal(format!(
                    "unknown outcome {:?} for {}",
                    other, record_id
                )))
            }
        };

        Ok(Some(LedgerEntry {
            record_id: row.try_get("record_id")?,
            transition,
            outcome,
            claimed_at: row.try_get("claimed_at")?,
            updated_at: row.try_get("updated_at")?,
        }))
    }
}

/// Claim-before-dispatch discipline over a `DispatchLedger`.
///
/// Outcome bookkeeping is best effort: a failure to record an outcome is
/// logged and the claim still stands.
pub struct IdempotencyGuard {
    ledger: Arc<dyn DispatchLedger>,
}

impl IdempotencyGuard {
    pub fn new(ledger: Arc<dyn DispatchLedger>) -> Self {
        Self { ledger }
    }

    pub fn is_durable(&self) -> bool {
        self.ledger.is_durable()
    }

    pub async fn claim(&self, record_id: &str, transition: TransitionKind) -> AppResult<bool> {
        let claimed = self.ledger.try_claim(record_id, transition).await?;
        if claimed {
            debug!("🔒 Claimed {} for {} dispatch", record_id, transition);
        } else {
            match self.ledger.entry(record_id).await {
                Ok(Some(entry)) => debug!(
                    "⏭️  {} already claimed for {} at {} ({})",
                    record_id,
                    entry.transition,
                    entry.claimed_at,
                    entry.outcome.label()
                ),
                Ok(None) => {}
                Err(e) => warn!("⚠️ Could not read ledger entry for {}: {}", record_id, e),
            }
        }
        Ok(claimed)
    }

    pub async fn settle(&self, record_id: &str, outcome: DispatchOutcome) {
        if let Err(e) = self.ledger.record_outcome(record_id, &outcome).await {
            error!(
                "❌ Could not record {} outcome for {}: {}",
                outcome.label(),
                record_id,
                e
            );
        }
    }
}
