use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{Notification, Notifier};
use crate::error::NotificationError;

/// Bounded retry with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Delay after the `failed_attempts`-th failure (1-based)
    pub fn backoff_for(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { message_id: String, attempts: u32 },
    /// The provider refused the message; retrying would not help
    Rejected { attempts: u32, reason: String },
    Exhausted { attempts: u32, last_error: String },
}

/// Runs each notification as its own background task, off the
/// reconciliation path. Failures never reach the caller.
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    policy: RetryPolicy,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, policy: RetryPolicy) -> Self {
        Self { notifier, policy }
    }

    pub fn notifier_name(&self) -> &'static str {
        self.notifier.name()
    }

    pub fn dispatch(&self, notification: Notification) -> JoinHandle<DeliveryOutcome> {
        let notifier = self.notifier.clone();
        let policy = self.policy.clone();
        let task_id = Uuid::new_v4();

        tokio::spawn(async move {
            deliver_with_retries(notifier, policy, task_id, notification).await
        })
    }
}

async fn deliver_with_retries(
    notifier: Arc<dyn Notifier>,
    policy: RetryPolicy,
    task_id: Uuid,
    notification: Notification,
) -> DeliveryOutcome {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0u32;

    loop {
        attempts += 1;

        match notifier.send(&notification).await {
            Ok(message_id) => {
                info!(
                    "✓ Notification {} delivered to {} (attempt {}/{})",
                    task_id, notification.to, attempts, max_attempts
                );
                return DeliveryOutcome::Delivered {
                    message_id,
                    attempts,
                };
            }
            Err(NotificationError::Rejected { status, message }) => {
                error!(
                    "❌ Notification {} to {} rejected ({}): {}",
                    task_id, notification.to, status, message
                );
                return DeliveryOutcome::Rejected {
                    attempts,
                    reason: message,
                };
            }
            Err(e) => {
                if attempts >= max_attempts {
                    error!(
                        "❌ Notification {} to {} failed after {} attempts: {}",
                        task_id, notification.to, attempts, e
                    );
                    return DeliveryOutcome::Exhausted {
                        attempts,
                        last_error: e.to_string(),
                    };
                }

                let backoff = policy.backoff_for(attempts);
                warn!(
                    "⚠️ Notification {} will retry in {:?} (attempt {}/{}): {}",
                    task_id, backoff, attempts, max_attempts, e
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }
}
