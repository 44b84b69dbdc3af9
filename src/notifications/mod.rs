// Notification delivery
//
// Email goes through Resend. Delivery is always best effort: callers hand a
// Notification to the dispatcher and move on; failures are retried a bounded
// number of times and then logged.

pub mod dispatcher;
pub mod resend;
pub mod templates;

use async_trait::async_trait;

use crate::error::NotificationError;

pub use dispatcher::{NotificationDispatcher, RetryPolicy};
pub use resend::{LogNotifier, ResendEmailClient};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns the provider's message id
    async fn send(&self, notification: &Notification) -> Result<String, NotificationError>;
}
