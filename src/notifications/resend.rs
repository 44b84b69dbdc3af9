use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use super::{Notification, Notifier};
use crate::error::NotificationError;

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Resend email client
pub struct ResendEmailClient {
    api_key: String,
    from_email: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ResendEmailRequest<'a> {
    to: &'a str,
    from: &'a str,
    subject: &'a str,
    html: &'a str,
}

#[derive(Debug, Deserialize)]
struct ResendEmailResponse {
    id: String,
}

impl ResendEmailClient {
    pub fn new(
        api_key: String,
        from_email: String,
        timeout: Duration,
    ) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotificationError::Unavailable(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            api_key,
            from_email,
            client,
        })
    }
}

#[async_trait]
impl Notifier for ResendEmailClient {
    fn name(&self) -> &'static str {
        "resend"
    }

    async fn send(&self, notification: &Notification) -> Result<String, NotificationError> {
        let request = ResendEmailRequest {
            to: &notification.to,
            from: &self.from_email,
            subject: &notification.subject,
            html: &notification.html,
        };

        let response = self
            .client
            .post(RESEND_API_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| NotificationError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            if status.is_server_error() || status.as_u16() == 429 {
                return Err(NotificationError::Unavailable(format!(
                    "Resend returned {}: {}",
                    status.as_u16(),
                    error_text
                )));
            }
            return Err(NotificationError::Rejected {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let result: ResendEmailResponse = response
            .json()
            .await
            .map_err(|e| NotificationError::Unavailable(format!("Invalid Resend response: {}", e)))?;
        info!("📧 Email sent via Resend: {}", result.id);
        Ok(result.id)
    }
}

/// Used when no email provider is configured; logs instead of sending
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, notification: &Notification) -> Result<String, NotificationError> {
        let id = Uuid::new_v4().to_string();
        info!(
            "📧 (not sent) to={} subject={:?} id={}",
            notification.to, notification.subject, id
        );
        Ok(id)
    }
}
