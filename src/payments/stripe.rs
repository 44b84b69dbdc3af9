use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use super::processor::{
    parse_event, CheckoutRequest, CheckoutSession, PaymentProcessor, WebhookEvent,
    META_BOOKING_ID, META_REF,
};
use super::signature;
use crate::error::{PaymentError, SignatureError};

/// Stripe Checkout client
pub struct StripeClient {
    client: reqwest::Client,
    api_url: String,
    secret_key: String,
    webhook_secret: String,
    tolerance_secs: i64,
}

#[derive(Debug, Deserialize)]
struct StripeSessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

impl StripeClient {
    pub fn new(
        api_url: String,
        secret_key: String,
        webhook_secret: String,
        tolerance_secs: i64,
        timeout: Duration,
    ) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PaymentError::Unavailable(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            secret_key,
            webhook_secret,
            tolerance_secs,
        })
    }
}

/// Form-encoded body for `POST /v1/checkout/sessions`
fn form_params(request: &CheckoutRequest) -> Vec<(String, String)> {
    let line = "line_items[0]";
    vec![
        ("mode".into(), "payment".into()),
        ("payment_method_types[0]".into(), "card".into()),
        (format!("{}[price_data][currency]", line), request.currency.clone()),
        (
            format!("{}[price_data][unit_amount]", line),
            request.amount_minor.to_string(),
        ),
        (
            format!("{}[price_data][product_data][name]", line),
            request.product_name.clone(),
        ),
        (
            format!("{}[price_data][product_data][description]", line),
            request.description.clone(),
        ),
        (format!("{}[quantity]", line), "1".into()),
        ("customer_email".into(), request.customer_email.clone()),
        (
            format!("metadata[{}]", META_BOOKING_ID),
            request.correlation.booking_id.clone(),
        ),
        (
            format!("metadata[{}]", META_REF),
            request.correlation.reference.clone(),
        ),
        ("success_url".into(), request.success_url.clone()),
        ("cancel_url".into(), request.cancel_url.clone()),
    ]
}

#[async_trait]
impl PaymentProcessor for StripeClient {
    fn name(&self) -> &'static str {
        "stripe"
    }

    async fn create_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession, PaymentError> {
        debug!(
            "💳 Creating checkout session for {} ({} {})",
            request.correlation.reference, request.amount_minor, request.currency
        );

        // One key per booking; Stripe answers a repeated key with the first session
        let idempotency_key = format!("checkout-{}", request.correlation.booking_id);

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_url))
            .bearer_auth(&self.secret_key)
            .header("Idempotency-Key", idempotency_key)
            .form(&form_params(request))
            .send()
            .await
            .map_err(|e| PaymentError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or(body);

            if status.is_server_error() || status.as_u16() == 429 {
                return Err(PaymentError::Unavailable(format!(
                    "Stripe returned {}: {}",
                    status.as_u16(),
                    message
                )));
            }
            return Err(PaymentError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let session: StripeSessionResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::UnexpectedResponse(e.to_string()))?;

        let url = session.url.ok_or_else(|| {
            PaymentError::UnexpectedResponse(format!("session {} has no url", session.id))
        })?;

        info!("💳 Checkout session {} created for {}", session.id, request.correlation.reference);
        Ok(CheckoutSession {
            id: session.id,
            url,
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
            &self.webhook_secret,
            self.tolerance_secs,
            Utc::now().timestamp(),
        )?;
        parse_event(payload)
    }
}
