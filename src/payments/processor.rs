use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::{PaymentError, SignatureError};

pub const META_BOOKING_ID: &str = "booking_id";
/// Sessions created before the metadata rename carry the page id here
pub const META_LEGACY_BOOKING_ID: &str = "notionPageId";
pub const META_REF: &str = "ref";

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// Routes a payment event back to the booking it pays for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCorrelation {
    pub booking_id: String,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub product_name: String,
    pub description: String,
    pub correlation: SessionCorrelation,
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedCheckout {
    pub session_id: String,
    pub payment_intent: Option<String>,
    pub correlation: Option<SessionCorrelation>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    CheckoutCompleted {
        event_id: String,
        session: CompletedCheckout,
    },
    Other {
        event_id: String,
        event_type: String,
    },
}

#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn create_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession, PaymentError>;

    /// Verifies the signature over the exact raw body, then parses it
    fn verify_and_parse(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookEvent, SignatureError>;
}

#[derive(Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
}

#[derive(Deserialize)]
struct RawEventData {
    object: Value,
}

#[derive(Deserialize)]
struct RawCheckoutSession {
    id: String,
    #[serde(default)]
    payment_intent: Option<Value>,
    #[serde(default)]
    metadata: Option<HashMap<String, String>>,
}

pub fn parse_event(payload: &[u8]) -> Result<WebhookEvent, SignatureError> {
    let raw: RawEvent = serde_json::from_slice(payload)
        .map_err(|e| SignatureError::InvalidPayload(e.to_string()))?;

    if raw.event_type != CHECKOUT_COMPLETED {
        return Ok(WebhookEvent::Other {
            event_id: raw.id,
            event_type: raw.event_type,
        });
    }

    let session: RawCheckoutSession = serde_json::from_value(raw.data.object)
        .map_err(|e| SignatureError::InvalidPayload(e.to_string()))?;

    // Expanded objects carry the id inside
    let payment_intent = session.payment_intent.and_then(|pi| match pi {
        Value::String(id) => Some(id),
        Value::Object(obj) => obj.get("id").and_then(Value::as_str).map(str::to_string),
        _ => None,
    });

    let metadata = session.metadata.unwrap_or_default();
    let correlation = metadata
        .get(META_BOOKING_ID)
        .or_else(|| metadata.get(META_LEGACY_BOOKING_ID))
        .filter(|id| !id.is_empty())
        .map(|booking_id| SessionCorrelation {
            booking_id: booking_id.clone(),
            reference: metadata.get(META_REF).cloned().unwrap_or_default(),
        });

    Ok(WebhookEvent::CheckoutCompleted {
        event_id: raw.id,
        session: CompletedCheckout {
            session_id: session.id,
            payment_intent,
            correlation,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_completed_event() {
        let payload = json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_1",
                "payment_intent": "pi_1",
                "metadata": { "booking_id": "rec-1", "ref": "BK-AAAAAA" }
            }}
        });

        let event = parse_event(payload.to_string().as_bytes()).unwrap();
        assert_eq!(
            event,
            WebhookEvent::CheckoutCompleted {
                event_id: "evt_1".into(),
                session: CompletedCheckout {
                    session_id: "cs_1".into(),
                    payment_intent: Some("pi_1".into()),
                    correlation: Some(SessionCorrelation {
                        booking_id: "rec-1".into(),
                        reference: "BK-AAAAAA".into(),
                    }),
                },
            }
        );
    }

    #[test]
    fn test_parse_legacy_metadata_and_missing_intent() {
        let payload = json!({
            "id": "evt_2",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_2",
                "payment_intent": null,
                "metadata": { "notionPageId": "page-9", "ref": "BK-BBBBBB" }
            }}
        });

        match parse_event(payload.to_string().as_bytes()).unwrap() {
            WebhookEvent::CheckoutCompleted { session, .. } => {
                assert_eq!(session.payment_intent, None);
                assert_eq!(session.correlation.unwrap().booking_id, "page-9");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_parse_without_metadata() {
        let payload = json!({
            "id": "evt_3",
            "type": "checkout.session.completed",
            "data": { "object": { "id": "cs_3" } }
        });

        match parse_event(payload.to_string().as_bytes()).unwrap() {
            WebhookEvent::CheckoutCompleted { session, .. } => assert!(session.correlation.is_none()),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_parse_other_and_garbage() {
        let payload = json!({ "id": "evt_4", "type": "invoice.paid", "data": { "object": {} } });
        assert!(matches!(
            parse_event(payload.to_string().as_bytes()).unwrap(),
            WebhookEvent::Other { event_type, .. } if event_type == "invoice.paid"
        ));

        assert!(matches!(
            parse_event(b"not json"),
            Err(SignatureError::InvalidPayload(_))
        ));
    }
}
