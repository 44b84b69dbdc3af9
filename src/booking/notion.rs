// Notion-backed booking store
//
// Each booking is a page in a Notion database. Reviewers approve or deny a
// request by editing the Status select by hand; the poller picks that up.
// Only the properties named below are read or written.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::booking::models::{BookingPatch, BookingRecord, BookingStatus, NewBooking};
use crate::booking::store::BookingStore;
use crate::error::StoreError;

pub mod props {
    pub const NAME: &str = "Name";
    pub const REFERENCE: &str = "Booking Ref";
    pub const STATUS: &str = "Status";
    pub const EMAIL: &str = "Email";
    pub const PHONE: &str = "Phone";
    pub const ORGANIZATION: &str = "Organization";
    pub const EVENT_TYPE: &str = "Event Type";
    pub const DATE: &str = "Date";
    pub const START_TIME: &str = "Start Time";
    pub const END_TIME: &str = "End Time";
    pub const DURATION: &str = "Duration (hrs)";
    pub const ATTENDEES: &str = "Attendees";
    pub const TOTAL_AMOUNT: &str = "Total Amount";
    pub const HOUSE_RULES: &str = "House Rules Agreed";
    pub const SOUND: &str = "Amplified Sound";
    pub const EQUIPMENT: &str = "Equipment";
    pub const REFERRAL: &str = "How They Found Us";
    pub const CHECKOUT_URL: &str = "Stripe Checkout URL";
    pub const SESSION_ID: &str = "Stripe Session ID";
    pub const PAYMENT_ID: &str = "Stripe Payment ID";
}

const PAGE_SIZE: u32 = 100;

pub struct NotionBookingStore {
    client: reqwest::Client,
    api_url: String,
    token: String,
    database_id: String,
    notion_version: String,
}

impl NotionBookingStore {
    pub fn new(
        api_url: String,
        token: String,
        database_id: String,
        notion_version: String,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Unavailable(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
            database_id,
            notion_version,
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}/v1/{}", self.api_url, path))
            .bearer_auth(&self.token)
            .header("Notion-Version", &self.notion_version)
    }

    async fn send(&self, request: reqwest::RequestBuilder, id: &str) -> Result<Value, StoreError> {
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(format!("Notion request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<Value>()
                .await
                .map_err(|e| StoreError::Unavailable(format!("Invalid Notion response: {}", e)));
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_failure(status, &body, id))
    }
}

#[async_trait]
impl BookingStore for NotionBookingStore {
    fn name(&self) -> &'static str {
        "notion"
    }

    async fn query(&self, statuses: &[BookingStatus]) -> Result<Vec<BookingRecord>, StoreError> {
        let filter = status_filter(statuses);
        let path = format!("databases/{}/query", self.database_id);

        let mut records = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({ "filter": filter, "page_size": PAGE_SIZE });
            if let Some(next) = &cursor {
                body["start_cursor"] = json!(next);
            }

            let page = self
                .send(self.request(Method::POST, &path).json(&body), &self.database_id)
                .await?;

            let results = page
                .get("results")
                .and_then(Value::as_array)
                .ok_or_else(|| StoreError::Malformed {
                    id: self.database_id.clone(),
                    reason: "query response has no results".to_string(),
                })?;

            for result in results {
                match parse_page(result) {
                    Ok(record) => records.push(record),
                    Err(e) => warn!("⚠️ Skipping unreadable Notion page: {}", e),
                }
            }

            cursor = match (
                page.get("has_more").and_then(Value::as_bool),
                page.get("next_cursor").and_then(Value::as_str),
            ) {
                (Some(true), Some(next)) => Some(next.to_string()),
                _ => break,
            };
        }

        debug!("📋 Notion query {:?} returned {} bookings", statuses, records.len());
        Ok(records)
    }

    async fn retrieve(&self, id: &str) -> Result<BookingRecord, StoreError> {
        // Notion answers malformed page ids with a 400; treat them as unknown
        if Uuid::parse_str(id).is_err() {
            return Err(StoreError::NotFound(id.to_string()));
        }

        let page = self
            .send(self.request(Method::GET, &format!("pages/{}", id)), id)
            .await?;
        parse_page(&page)
    }

    async fn update(&self, id: &str, patch: &BookingPatch) -> Result<BookingRecord, StoreError> {
        if Uuid::parse_str(id).is_err() {
            return Err(StoreError::NotFound(id.to_string()));
        }

        let body = json!({ "properties": patch_properties(patch) });
        let page = self
            .send(
                self.request(Method::PATCH, &format!("pages/{}", id)).json(&body),
                id,
            )
            .await?;

        debug!("💾 Patched Notion page {}", id);
        parse_page(&page)
    }

    async fn create(&self, booking: &NewBooking) -> Result<BookingRecord, StoreError> {
        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": new_booking_properties(booking),
        });

        let page = self
            .send(self.request(Method::POST, "pages").json(&body), &booking.reference)
            .await?;

        let record = parse_page(&page)?;
        info!("📋 Created Notion page {} for {}", record.id, booking.reference);
        Ok(record)
    }

    fn record_url(&self, id: &str) -> Option<String> {
        Some(format!("https://notion.so/{}", id.replace('-', "")))
    }
}

fn classify_failure(status: StatusCode, body: &str, id: &str) -> StoreError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string());

    match status {
        StatusCode::NOT_FOUND => StoreError::NotFound(id.to_string()),
        StatusCode::TOO_MANY_REQUESTS => {
            StoreError::Unavailable(format!("Notion rate limited: {}", message))
        }
        s if s.is_server_error() => {
            StoreError::Unavailable(format!("Notion returned {}: {}", s.as_u16(), message))
        }
        s => StoreError::Rejected {
            status: s.as_u16(),
            message,
        },
    }
}

fn status_filter(statuses: &[BookingStatus]) -> Value {
    let clauses: Vec<Value> = statuses
        .iter()
        .map(|s| json!({ "property": props::STATUS, "select": { "equals": s.as_str() } }))
        .collect();
    json!({ "or": clauses })
}

// ========== PROPERTY ENCODING ==========

fn rich_text_value(content: &str) -> Value {
    json!({ "rich_text": [{ "text": { "content": content } }] })
}

fn select_value(name: &str) -> Value {
    json!({ "select": { "name": name } })
}

pub(crate) fn patch_properties(patch: &BookingPatch) -> Map<String, Value> {
    let mut properties = Map::new();

    if let Some(status) = patch.status {
        properties.insert(props::STATUS.to_string(), select_value(status.as_str()));
    }
    if let Some(url) = &patch.payment_session_url {
        properties.insert(props::CHECKOUT_URL.to_string(), json!({ "url": url }));
    }
    if let Some(session_id) = &patch.payment_session_id {
        properties.insert(props::SESSION_ID.to_string(), rich_text_value(session_id));
    }
    if let Some(payment_id) = &patch.payment_confirmation_id {
        properties.insert(props::PAYMENT_ID.to_string(), rich_text_value(payment_id));
    }

    properties
}

pub(crate) fn new_booking_properties(booking: &NewBooking) -> Map<String, Value> {
    let mut properties = Map::new();

    properties.insert(
        props::NAME.to_string(),
        json!({ "title": [{ "text": { "content": booking.title() } }] }),
    );
    properties.insert(props::REFERENCE.to_string(), rich_text_value(&booking.reference));
    properties.insert(
        props::STATUS.to_string(),
        select_value(BookingStatus::Pending.as_str()),
    );
    properties.insert(props::EMAIL.to_string(), json!({ "email": booking.email }));
    if let Some(phone) = &booking.phone {
        properties.insert(props::PHONE.to_string(), json!({ "phone_number": phone }));
    }
    properties.insert(
        props::ORGANIZATION.to_string(),
        rich_text_value(booking.organization.as_deref().unwrap_or("")),
    );
    properties.insert(props::EVENT_TYPE.to_string(), select_value(&booking.event_type));
    properties.insert(props::DATE.to_string(), rich_text_value(&booking.date));
    properties.insert(props::START_TIME.to_string(), rich_text_value(&booking.start_time));
    properties.insert(props::END_TIME.to_string(), rich_text_value(&booking.end_time));
    properties.insert(
        props::DURATION.to_string(),
        json!({ "number": booking.duration_hours }),
    );
    properties.insert(props::ATTENDEES.to_string(), json!({ "number": booking.attendees }));
    properties.insert(
        props::TOTAL_AMOUNT.to_string(),
        json!({ "number": booking.total_amount }),
    );
    properties.insert(
        props::HOUSE_RULES.to_string(),
        json!({ "checkbox": booking.house_rules_agreed }),
    );
    // Empty select names are rejected by Notion
    if let Some(sound) = booking.sound.as_deref().filter(|s| !s.is_empty()) {
        properties.insert(props::SOUND.to_string(), select_value(sound));
    }
    properties.insert(
        props::EQUIPMENT.to_string(),
        rich_text_value(&booking.equipment.join(", ")),
    );
    if let Some(referral) = booking.referral.as_deref().filter(|s| !s.is_empty()) {
        properties.insert(props::REFERRAL.to_string(), select_value(referral));
    }

    properties
}

// ========== PROPERTY DECODING ==========

fn plain_text(items: &Value) -> Option<String> {
    let text: String = items
        .as_array()?
        .iter()
        .filter_map(|item| {
            item.get("plain_text")
                .or_else(|| item.get("text").and_then(|t| t.get("content")))
                .and_then(Value::as_str)
        })
        .collect();

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn rich_text(properties: &Map<String, Value>, name: &str) -> Option<String> {
    plain_text(properties.get(name)?.get("rich_text")?)
}

fn title(properties: &Map<String, Value>, name: &str) -> Option<String> {
    plain_text(properties.get(name)?.get("title")?)
}

fn select(properties: &Map<String, Value>, name: &str) -> Option<String> {
    properties
        .get(name)?
        .get("select")?
        .get("name")?
        .as_str()
        .map(str::to_string)
}

fn string_field(properties: &Map<String, Value>, name: &str, kind: &str) -> Option<String> {
    properties
        .get(name)?
        .get(kind)?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn number(properties: &Map<String, Value>, name: &str) -> Option<Decimal> {
    match properties.get(name)?.get("number")? {
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
        }
        _ => None,
    }
}

pub(crate) fn parse_page(page: &Value) -> Result<BookingRecord, StoreError> {
    let id = page
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::Malformed {
            id: "<unknown>".to_string(),
            reason: "page has no id".to_string(),
        })?
        .to_string();

    let properties = page
        .get("properties")
        .and_then(Value::as_object)
        .ok_or_else(|| StoreError::Malformed {
            id: id.clone(),
            reason: "page has no properties".to_string(),
        })?;

    let status = match select(properties, props::STATUS) {
        None => BookingStatus::Pending,
        Some(name) => BookingStatus::from_name(&name).ok_or_else(|| StoreError::Malformed {
            id: id.clone(),
            reason: format!("unknown status '{}'", name),
        })?,
    };

    let first_name = title(properties, props::NAME)
        .and_then(|t| t.split_whitespace().next().map(str::to_string))
        .unwrap_or_else(|| "there".to_string());

    Ok(BookingRecord {
        reference: rich_text(properties, props::REFERENCE).unwrap_or_default(),
        status,
        email: string_field(properties, props::EMAIL, "email"),
        first_name,
        event_type: select(properties, props::EVENT_TYPE).unwrap_or_default(),
        date: rich_text(properties, props::DATE).unwrap_or_default(),
        start_time: rich_text(properties, props::START_TIME).unwrap_or_default(),
        end_time: rich_text(properties, props::END_TIME).unwrap_or_default(),
        amount: number(properties, props::TOTAL_AMOUNT).unwrap_or(Decimal::ZERO),
        payment_session_url: string_field(properties, props::CHECKOUT_URL, "url"),
        payment_session_id: rich_text(properties, props::SESSION_ID),
        payment_confirmation_id: rich_text(properties, props::PAYMENT_ID),
        id,
    })
}
