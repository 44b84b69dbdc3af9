use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::booking::NewBooking;

// ========== REQUEST MODELS ==========

/// Booking form submission
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    #[validate(length(min = 1, message = "first name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "last name is required"))]
    pub last_name: String,
    #[validate(email(message = "a valid email is required"))]
    pub email: String,
    pub phone: Option<String>,
    #[serde(alias = "org")]
    pub organization: Option<String>,

    #[validate(length(min = 1, message = "event type is required"))]
    pub event_type: String,
    #[validate(length(min = 1, message = "date is required"))]
    pub date: String,
    #[validate(length(min = 1, message = "start time is required"))]
    pub start_time: String,
    #[validate(length(min = 1, message = "end time is required"))]
    pub end_time: String,
    #[validate(custom = "positive_decimal")]
    pub duration_hours: Decimal,
    #[validate(range(min = 1, message = "at least one attendee"))]
    pub attendees: u32,
    #[validate(custom = "non_negative_decimal")]
    pub total_amount: Decimal,

    #[serde(default)]
    pub house_rules_agreed: bool,
    pub sound: Option<String>,
    #[serde(default)]
    pub equipment: Vec<String>,
    pub referral: Option<String>,
    pub description: Option<String>,
}

fn positive_decimal(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        return Err(ValidationError::new("must_be_positive"));
    }
    Ok(())
}

fn non_negative_decimal(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(ValidationError::new("must_not_be_negative"));
    }
    Ok(())
}

impl CreateBookingRequest {
    pub fn into_new_booking(self, reference: String) -> NewBooking {
        NewBooking {
            reference,
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.filter(|p| !p.is_empty()),
            organization: self.organization.filter(|o| !o.is_empty()),
            event_type: self.event_type,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            duration_hours: self.duration_hours,
            attendees: self.attendees,
            total_amount: self.total_amount,
            house_rules_agreed: self.house_rules_agreed,
            sound: self.sound.filter(|s| !s.is_empty()),
            equipment: self.equipment,
            referral: self.referral.filter(|r| !r.is_empty()),
            description: self.description.filter(|d| !d.is_empty()),
        }
    }
}

// ========== RESPONSE MODELS ==========

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingResponse {
    pub ok: bool,
    pub booking_id: String,
    #[serde(rename = "ref")]
    pub reference: String,
}

/// Live status of a booking; `paymentUrl` is null until a session exists
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookingStatusResponse {
    pub status: String,
    pub payment_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct WebhookAck {
    pub received: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub poll_interval_secs: u64,
    pub durable_ledger: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn form() -> serde_json::Value {
        json!({
            "firstName": "Grace",
            "lastName": "Hopper",
            "email": "grace@example.com",
            "phone": "555-0100",
            "org": "Navy",
            "eventType": "Workshop",
            "date": "2026-11-02",
            "startTime": "10:00",
            "endTime": "12:00",
            "durationHours": 2,
            "attendees": 12,
            "totalAmount": 150.5,
            "houseRulesAgreed": true,
            "equipment": ["Projector", "Mic"]
        })
    }

    #[test]
    fn test_valid_form() {
        let request: CreateBookingRequest = serde_json::from_value(form()).unwrap();
        assert!(request.validate().is_ok());

        let booking = request.into_new_booking("BK-ABC123".into());
        assert_eq!(booking.organization.as_deref(), Some("Navy"));
        assert_eq!(booking.equipment.len(), 2);
        assert_eq!(booking.title(), "Grace Hopper — Workshop");
    }

    #[test]
    fn test_invalid_fields_rejected() {
        let mut value = form();
        value["email"] = json!("not-an-email");
        value["attendees"] = json!(0);
        value["durationHours"] = json!(0);
        value["totalAmount"] = json!(-5);

        let request: CreateBookingRequest = serde_json::from_value(value).unwrap();
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();

        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("attendees"));
        assert!(fields.contains_key("duration_hours"));
        assert!(fields.contains_key("total_amount"));
    }

    #[test]
    fn test_free_booking_is_valid() {
        let mut value = form();
        value["totalAmount"] = json!(0);
        let request: CreateBookingRequest = serde_json::from_value(value).unwrap();
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_response_field_names() {
        let body = serde_json::to_value(CreateBookingResponse {
            ok: true,
            booking_id: "rec-1".into(),
            reference: "BK-ABC123".into(),
        })
        .unwrap();
        assert_eq!(body, json!({ "ok": true, "bookingId": "rec-1", "ref": "BK-ABC123" }));

        let body = serde_json::to_value(BookingStatusResponse {
            status: "Approved".into(),
            payment_url: None,
        })
        .unwrap();
        assert_eq!(body, json!({ "status": "Approved", "paymentUrl": null }));
    }
}
