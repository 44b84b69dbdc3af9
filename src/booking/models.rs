use rand::{distr::Alphanumeric, Rng};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BookingStatus {
    Pending,
    Approved,
    Denied,
    Paid,
}

impl BookingStatus {
    /// Name of the status as stored in the record store
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "Pending",
            BookingStatus::Approved => "Approved",
            BookingStatus::Denied => "Denied",
            BookingStatus::Paid => "Paid",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Pending" => Some(BookingStatus::Pending),
            "Approved" => Some(BookingStatus::Approved),
            "Denied" => Some(BookingStatus::Denied),
            "Paid" => Some(BookingStatus::Paid),
            _ => None,
        }
    }

    /// Pending -> {Approved, Denied}, Approved -> Paid. Re-applying the
    /// current status is allowed so duplicate webhook deliveries stay no-ops.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        if *self == next {
            return true;
        }
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Approved)
                | (BookingStatus::Pending, BookingStatus::Denied)
                | (BookingStatus::Approved, BookingStatus::Paid)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A booking as held by the external record store. Never cached locally.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingRecord {
    pub id: String,
    pub reference: String,
    pub status: BookingStatus,
    pub email: Option<String>,
    pub first_name: String,
    pub event_type: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub amount: Decimal,
    pub payment_session_url: Option<String>,
    pub payment_session_id: Option<String>,
    pub payment_confirmation_id: Option<String>,
}

impl BookingRecord {
    pub fn has_payment_session(&self) -> bool {
        self.payment_session_url
            .as_deref()
            .map(|url| !url.is_empty())
            .unwrap_or(false)
    }

    /// "date, start–end" as shown to customers and on the checkout page
    pub fn schedule_summary(&self) -> String {
        format!("{}, {}–{}", self.date, self.start_time, self.end_time)
    }

    pub fn apply(&mut self, patch: &BookingPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(url) = &patch.payment_session_url {
            self.payment_session_url = Some(url.clone());
        }
        if let Some(id) = &patch.payment_session_id {
            self.payment_session_id = Some(id.clone());
        }
        if let Some(id) = &patch.payment_confirmation_id {
            self.payment_confirmation_id = Some(id.clone());
        }
    }
}

/// Field-scoped write. Unset fields are never sent to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingPatch {
    pub status: Option<BookingStatus>,
    pub payment_session_url: Option<String>,
    pub payment_session_id: Option<String>,
    pub payment_confirmation_id: Option<String>,
}

impl BookingPatch {
    pub fn payment_session(url: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            payment_session_url: Some(url.into()),
            payment_session_id: Some(session_id.into()),
            ..Self::default()
        }
    }

    pub fn paid(confirmation_id: impl Into<String>) -> Self {
        Self {
            status: Some(BookingStatus::Paid),
            payment_confirmation_id: Some(confirmation_id.into()),
            ..Self::default()
        }
    }
}

/// A validated booking request ready to be written to the store
#[derive(Debug, Clone, PartialEq)]
pub struct NewBooking {
    pub reference: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub organization: Option<String>,
    pub event_type: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_hours: Decimal,
    pub attendees: u32,
    pub total_amount: Decimal,
    pub house_rules_agreed: bool,
    pub sound: Option<String>,
    pub equipment: Vec<String>,
    pub referral: Option<String>,
    pub description: Option<String>,
}

impl NewBooking {
    pub fn title(&self) -> String {
        format!("{} {} — {}", self.first_name, self.last_name, self.event_type)
    }

    pub fn schedule_summary(&self) -> String {
        format!("{}, {}–{}", self.date, self.start_time, self.end_time)
    }

    pub fn into_record(self, id: String) -> BookingRecord {
        BookingRecord {
            id,
            reference: self.reference,
            status: BookingStatus::Pending,
            email: Some(self.email),
            first_name: self.first_name,
            event_type: self.event_type,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            amount: self.total_amount,
            payment_session_url: None,
            payment_session_id: None,
            payment_confirmation_id: None,
        }
    }
}

/// Human reference code, e.g. `BK-7Q2XK9`
pub fn generate_reference() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!("BK-{}", suffix.to_uppercase())
}
