use html_escape::{encode_double_quoted_attribute, encode_text};

use super::Notification;
use crate::booking::{BookingRecord, NewBooking};

fn wrap(body: &str) -> String {
    format!(
        r#"<div style="font-family:sans-serif;max-width:600px;margin:0 auto">{}</div>"#,
        body
    )
}

/// Table row for customer-supplied text; the value is escaped
fn row(label: &str, value: &str) -> String {
    row_html(label, &encode_text(value))
}

fn row_html(label: &str, value: &str) -> String {
    format!(
        r#"<tr><td style="padding:8px;color:#888;font-size:13px">{}</td><td style="padding:8px">{}</td></tr>"#,
        label, value
    )
}

/// Approval with payment link, sent once the session is written back
pub fn booking_approved(record: &BookingRecord, to: &str, payment_url: &str) -> Notification {
    let body = format!(
        r#"<h2 style="color:#4A6741">Your booking has been approved!</h2>
<p>Hi {first_name},</p>
<p>Your space rental request <strong>{reference}</strong> has been approved.
Complete payment within 48 hours to secure your spot.</p>
<table style="width:100%;border-collapse:collapse;margin:24px 0">{event}{when}{total}</table>
<a href="{url}" style="display:inline-block;background:#4A6741;color:white;padding:16px 32px;border-radius:4px;text-decoration:none;font-weight:bold">Pay ${amount} Securely →</a>"#,
        first_name = encode_text(&record.first_name),
        reference = encode_text(&record.reference),
        event = row("Event", &record.event_type),
        when = row("Date &amp; Time", &record.schedule_summary()),
        total = row_html("Total Due", &format!("<strong>${}</strong>", record.amount)),
        url = encode_double_quoted_attribute(payment_url),
        amount = record.amount,
    );

    Notification {
        to: to.to_string(),
        subject: format!("✅ Your booking is approved — pay to confirm ({})", record.reference),
        html: wrap(&body),
    }
}

pub fn booking_denied(record: &BookingRecord, to: &str) -> Notification {
    let body = format!(
        r#"<h2 style="color:#8C8580">Booking request update</h2>
<p>Hi {},</p>
<p>Unfortunately we're unable to accommodate your request (<strong>{}</strong>) at this time.
You're welcome to submit a new request for a different date.</p>
<p style="color:#888;font-size:13px">Questions? Reply to this email and we'll be happy to help.</p>"#,
        encode_text(&record.first_name),
        encode_text(&record.reference)
    );

    Notification {
        to: to.to_string(),
        subject: format!("Your booking request — {}", record.reference),
        html: wrap(&body),
    }
}

/// Internal notice asking the team to review a new request
pub fn team_review_request(
    booking: &NewBooking,
    team_email: &str,
    review_url: Option<&str>,
) -> Notification {
    let link = review_url
        .map(|url| {
            format!(
                r#"<a href="{}" style="display:inline-block;background:#C4572A;color:white;padding:14px 28px;border-radius:4px;text-decoration:none;font-weight:bold">Review &amp; Approve →</a>"#,
                encode_double_quoted_attribute(url)
            )
        })
        .unwrap_or_default();

    let body = format!(
        r#"<h2 style="color:#C4572A">New Booking Request</h2>
<table style="width:100%;border-collapse:collapse">{}{}{}{}{}{}{}</table>
{}
<p style="color:#888;font-size:12px;margin-top:24px">Change the <strong>Status</strong> field to <strong>Approved</strong> or <strong>Denied</strong>.</p>"#,
        row_html("Ref", &format!("<strong>{}</strong>", encode_text(&booking.reference))),
        row("Name", &format!("{} {}", booking.first_name, booking.last_name)),
        row("Email", &booking.email),
        row("Event", &booking.event_type),
        row("Date", &booking.schedule_summary()),
        row("Attendees", &booking.attendees.to_string()),
        row_html("Amount", &format!("<strong>${}</strong>", booking.total_amount)),
        link,
    );

    Notification {
        to: team_email.to_string(),
        subject: format!(
            "🏢 New Space Booking Request — {} {} ({})",
            booking.first_name, booking.last_name, booking.reference
        ),
        html: wrap(&body),
    }
}

pub fn request_received(booking: &NewBooking) -> Notification {
    let body = format!(
        r#"<h2 style="color:#C4572A">We've received your request!</h2>
<p>Hi {},</p>
<p>Your space rental request (<strong>{}</strong>) is being reviewed by our team.
We'll respond within 24 hours.</p>
<table style="width:100%;border-collapse:collapse;margin:24px 0">{}{}{}</table>"#,
        encode_text(&booking.first_name),
        encode_text(&booking.reference),
        row("Event", &booking.event_type),
        row("Date", &booking.schedule_summary()),
        row("Total (if approved)", &format!("${}", booking.total_amount)),
    );

    Notification {
        to: booking.email.clone(),
        subject: format!("Your booking request is under review — {}", booking.reference),
        html: wrap(&body),
    }
}
