use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use std::sync::Arc;
use tracing::info;

use super::intake::BookingIntake;
use super::models::*;
use super::status::StatusQueryService;
use crate::error::{AppResult, SignatureError};
use crate::payments::WebhookFinalizer;

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Clone)]
pub struct AppState {
    pub intake: Arc<BookingIntake>,
    pub status: Arc<StatusQueryService>,
    pub webhooks: Arc<WebhookFinalizer>,
    pub poll_interval_secs: u64,
    pub durable_ledger: bool,
}

/// POST /api/booking-request - Submit a booking request
pub async fn create_booking(
    State(state): State<AppState>,
    Json(request): Json<CreateBookingRequest>,
) -> AppResult<Json<CreateBookingResponse>> {
    info!("📋 Booking request from {}", request.email);
    let response = state.intake.submit(request).await?;
    Ok(Json(response))
}

/// GET /api/booking-status/:id - Live status and payment link
pub async fn get_booking_status(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
) -> AppResult<Json<BookingStatusResponse>> {
    let response = state.status.status(&booking_id).await?;
    Ok(Json(response))
}

/// POST /api/stripe-webhook - Payment completion events.
/// The body is taken raw; the signature covers the exact bytes.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<WebhookAck>> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .map(|value| value.to_str())
        .transpose()
        .map_err(|_| SignatureError::MalformedHeader("header is not ASCII".to_string()))?;

    state.webhooks.handle(&body, signature).await?;
    Ok(Json(WebhookAck { received: true }))
}

/// GET /health - Health check
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        poll_interval_secs: state.poll_interval_secs,
        durable_ledger: state.durable_ledger,
    })
}
