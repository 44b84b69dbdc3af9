use axum::{
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

use crate::api::handler::{create_booking, get_booking_status, health_check, stripe_webhook, AppState};
use crate::api::models::CreateBookingRequest;
use crate::config::Config;
use crate::error::AppResult;
use crate::middleware::{create_cors_layer, rate_limit_middleware, validate_json, RateLimitLayer};

pub fn create_app(state: AppState, config: &Config) -> AppResult<Router> {
    info!("⚙️ Setting up HTTP routes...");

    // Form submissions are validated and rate limited before the handler runs
    let intake_routes = Router::new()
        .route("/booking-request", post(create_booking))
        .route_layer(from_fn(validate_json::<CreateBookingRequest>))
        .route_layer(from_fn_with_state(
            RateLimitLayer::per_minute(config.rate_limit_per_minute),
            rate_limit_middleware,
        ));

    let app = Router::new()
        .route("/health", get(health_check))
        .nest(
            "/api",
            Router::new()
                .merge(intake_routes)
                .route("/booking-status/:id", get(get_booking_status))
                .route("/stripe-webhook", post(stripe_webhook)),
        )
        .layer(CompressionLayer::new())
        .layer(create_cors_layer(&config.frontend_url)?)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.http_timeout(),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("✓ HTTP routes configured");
    Ok(app)
}

pub async fn run_server(app: Router, bind_address: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("🌐 Server listening on: {}", bind_address);

    axum::serve(listener, app).await
}
