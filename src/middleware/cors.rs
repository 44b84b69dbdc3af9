use http::{header, HeaderValue, Method};
use tower_http::cors::CorsLayer;

use crate::error::{AppError, AppResult};

/// The booking form is served from `frontend_url`; the webhook route is
/// server-to-server and unaffected by CORS.
pub fn create_cors_layer(frontend_url: &str) -> AppResult<CorsLayer> {
    let origin = frontend_url
        .trim_end_matches('/')
        .parse::<HeaderValue>()
        .map_err(|e| AppError::Config(format!("FRONTEND_URL is not a valid origin: {}", e)))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN])
        .max_age(std::time::Duration::from_secs(60 * 60)))
}
