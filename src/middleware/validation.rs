use axum::{body::Body, extract::Request, middleware::Next, response::Response};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::AppError;

/// Upper bound on a JSON body this middleware will buffer
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Rejects a request whose JSON body does not deserialize into `T` or fails
/// `T`'s validation rules, before the handler runs.
pub async fn validate_json<T: DeserializeOwned + Validate>(
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (parts, body) = req.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| AppError::Validation("Invalid request body".to_string()))?;

    let value: T = serde_json::from_slice(&bytes)
        .map_err(|e| AppError::Validation(format!("Invalid JSON: {}", e)))?;
    value.validate()?;

    let req = Request::from_parts(parts, Body::from(bytes));
    Ok(next.run(req).await)
}
