//! Gateway-wide error type and its translation into HTTP responses.

use actix_web::{http::StatusCode, HttpResponse, HttpResponseBuilder};
use thiserror::Error;

/// Errors raised while a request moves through the pipeline.
///
/// Each variant maps to exactly one client response shape; see the error
/// table this type is built from for the status/body pairing.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Route not found")]
    RouteNotFound,

    #[error("Unsupported")]
    UnsupportedProtocol,

    #[error("circuit breaker open for {authority}")]
    CircuitOpen { authority: String },

    #[error("upstream error after {retries} retries")]
    RetriesExhausted { retries: u32 },

    #[error("reload requested too frequently")]
    ReloadTooFrequent,

    #[error("reload failed: {0}")]
    ReloadFailure(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl actix_web::ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::RouteNotFound => StatusCode::NOT_FOUND,
            GatewayError::UnsupportedProtocol => StatusCode::BAD_REQUEST,
            GatewayError::CircuitOpen { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::RetriesExhausted { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::ReloadTooFrequent => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::ReloadFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponseBuilder::new(self.status_code());
        match self {
            GatewayError::RouteNotFound => builder.body("Route not found"),
            GatewayError::UnsupportedProtocol => builder.body("Unsupported"),
            GatewayError::CircuitOpen { .. } => {
                builder.insert_header(("X-Circuit-Open", "true"));
                builder.body("Upstream error after circuit breaker opened")
            }
            GatewayError::RetriesExhausted { retries } => {
                builder.body(format!("Upstream error after {retries} retries"))
            }
            GatewayError::ReloadTooFrequent => builder.body("Too Many Requests"),
            GatewayError::ReloadFailure(_) => builder.body("Reload failed"),
            GatewayError::Internal(msg) => builder.body(msg.clone()),
        }
    }
}
