//! Response handling and transformation.
//!
//! # Responsibilities
//! - Stream the chosen backend's response back verbatim
//! - Report body failures that happen after the status line is out
//! - Build the 503 returned when the pool is exhausted
//!
//! # Design Decisions
//! - Streaming responses avoid buffering the entire body
//! - A body error after headers were sent is logged and the partial response
//!   is left as-is; the client sees a truncated body

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::TryStreamExt;

use crate::observability::metrics;

/// Body returned with `503` when no backend could serve the request.
pub const UNAVAILABLE_MESSAGE: &str = "No healthy servers available, try again later\n";

/// Status, headers and body of an upstream response, with the body wrapped so
/// a mid-stream failure is logged against `backend`.
pub fn stream_back(response: Response<Body>, backend: &str) -> Response {
    let backend = backend.to_string();
    response.map(move |body| {
        let stream = body.into_data_stream().inspect_err(move |e| {
            tracing::error!(backend = %backend, error = %e, "Error copying response body");
            metrics::record_body_failure(&backend);
        });
        Body::from_stream(stream)
    })
}

/// The pool-exhausted response.
pub fn unavailable() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, UNAVAILABLE_MESSAGE).into_response()
}

pub fn bad_request(message: &'static str) -> Response {
    (StatusCode::BAD_REQUEST, message).into_response()
}
