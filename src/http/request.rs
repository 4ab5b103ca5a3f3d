//! Request handling and transformation.
//!
//! # Responsibilities
//! - Tag every inbound request with an `x-request-id` (UUID) for tracing
//! - Buffer small inbound bodies once so each candidate can get a full copy
//! - Build the outbound request for a chosen backend
//!
//! # Design Decisions
//! - Request ID added as early as possible and forwarded like any other header
//! - Method, headers and body are forwarded verbatim; only the URI is rewritten
//! - Bodies over the buffer limit are streamed, never rejected; such a body can
//!   reach exactly one candidate

use axum::body::{Body, Bytes};
use axum::http::{request::Parts, HeaderName, Request};
use futures_util::{stream, StreamExt};
use http_body_util::BodyExt;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::load_balancer::Backend;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Layer that assigns a UUID request ID when the caller did not send one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID), MakeRequestUuid)
}

/// Layer that copies the request ID onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID))
}

/// Tracing span for one inbound request.
pub fn request_span(request: &Request<Body>) -> tracing::Span {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");
    tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    )
}

/// The inbound body as the dispatcher hands it to candidates.
pub enum ForwardBody {
    /// Fully buffered; every candidate gets its own copy.
    Replayable(Bytes),
    /// Too large to buffer; sent to the first candidate only.
    OneShot(Option<Body>),
}

impl ForwardBody {
    /// Body for the next candidate, or `None` once a one-shot body is spent.
    pub fn take(&mut self) -> Option<Body> {
        match self {
            ForwardBody::Replayable(bytes) => Some(Body::from(bytes.clone())),
            ForwardBody::OneShot(body) => body.take(),
        }
    }

    pub fn is_replayable(&self) -> bool {
        matches!(self, ForwardBody::Replayable(_))
    }
}

/// Read the inbound body into memory while it fits in `limit` bytes.
///
/// Once the limit is crossed the chunks read so far are chained in front of
/// the unread remainder and the result is streamed instead.
pub async fn prepare_body(mut body: Body, limit: usize) -> Result<ForwardBody, axum::Error> {
    let mut chunks: Vec<Bytes> = Vec::new();
    let mut buffered = 0usize;

    while let Some(frame) = body.frame().await {
        // Trailers are not forwarded.
        let Ok(data) = frame?.into_data() else {
            continue;
        };
        buffered += data.len();
        chunks.push(data);

        if buffered > limit {
            let head = stream::iter(chunks.into_iter().map(Ok::<_, axum::Error>));
            let rest = body.into_data_stream();
            return Ok(ForwardBody::OneShot(Some(Body::from_stream(head.chain(rest)))));
        }
    }

    let bytes = match chunks.len() {
        0 => Bytes::new(),
        1 => chunks.remove(0),
        _ => Bytes::from(chunks.concat()),
    };
    Ok(ForwardBody::Replayable(bytes))
}

/// Outbound request for `backend`: same method, headers and body, path and
/// query appended to the backend base URL.
pub fn upstream_request(
    parts: &Parts,
    body: Body,
    backend: &Backend,
) -> Result<Request<Body>, axum::http::Error> {
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let mut request = Request::builder()
        .method(parts.method.clone())
        .uri(backend.target_uri(path_and_query)?)
        .body(body)?;
    *request.headers_mut() = parts.headers.clone();
    Ok(request)
}
