//! Byte-transparent streaming relay.
//!
//! Upstream chunks are written to the caller as they arrive. Nothing is
//! parsed, re-framed or accumulated beyond the chunk in hand.

use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::Response,
};
use bytes::Bytes;
use futures::Stream;

use super::server::{TraceId, TRACE_ID_HEADER};

/// Content type announced when the upstream did not declare one.
pub const DEFAULT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// Build the relay response for an upstream body.
///
/// Headers (content type, no-cache, keep-alive, trace id) are fixed before the
/// first byte goes out. `body = None` means the upstream sent no body: the
/// caller gets the headers and an immediately closed stream.
pub fn relay<S, E>(
    status: StatusCode,
    content_type: Option<HeaderValue>,
    trace_id: &TraceId,
    body: Option<S>,
) -> Response
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<axum::BoxError>,
{
    let body = match body {
        Some(stream) => Body::from_stream(stream),
        None => Body::empty(),
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;

    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        content_type.unwrap_or_else(|| HeaderValue::from_static(DEFAULT_STREAM_CONTENT_TYPE)),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(HeaderName::from_static(TRACE_ID_HEADER), trace_id.header_value());

    response
}
