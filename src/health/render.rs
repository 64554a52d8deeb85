// src/health/render.rs
use super::live::LiveResponse;
use super::ready::ReadyResponse;
use hyper::header::{HeaderValue, CACHE_CONTROL, CONTENT_TYPE, EXPIRES, PRAGMA};
use hyper::{Body, Response, StatusCode};
use serde::Serialize;
use tracing::error;

pub const LIVE_ROUTE: &str = "/health/live";
pub const READY_ROUTE: &str = "/health/ready";

const EPOCH_HTTP_DATE: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

pub fn render_live(response: &LiveResponse) -> Response<Body> {
    render_json(StatusCode::OK, response, LIVE_ROUTE)
}

pub fn render_ready(response: &ReadyResponse) -> Response<Body> {
    let status = if response.status.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    render_json(status, response, READY_ROUTE)
}

/// Write `body` as JSON under `status` with caching disabled.
///
/// The status code is settled before encoding; if encoding fails the error is
/// logged and the response goes out with that code and an empty body.
pub fn render_json<T: Serialize>(status: StatusCode, body: &T, route: &str) -> Response<Body> {
    let payload = match serde_json::to_vec(body) {
        Ok(mut bytes) => {
            bytes.push(b'\n');
            Body::from(bytes)
        }
        Err(err) => {
            error!(
                route,
                status = status.as_u16(),
                %err,
                "failed to encode health response"
            );
            Body::empty()
        }
    };

    let mut response = Response::new(payload);
    *response.status_mut() = status;
    disable_response_cache(&mut response);
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

pub fn disable_response_cache(response: &mut Response<Body>) {
    let headers = response.headers_mut();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store, no-cache"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(EXPIRES, HeaderValue::from_static(EPOCH_HTTP_DATE));
}
