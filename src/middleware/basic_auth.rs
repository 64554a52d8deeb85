// src/middleware/basic_auth.rs
use crate::problem;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::future::BoxFuture;
use hyper::header::{HeaderValue, AUTHORIZATION, WWW_AUTHENTICATE};
use hyper::{Body, Request, Response};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

const DEFAULT_REALM: &str = "Restricted";

/// Requires HTTP Basic credentials on every request.
///
/// Only SHA-256 digests of the expected credentials are kept, and they are
/// compared in constant time.
#[derive(Clone)]
pub struct BasicAuthLayer {
    credentials: Arc<Credentials>,
}

struct Credentials {
    username: [u8; 32],
    password: [u8; 32],
    challenge: HeaderValue,
}

impl BasicAuthLayer {
    pub fn new(username: &str, password: &str, realm: Option<&str>) -> Self {
        let realm = realm.filter(|r| !r.is_empty()).unwrap_or(DEFAULT_REALM);
        let challenge = HeaderValue::from_str(&format!("Basic realm=\"{}\"", realm))
            .unwrap_or_else(|_| HeaderValue::from_static("Basic realm=\"Restricted\""));

        Self {
            credentials: Arc::new(Credentials {
                username: digest(username.as_bytes()),
                password: digest(password.as_bytes()),
                challenge,
            }),
        }
    }
}

impl<S> Layer<S> for BasicAuthLayer {
    type Service = BasicAuth<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BasicAuth {
            inner,
            credentials: self.credentials.clone(),
        }
    }
}

#[derive(Clone)]
pub struct BasicAuth<S> {
    inner: S,
    credentials: Arc<Credentials>,
}

impl Credentials {
    fn matches(&self, header: Option<&HeaderValue>) -> bool {
        let Some((username, password)) = header.and_then(decode_basic) else {
            return false;
        };

        let username_ok = constant_time_eq(&self.username, &digest(username.as_bytes()));
        let password_ok = constant_time_eq(&self.password, &digest(password.as_bytes()));
        username_ok & password_ok
    }
}

impl<S> Service<Request<Body>> for BasicAuth<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        if self.credentials.matches(req.headers().get(AUTHORIZATION)) {
            return Box::pin(self.inner.call(req));
        }

        let mut response = problem::unauthorized("authentication required").into_response();
        response
            .headers_mut()
            .insert(WWW_AUTHENTICATE, self.credentials.challenge.clone());
        Box::pin(async move { Ok(response) })
    }
}

fn decode_basic(header: &HeaderValue) -> Option<(String, String)> {
    let value = header.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

fn digest(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

fn constant_time_eq(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
