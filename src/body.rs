// src/body.rs
//! Bounded JSON and form request body decoding.

use crate::problem::{self, ProblemDetail};
use hyper::body::HttpBody;
use hyper::Body;
use serde::de::DeserializeOwned;

pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum BodyError {
    #[error("empty request body")]
    Empty,

    #[error("request body exceeds maximum size of {0} bytes")]
    TooLarge(usize),

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("invalid form data: {0}")]
    InvalidForm(#[from] serde_urlencoded::de::Error),

    #[error("failed to read request body: {0}")]
    Read(#[from] hyper::Error),
}

impl From<BodyError> for ProblemDetail {
    fn from(err: BodyError) -> Self {
        match err {
            BodyError::TooLarge(_) => problem::payload_too_large(err.to_string()),
            _ => problem::bad_request(err.to_string()),
        }
    }
}

/// Decode a JSON body into `T`, reading at most `max_size` bytes.
///
/// Fields without a serde default are required; a body missing them is
/// rejected as invalid JSON.
pub async fn decode_json<T: DeserializeOwned>(
    body: Body,
    max_size: usize,
) -> Result<T, BodyError> {
    let buffer = read_bounded(body, max_size).await?;
    if buffer.iter().all(u8::is_ascii_whitespace) {
        return Err(BodyError::Empty);
    }

    Ok(serde_json::from_slice(&buffer)?)
}

/// Decode an `application/x-www-form-urlencoded` body into `T`.
///
/// An empty body decodes as an empty form, so only required fields reject it.
pub async fn decode_form<T: DeserializeOwned>(
    body: Body,
    max_size: usize,
) -> Result<T, BodyError> {
    let buffer = read_bounded(body, max_size).await?;
    Ok(serde_urlencoded::from_bytes(&buffer)?)
}

async fn read_bounded(mut body: Body, max_size: usize) -> Result<Vec<u8>, BodyError> {
    let mut buffer = Vec::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk?;
        if buffer.len() + chunk.len() > max_size {
            return Err(BodyError::TooLarge(max_size));
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer)
}
