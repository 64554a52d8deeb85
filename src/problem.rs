// src/problem.rs
//! RFC 9457 problem details.

use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::error;

pub const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";

const RESERVED_MEMBERS: [&str; 5] = ["type", "title", "status", "detail", "instance"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemDetail {
    /// URI reference identifying the problem type; omitted means `about:blank`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub problem_type: Option<String>,

    pub title: String,

    pub status: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,

    /// Problem-type specific members, written at the top level.
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl ProblemDetail {
    pub fn new(status: StatusCode, title: impl Into<String>) -> Self {
        Self {
            problem_type: None,
            title: title.into(),
            status: status.as_u16(),
            detail: None,
            instance: None,
            extensions: Map::new(),
        }
    }

    /// A problem titled with the status code's canonical reason.
    pub fn from_status(status: StatusCode) -> Self {
        Self::new(status, status.canonical_reason().unwrap_or("Unknown Status"))
    }

    pub fn with_type(mut self, type_uri: impl Into<String>) -> Self {
        self.problem_type = Some(type_uri.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    /// Add an extension member. Names of the standard members are ignored.
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if RESERVED_MEMBERS.contains(&key.as_str()) {
            tracing::debug!(%key, "ignoring problem extension that shadows a standard member");
            return self;
        }
        self.extensions.insert(key, value.into());
        self
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn into_response(self) -> Response<Body> {
        let status = self.status_code();
        let body = match serde_json::to_vec(&self) {
            Ok(mut bytes) => {
                bytes.push(b'\n');
                Body::from(bytes)
            }
            Err(err) => {
                error!(status = self.status, %err, "failed to encode problem detail");
                Body::empty()
            }
        };

        let mut response = Response::new(body);
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(PROBLEM_CONTENT_TYPE));
        response
    }
}

impl From<ProblemDetail> for Response<Body> {
    fn from(problem: ProblemDetail) -> Self {
        problem.into_response()
    }
}

pub fn bad_request(detail: impl Into<String>) -> ProblemDetail {
    ProblemDetail::from_status(StatusCode::BAD_REQUEST).with_detail(detail)
}

pub fn unauthorized(detail: impl Into<String>) -> ProblemDetail {
    ProblemDetail::from_status(StatusCode::UNAUTHORIZED).with_detail(detail)
}

pub fn forbidden(detail: impl Into<String>) -> ProblemDetail {
    ProblemDetail::from_status(StatusCode::FORBIDDEN).with_detail(detail)
}

pub fn not_found(detail: impl Into<String>) -> ProblemDetail {
    ProblemDetail::from_status(StatusCode::NOT_FOUND).with_detail(detail)
}

pub fn method_not_allowed(detail: impl Into<String>) -> ProblemDetail {
    ProblemDetail::from_status(StatusCode::METHOD_NOT_ALLOWED).with_detail(detail)
}

pub fn conflict(detail: impl Into<String>) -> ProblemDetail {
    ProblemDetail::from_status(StatusCode::CONFLICT).with_detail(detail)
}

pub fn payload_too_large(detail: impl Into<String>) -> ProblemDetail {
    ProblemDetail::from_status(StatusCode::PAYLOAD_TOO_LARGE).with_detail(detail)
}

pub fn unprocessable_entity(detail: impl Into<String>) -> ProblemDetail {
    ProblemDetail::from_status(StatusCode::UNPROCESSABLE_ENTITY).with_detail(detail)
}

pub fn internal_server_error(detail: impl Into<String>) -> ProblemDetail {
    ProblemDetail::from_status(StatusCode::INTERNAL_SERVER_ERROR).with_detail(detail)
}

pub fn service_unavailable(detail: impl Into<String>) -> ProblemDetail {
    ProblemDetail::from_status(StatusCode::SERVICE_UNAVAILABLE).with_detail(detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_problem_omits_optional_members() {
        let problem = ProblemDetail::new(StatusCode::NOT_FOUND, "Not Found");
        let value = serde_json::to_value(problem).unwrap();
        assert_eq!(value, json!({"title": "Not Found", "status": 404}));
    }

    #[test]
    fn test_full_problem_with_extensions() {
        let problem = unprocessable_entity("email is invalid")
            .with_type("https://example.com/probs/validation")
            .with_instance("/users/42")
            .with_extension("field", "email")
            .with_extension("status", 200);

        let value = serde_json::to_value(&problem).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "https://example.com/probs/validation",
                "title": "Unprocessable Entity",
                "status": 422,
                "detail": "email is invalid",
                "instance": "/users/42",
                "field": "email"
            })
        );
    }

    #[tokio::test]
    async fn test_into_response() {
        let response = service_unavailable("warming up").into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[CONTENT_TYPE], PROBLEM_CONTENT_TYPE);

        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let problem: ProblemDetail = serde_json::from_slice(&body).unwrap();
        assert_eq!(problem.title, "Service Unavailable");
        assert_eq!(problem.detail.as_deref(), Some("warming up"));
    }

    #[test]
    fn test_constructor_titles() {
        assert_eq!(bad_request("x").title, "Bad Request");
        assert_eq!(unauthorized("x").status, 401);
        assert_eq!(forbidden("x").title, "Forbidden");
        assert_eq!(not_found("x").status, 404);
        assert_eq!(conflict("x").status, 409);
        assert_eq!(payload_too_large("x").status, 413);
        assert_eq!(internal_server_error("x").title, "Internal Server Error");
    }
}
