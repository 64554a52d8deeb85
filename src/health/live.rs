// src/health/live.rs
use super::status::Status;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveResponse {
    pub status: Status,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub uptime: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub environment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

/// Answers liveness: the process is up, nothing else is consulted.
#[derive(Debug, Clone)]
pub struct LivenessResponder {
    version: String,
    environment: String,
    host: String,
    started: Instant,
    started_at: DateTime<Utc>,
}

impl LivenessResponder {
    pub fn new(version: impl Into<String>, environment: impl Into<String>) -> Self {
        let host = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());

        Self {
            version: version.into(),
            environment: environment.into(),
            host,
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    pub fn respond(&self) -> LiveResponse {
        LiveResponse {
            status: Status::Ok,
            version: self.version.clone(),
            uptime: format!("{:?}", self.started.elapsed()),
            host: self.host.clone(),
            environment: self.environment.clone(),
            started_at: Some(self.started_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_always_ok_with_uptime() {
        let responder = LivenessResponder::new("1.2.3", "eu-central-1-dev");
        tokio::time::advance(Duration::from_secs(3)).await;

        let response = responder.respond();

        assert_eq!(response.status, Status::Ok);
        assert_eq!(response.version, "1.2.3");
        assert_eq!(response.environment, "eu-central-1-dev");
        assert_eq!(response.uptime, "3s");
        assert!(!response.host.is_empty());
    }
}
