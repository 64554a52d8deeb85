// src/health/http.rs
use super::checker::{CheckOutcome, Checker};
use super::context::CheckContext;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use url::Url;

/// Checks a downstream dependency with `GET url`.
///
/// Healthy when the response status equals `expected_status`, or is any 2xx
/// when none is configured.
pub struct HttpChecker {
    name: String,
    url: Url,
    expected_status: Option<StatusCode>,
    client: Client,
}

impl HttpChecker {
    pub fn new(name: impl Into<String>, url: Url) -> Self {
        Self::with_client(name, url, Client::new())
    }

    pub fn with_client(name: impl Into<String>, url: Url, client: Client) -> Self {
        Self {
            name: name.into(),
            url,
            expected_status: None,
            client,
        }
    }

    pub fn expect_status(mut self, status: StatusCode) -> Self {
        self.expected_status = Some(status);
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn accepts(&self, status: StatusCode) -> bool {
        match self.expected_status {
            Some(expected) => status == expected,
            None => status.is_success(),
        }
    }
}

#[async_trait]
impl Checker for HttpChecker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, ctx: &CheckContext) -> CheckOutcome {
        let request = self.client.get(self.url.clone()).send();

        let result = tokio::select! {
            result = request => result,
            err = ctx.done() => return CheckOutcome::error(err.to_string()),
        };

        match result {
            Ok(response) if self.accepts(response.status()) => {
                CheckOutcome::ok().with_message(format!("HTTP {}", response.status()))
            }
            Ok(response) => CheckOutcome::error(format!("unexpected HTTP {}", response.status())),
            Err(e) => CheckOutcome::error(e.to_string()),
        }
    }
}
