use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::models::Check;

/// Outbound request derived from a check
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    pub method: reqwest::Method,
    pub host: String,
    /// Path including the query string
    pub path: String,
    pub url: Url,
    pub timeout: Duration,
}

impl ProbeRequest {
    /// Parse `protocol://url` into the request target
    pub fn from_check(check: &Check) -> Result<Self, ProbeError> {
        let target = check.target();
        let url = Url::parse(&target).map_err(|e| ProbeError::InvalidTarget(format!("{target}: {e}")))?;
        let host = url
            .host_str()
            .ok_or_else(|| ProbeError::InvalidTarget(format!("{target}: missing host")))?
            .to_string();

        let path = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };

        Ok(Self { method: check.method.to_wire(), host, path, url, timeout: check.timeout() })
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Invalid probe target {0}")]
    InvalidTarget(String),

    #[error("Request timed out")]
    TimedOut,

    #[error("{0}")]
    Transport(String),
}

/// Issues a single request and reports the response status code
#[async_trait]
pub trait Checker: Send + Sync {
    async fn check(&self, request: &ProbeRequest) -> Result<u16, ProbeError>;
}

/// HTTP/HTTPS checker backed by a shared connection pool
pub struct HttpChecker {
    client: reqwest::Client,
}

impl HttpChecker {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("pulsewatch/", env!("CARGO_PKG_VERSION")))
            // A redirect is a status code like any other
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Checker for HttpChecker {
    async fn check(&self, request: &ProbeRequest) -> Result<u16, ProbeError> {
        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { ProbeError::TimedOut } else { ProbeError::Transport(e.to_string()) })?;

        Ok(response.status().as_u16())
    }
}
