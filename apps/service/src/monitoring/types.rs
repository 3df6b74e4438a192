use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Check, CheckState};

/// Error detail recorded when the probe timer wins the race
pub const TIMEOUT_DETAIL: &str = "timeout";

/// Reduced outcome of a single probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    /// Whether the probe failed before a response arrived
    pub errored: bool,

    /// Transport error message, or `"timeout"`
    pub error_detail: Option<String>,

    /// HTTP status code of the response, if one arrived
    pub response_code: Option<u16>,
}

impl ProbeResult {
    /// A response arrived with the given status code
    pub fn response(status_code: u16) -> Self {
        Self { errored: false, error_detail: None, response_code: Some(status_code) }
    }

    /// The transport reported a connection or protocol error
    pub fn transport_error(detail: impl Into<String>) -> Self {
        Self { errored: true, error_detail: Some(detail.into()), response_code: None }
    }

    /// The probe timer elapsed first
    pub fn timeout() -> Self {
        Self::transport_error(TIMEOUT_DETAIL)
    }

    pub fn is_timeout(&self) -> bool {
        self.errored && self.error_detail.as_deref() == Some(TIMEOUT_DETAIL)
    }
}

/// One line of a check's event log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub check: Check,
    pub outcome: ProbeResult,
    pub state: CheckState,
    pub alert: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub time: DateTime<Utc>,
}

/// Result of evaluating a probe against the prior check
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Check with the derived state and new `last_checked`
    pub check: Check,
    pub alert_warranted: bool,
}
