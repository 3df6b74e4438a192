use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Collection holding check records in the record store
pub const CHECKS_COLLECTION: &str = "checks";

/// Scheme used to reach a check's target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP method a check is probed with, stored lowercase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "get" => Some(Self::Get),
            "post" => Some(Self::Post),
            "put" => Some(Self::Put),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Post => "post",
            Method::Put => "put",
            Method::Delete => "delete",
        }
    }

    /// Method name as sent on the wire
    pub fn to_wire(&self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Up/down classification of a check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Up,
    #[default]
    Down,
}

impl CheckState {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            _ => None,
        }
    }
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckState::Up => write!(f, "up"),
            CheckState::Down => write!(f, "down"),
        }
    }
}

/// Store key a check's owner was read from
///
/// Records written by the API layer may name the owner either way; writing a
/// record back keeps the key it arrived with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OwnerKey {
    #[default]
    UserPhone,
    OwnerId,
}

impl OwnerKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerKey::UserPhone => "userPhone",
            OwnerKey::OwnerId => "ownerId",
        }
    }
}

/// A monitored endpoint, as persisted in the `checks` collection
///
/// Only `state` and `last_checked` are ever changed by the worker. Fields the
/// API layer stores next to the check are kept in `extra` so that writing the
/// record back does not drop them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Check {
    pub id: String,

    /// Owning user, a phone number for SMS alerts
    #[serde(rename = "userPhone", alias = "ownerId")]
    pub owner_id: String,

    #[serde(skip)]
    pub owner_key: OwnerKey,

    pub protocol: Protocol,

    /// Host and path, without the scheme
    pub url: String,

    pub method: Method,

    pub success_codes: Vec<u16>,

    pub timeout_seconds: u64,

    #[serde(default)]
    pub state: CheckState,

    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub last_checked: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Check {
    /// Full target address, `protocol://url`
    pub fn target(&self) -> String {
        format!("{}://{}", self.protocol, self.url)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn accepts(&self, status_code: u16) -> bool {
        self.success_codes.contains(&status_code)
    }

    /// Serialize back into a raw store record
    pub fn to_record(&self) -> serde_json::Result<serde_json::Value> {
        let mut record = serde_json::to_value(self)?;
        if self.owner_key != OwnerKey::UserPhone {
            if let Some(fields) = record.as_object_mut() {
                if let Some(owner) = fields.remove(OwnerKey::UserPhone.as_str()) {
                    fields.insert(self.owner_key.as_str().to_string(), owner);
                }
            }
        }
        Ok(record)
    }
}
