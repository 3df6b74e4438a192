//! Shape and range checks applied to raw check records before probing.
//!
//! Records come straight from the record store and may have been written by
//! anything, so every field is checked on its own. A record that fails any
//! required field is rejected as a whole; `state` and `lastChecked` fall back
//! to their defaults instead.

use chrono::DateTime;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::{Check, CheckState, Method, OwnerKey, Protocol};

const MIN_TIMEOUT_SECONDS: i64 = 1;
const MAX_TIMEOUT_SECONDS: i64 = 5;

/// Fields owned by the worker, everything else is carried through in `Check::extra`
///
/// The owner key that was read is excluded separately, the other one is extra.
const KNOWN_FIELDS: [&str; 8] = [
    "id",
    "protocol",
    "url",
    "method",
    "successCodes",
    "timeoutSeconds",
    "state",
    "lastChecked",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Check record is not an object")]
    NotAnObject,

    #[error("Invalid `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: &'static str },
}

fn invalid(field: &'static str, reason: &'static str) -> ValidationError {
    ValidationError::InvalidField { field, reason }
}

/// Integral JSON number, accepting `2.0` but not `2.5`
fn as_integer(value: &Value) -> Option<i64> {
    if let Some(int) = value.as_i64() {
        return Some(int);
    }
    value.as_f64().filter(|float| float.fract() == 0.0 && float.is_finite()).map(|float| float as i64)
}

fn non_blank_string<'a>(
    record: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, ValidationError> {
    match record.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.as_str()),
        Some(Value::String(_)) => Err(invalid(field, "must not be blank")),
        Some(_) => Err(invalid(field, "must be a string")),
        None => Err(invalid(field, "is missing")),
    }
}

fn validate_id(record: &Map<String, Value>) -> Result<String, ValidationError> {
    let id = non_blank_string(record, "id")?;
    // The id names the check's log stream on disk
    if id.contains(['/', '\\']) || id.contains("..") {
        return Err(invalid("id", "must not contain path separators"));
    }
    Ok(id.to_string())
}

fn validate_owner(record: &Map<String, Value>) -> Result<(String, OwnerKey), ValidationError> {
    let key = if record.contains_key(OwnerKey::UserPhone.as_str()) {
        OwnerKey::UserPhone
    } else {
        OwnerKey::OwnerId
    };
    let owner = non_blank_string(record, key.as_str())?;
    Ok((owner.to_string(), key))
}

fn validate_success_codes(record: &Map<String, Value>) -> Result<Vec<u16>, ValidationError> {
    let Some(Value::Array(raw_codes)) = record.get("successCodes") else {
        return Err(invalid("successCodes", "must be an array"));
    };
    if raw_codes.is_empty() {
        return Err(invalid("successCodes", "must not be empty"));
    }

    let mut codes = Vec::with_capacity(raw_codes.len());
    for raw in raw_codes {
        let code = as_integer(raw)
            .filter(|code| (100..=599).contains(code))
            .ok_or_else(|| invalid("successCodes", "entries must be status codes (100-599)"))?;
        let code = code as u16;
        if !codes.contains(&code) {
            codes.push(code);
        }
    }
    Ok(codes)
}

fn validate_timeout(record: &Map<String, Value>) -> Result<u64, ValidationError> {
    record
        .get("timeoutSeconds")
        .and_then(as_integer)
        .filter(|seconds| (MIN_TIMEOUT_SECONDS..=MAX_TIMEOUT_SECONDS).contains(seconds))
        .map(|seconds| seconds as u64)
        .ok_or_else(|| invalid("timeoutSeconds", "must be a whole number between 1 and 5"))
}

/// Validate a raw check record, returning the normalized check
pub fn validate_check(raw: &Value) -> Result<Check, ValidationError> {
    let record = raw.as_object().ok_or(ValidationError::NotAnObject)?;

    let id = validate_id(record)?;
    let (owner_id, owner_key) = validate_owner(record)?;
    let protocol = record
        .get("protocol")
        .and_then(Value::as_str)
        .and_then(Protocol::parse)
        .ok_or_else(|| invalid("protocol", "must be http or https"))?;
    let url = non_blank_string(record, "url")?.to_string();
    let method = record
        .get("method")
        .and_then(Value::as_str)
        .and_then(Method::parse)
        .ok_or_else(|| invalid("method", "must be one of get, post, put, delete"))?;
    let success_codes = validate_success_codes(record)?;
    let timeout_seconds = validate_timeout(record)?;

    // Never-probed checks have neither of these yet
    let state = record
        .get("state")
        .and_then(Value::as_str)
        .and_then(CheckState::parse)
        .unwrap_or_default();
    let last_checked = record
        .get("lastChecked")
        .and_then(as_integer)
        .filter(|millis| *millis > 0)
        .and_then(DateTime::from_timestamp_millis);

    let extra = record
        .iter()
        .filter(|(key, _)| {
            !KNOWN_FIELDS.contains(&key.as_str()) && key.as_str() != owner_key.as_str()
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Ok(Check {
        id,
        owner_id,
        owner_key,
        protocol,
        url,
        method,
        success_codes,
        timeout_seconds,
        state,
        last_checked,
        extra,
    })
}
