use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::types::{Evaluation, LogEntry, ProbeResult};
use crate::logs::EventLog;
use crate::models::{CHECKS_COLLECTION, Check, CheckState};
use crate::notify::Notifier;
use crate::storage::RecordStore;

/// Derive the new state and alert decision from a probe
///
/// Pure: the same prior check, probe result and timestamp always produce the
/// same evaluation. A check that has never been evaluated before never alerts.
pub fn evaluate(prior: &Check, result: &ProbeResult, checked_at: DateTime<Utc>) -> Evaluation {
    let state = match result.response_code {
        Some(code) if !result.errored && prior.accepts(code) => CheckState::Up,
        _ => CheckState::Down,
    };

    let alert_warranted = prior.last_checked.is_some() && prior.state != state;

    let mut check = prior.clone();
    check.state = state;
    check.last_checked = Some(checked_at);

    Evaluation { check, alert_warranted }
}

/// Text sent to the owner of a check that changed state
pub fn alert_message(check: &Check) -> String {
    format!(
        "Alert: Your check for {} {}://{} is currently {}",
        check.method,
        check.protocol.as_str().to_uppercase(),
        check.url,
        check.state
    )
}

/// Applies evaluations: persist, log, then alert
pub struct OutcomeProcessor {
    store: Arc<dyn RecordStore>,
    event_log: Arc<EventLog>,
    notifier: Arc<dyn Notifier>,
}

impl OutcomeProcessor {
    pub fn new(store: Arc<dyn RecordStore>, event_log: Arc<EventLog>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, event_log, notifier }
    }

    /// Evaluate and apply a probe result
    ///
    /// Each step is best effort: a failure is logged and the remaining steps
    /// still run.
    pub async fn process(&self, prior: &Check, result: ProbeResult) -> Evaluation {
        let now = Utc::now();
        let evaluation = evaluate(prior, &result, now);
        let check = &evaluation.check;

        match check.to_record() {
            Ok(record) => {
                if let Err(e) = self.store.update(CHECKS_COLLECTION, &check.id, &record).await {
                    error!(check_id = %check.id, "Failed to save check state: {}", e);
                }
            }
            Err(e) => error!(check_id = %check.id, "Failed to serialize check: {}", e),
        }

        let entry = LogEntry {
            check: check.clone(),
            outcome: result,
            state: check.state,
            alert: evaluation.alert_warranted,
            time: now,
        };
        if let Err(e) = self.event_log.append(&check.id, &entry).await {
            warn!(check_id = %check.id, "Failed to append to event log: {}", e);
        }

        if evaluation.alert_warranted {
            match self.notifier.send(&check.owner_id, &alert_message(check)).await {
                Ok(()) => info!(check_id = %check.id, state = %check.state, "Owner alerted to status change"),
                Err(e) => error!(check_id = %check.id, "Failed to alert owner: {}", e),
            }
        } else {
            debug!(check_id = %check.id, state = %check.state, "No alert needed");
        }

        evaluation
    }
}
