use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio::time::sleep;
use tracing::debug;

use super::checker::{Checker, HttpChecker, ProbeError, ProbeRequest};
use super::types::ProbeResult;
use crate::models::Check;

/// Single-assignment slot: the first value resolved is delivered, later ones are dropped
pub struct ResolveOnce<T> {
    sender: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> ResolveOnce<T> {
    pub fn new() -> (Self, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        (Self { sender: Mutex::new(Some(tx)) }, rx)
    }

    /// Returns `true` if this call resolved the slot
    pub fn resolve(&self, value: T) -> bool {
        let sender = match self.sender.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        match sender {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }

    pub fn is_resolved(&self) -> bool {
        match self.sender.lock() {
            Ok(guard) => guard.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }
}

/// Probe executor - runs one request per check and reduces it to a `ProbeResult`
///
/// The response and the check's timer race against each other; whichever
/// completes first resolves the probe and the other is discarded.
pub struct ProbeExecutor {
    checker: Arc<dyn Checker>,
}

impl ProbeExecutor {
    pub fn new(checker: Arc<dyn Checker>) -> Self {
        Self { checker }
    }

    /// Executor using the real HTTP/HTTPS checker
    pub fn http() -> Result<Self, reqwest::Error> {
        Ok(Self::new(Arc::new(HttpChecker::new()?)))
    }

    pub async fn probe(&self, check: &Check) -> ProbeResult {
        let request = match ProbeRequest::from_check(check) {
            Ok(request) => request,
            Err(e) => return ProbeResult::transport_error(e.to_string()),
        };

        let (latch, outcome) = ResolveOnce::new();
        let latch = Arc::new(latch);

        let response_task = {
            let latch = Arc::clone(&latch);
            let checker = Arc::clone(&self.checker);
            let check_id = check.id.clone();
            tokio::spawn(async move {
                let result = match checker.check(&request).await {
                    Ok(status_code) => ProbeResult::response(status_code),
                    Err(ProbeError::TimedOut) => ProbeResult::timeout(),
                    Err(e) => ProbeResult::transport_error(e.to_string()),
                };
                if !latch.resolve(result) {
                    debug!(check_id = %check_id, "Discarded probe completion after timeout");
                }
            })
        };

        let timer_task = {
            let latch = Arc::clone(&latch);
            let timeout = check.timeout();
            let check_id = check.id.clone();
            tokio::spawn(async move {
                sleep(timeout).await;
                if !latch.resolve(ProbeResult::timeout()) {
                    debug!(check_id = %check_id, "Discarded probe timeout after completion");
                }
            })
        };

        // The timer task always resolves, so the sender is never dropped unresolved
        let result = outcome
            .await
            .unwrap_or_else(|_| ProbeResult::transport_error("probe was cancelled"));

        response_task.abort();
        timer_task.abort();

        result
    }
}
