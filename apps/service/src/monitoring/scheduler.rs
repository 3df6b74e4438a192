use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use super::evaluator::OutcomeProcessor;
use super::executor::ProbeExecutor;
use super::types::Evaluation;
use super::validation::validate_check;
use crate::models::CHECKS_COLLECTION;
use crate::storage::RecordStore;

/// Counts for one poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub evaluated: usize,
    pub alerts: usize,
    pub rejected: usize,
    pub unreadable: usize,
}

/// Poll scheduler - runs every check through validate, probe and evaluate
pub struct PollScheduler {
    store: Arc<dyn RecordStore>,
    executor: Arc<ProbeExecutor>,
    processor: Arc<OutcomeProcessor>,
    every: Duration,
}

enum CheckOutcome {
    Evaluated(Evaluation),
    Rejected,
    Unreadable,
}

impl PollScheduler {
    pub fn new(
        store: Arc<dyn RecordStore>,
        executor: Arc<ProbeExecutor>,
        processor: Arc<OutcomeProcessor>,
        every: Duration,
    ) -> Self {
        Self { store, executor, processor, every }
    }

    /// Read, validate, probe and evaluate a single check
    async fn run_check(
        store: Arc<dyn RecordStore>,
        executor: Arc<ProbeExecutor>,
        processor: Arc<OutcomeProcessor>,
        id: String,
    ) -> CheckOutcome {
        let raw = match store.read(CHECKS_COLLECTION, &id).await {
            Ok(raw) => raw,
            Err(e) => {
                error!(check_id = %id, "Failed to read check: {}", e);
                return CheckOutcome::Unreadable;
            }
        };

        let check = match validate_check(&raw) {
            Ok(check) => check,
            Err(e) => {
                warn!(check_id = %id, "Skipping malformed check: {}", e);
                return CheckOutcome::Rejected;
            }
        };

        let result = executor.probe(&check).await;
        debug!(check_id = %check.id, ?result, "Probe finished");

        CheckOutcome::Evaluated(processor.process(&check, result).await)
    }

    /// Run one poll cycle over every stored check and wait for all of them
    ///
    /// Checks run concurrently, one task each. A failure in one check never
    /// affects the others.
    pub async fn poll_once(&self) -> PollSummary {
        let ids = match self.store.list(CHECKS_COLLECTION).await {
            Ok(ids) => ids,
            Err(e) => {
                error!("Failed to list checks: {}", e);
                return PollSummary::default();
            }
        };

        if ids.is_empty() {
            debug!("No checks to process");
            return PollSummary::default();
        }

        let mut tasks = JoinSet::new();
        for id in ids {
            tasks.spawn(Self::run_check(
                Arc::clone(&self.store),
                Arc::clone(&self.executor),
                Arc::clone(&self.processor),
                id,
            ));
        }

        let mut summary = PollSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(CheckOutcome::Evaluated(evaluation)) => {
                    summary.evaluated += 1;
                    if evaluation.alert_warranted {
                        summary.alerts += 1;
                    }
                }
                Ok(CheckOutcome::Rejected) => summary.rejected += 1,
                Ok(CheckOutcome::Unreadable) => summary.unreadable += 1,
                Err(e) => {
                    error!("Check task failed: {}", e);
                    summary.unreadable += 1;
                }
            }
        }

        summary
    }

    /// Start polling: once immediately, then every interval
    ///
    /// Each cycle runs in its own task, so a slow cycle never delays the next
    /// firing and cycles may overlap.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut timer = interval(self.every);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                timer.tick().await;

                let scheduler = Arc::clone(&self);
                tokio::spawn(async move {
                    let summary = scheduler.poll_once().await;
                    info!(
                        evaluated = summary.evaluated,
                        alerts = summary.alerts,
                        rejected = summary.rejected,
                        unreadable = summary.unreadable,
                        "Poll cycle finished"
                    );
                });
            }
        })
    }
}
