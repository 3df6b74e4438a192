/// Orchestrator module - wires the worker components together
///
/// The orchestrator owns the configuration, the poll scheduler, the log
/// rotator and the handles of their background loops. It is built once at
/// process start and dropped with it.

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::Config;
use crate::logs::{EventLog, LogRotator};
use crate::monitoring::{OutcomeProcessor, PollScheduler, PollSummary, ProbeExecutor};
use crate::notify::{Notifier, TracingNotifier, TwilioNotifier};
use crate::storage::{FileStore, RecordStore};

/// Main orchestrator for the worker process
pub struct Orchestrator {
    config: Arc<Config>,
    scheduler: Arc<PollScheduler>,
    rotator: Arc<LogRotator>,
    task_handles: Vec<JoinHandle<()>>,
}

impl Orchestrator {
    /// Build the components described by the configuration
    pub fn new(config: Config) -> Result<Self> {
        let store: Arc<dyn RecordStore> = Arc::new(FileStore::new(config.storage.data_dir.clone()));

        let notifier: Arc<dyn Notifier> = match &config.twilio {
            Some(twilio) => {
                info!("Sending alerts through {}", twilio.api_base);
                Arc::new(TwilioNotifier::new(twilio.clone()).context("Failed to build SMS client")?)
            }
            None => {
                info!("No SMS gateway configured, alerts will only be logged");
                Arc::new(TracingNotifier)
            }
        };

        let executor = Arc::new(ProbeExecutor::http().context("Failed to build HTTP client")?);

        Ok(Self::with_components(config, store, executor, notifier))
    }

    /// Build from already constructed collaborators
    pub fn with_components(
        config: Config,
        store: Arc<dyn RecordStore>,
        executor: Arc<ProbeExecutor>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let event_log = Arc::new(EventLog::new(config.storage.logs_dir.clone()));
        let rotator = Arc::new(event_log.rotator());
        let processor = Arc::new(OutcomeProcessor::new(Arc::clone(&store), event_log, notifier));
        let scheduler = Arc::new(PollScheduler::new(
            store,
            executor,
            processor,
            config.workers.check_interval(),
        ));

        Self { config: Arc::new(config), scheduler, rotator, task_handles: Vec::new() }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn rotator(&self) -> &LogRotator {
        &self.rotator
    }

    /// Run a single poll cycle to completion
    pub async fn poll_once(&self) -> PollSummary {
        self.scheduler.poll_once().await
    }

    /// Start the poll and rotation loops
    pub fn start(&mut self) {
        if !self.task_handles.is_empty() {
            return;
        }

        info!(
            "Starting workers: checks every {}s, log rotation every {}s",
            self.config.workers.check_interval_seconds, self.config.workers.rotation_interval_seconds
        );

        self.task_handles.push(Arc::clone(&self.scheduler).start());
        self.task_handles
            .push(Arc::clone(&self.rotator).start_periodic_rotation(self.config.workers.rotation_interval()));
    }

    pub fn is_running(&self) -> bool {
        self.task_handles.iter().any(|handle| !handle.is_finished())
    }

    /// Stop the background loops; in-flight check tasks finish on their own
    pub fn shutdown(&mut self) {
        for handle in self.task_handles.drain(..) {
            handle.abort();
        }
        info!("Workers stopped");
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        for handle in &self.task_handles {
            handle.abort();
        }
    }
}
