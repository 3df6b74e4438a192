//! Outbound user notifications.
//!
//! The worker only depends on the [`Notifier`] contract. Recipient validity is
//! left to each implementation.

pub mod twilio;

pub use twilio::{TwilioConfig, TwilioNotifier};

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Gateway request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Gateway rejected the message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Delivers a message to a user
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &str, message: &str) -> Result<(), NotifyError>;
}

/// Notifier used when no gateway is configured, the alert only reaches the log
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send(&self, recipient: &str, message: &str) -> Result<(), NotifyError> {
        info!(recipient, "{message}");
        Ok(())
    }
}
