//! pulsewatch - polls user-registered HTTP/HTTPS checks, tracks their up/down
//! state and alerts owners when it changes.

pub mod config;
pub mod logs;
pub mod models;
pub mod monitoring;
pub mod notify;
pub mod orchestrator;
pub mod storage;

pub use config::Config;
pub use orchestrator::Orchestrator;
