/// Monitoring engine module - turns stored checks into up/down states
///
/// This module is responsible for:
/// - Validating raw check records
/// - Probing HTTP/HTTPS targets with a per-check timeout
/// - Evaluating probe results into state transitions and alerts
/// - Scheduling poll cycles over every stored check
pub mod checker;
pub mod evaluator;
pub mod executor;
pub mod scheduler;
pub mod types;
pub mod validation;

pub use evaluator::{OutcomeProcessor, evaluate};
pub use executor::ProbeExecutor;
pub use scheduler::{PollScheduler, PollSummary};
pub use types::{Evaluation, LogEntry, ProbeResult};
pub use validation::{ValidationError, validate_check};
