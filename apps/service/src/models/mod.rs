/// Persisted domain types shared by the worker components
pub mod check;

pub use check::{CHECKS_COLLECTION, Check, CheckState, Method, OwnerKey, Protocol};
