/// Record store abstraction
///
/// The worker only needs to list, read and update records. The file-backed
/// store keeps one JSON document per record under `<base>/<collection>/<id>.json`.
pub mod repository;

pub use repository::{FileStore, RecordStore, StoreError};
