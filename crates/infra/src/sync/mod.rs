//! Background dispatch of sync passes

pub mod queue_worker;

pub use queue_worker::{SyncQueueHandle, SyncQueueWorker, SyncQueueWorkerConfig};
