//! Cron scheduling for background sync maintenance
//!
//! The scheduler follows the runtime rules used across the crate: explicit
//! start/stop, tracked join handles, cancellation tokens and timeouts on
//! every lifecycle call.

pub mod error;
pub mod sync_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use sync_scheduler::{SchedulerJobs, SyncScheduler, SyncSchedulerConfig};
