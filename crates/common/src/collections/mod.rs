//! Specialized data structures
//!
//! - **[`expiring`]**: time-indexed store with single-use lookups

pub mod expiring;

pub use expiring::ExpiringStore;
