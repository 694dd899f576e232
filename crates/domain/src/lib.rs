//! # CalSync Domain
//!
//! Domain types for the calendar synchronization engine.
//!
//! This crate contains:
//! - Integration, event, ledger and unified-event types
//! - Typed raw provider payloads
//! - Domain error types and Result definitions
//! - Configuration structures
//!
//! ## Architecture
//! - No dependencies on other CalSync crates
//! - Only external dependencies allowed

pub mod config;
pub mod errors;
pub mod macros;
pub mod types;

pub use config::*;
pub use errors::*;
pub use types::*;
