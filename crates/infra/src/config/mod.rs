//! Configuration loading
//!
//! Loads the application [`Config`](calsync_domain::Config) from `CALSYNC_*`
//! environment variables or from a JSON/TOML file.

pub mod loader;

pub use loader::{load, load_from_env, load_from_file, probe_config_paths};
