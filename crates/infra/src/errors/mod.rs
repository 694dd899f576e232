//! Infrastructure error handling

pub(crate) mod conversions;

pub use conversions::InfraError;
