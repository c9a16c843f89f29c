//! Shared configuration and logging setup for the typegen binaries.

pub mod config;
pub mod logging;

pub use config::{CONFIG_FILENAME, QueriesConfig, TypegenConfig};
pub use logging::init_tracing;
