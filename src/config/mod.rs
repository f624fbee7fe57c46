//! Configuration module for sitepipe
//!
//! Provides types and parsing for `sitepipe.toml` project configuration.

pub mod loader;
pub mod schema;

pub use loader::{load_config, CliOverrides, ConfigError, CONFIG_FILE};
pub use schema::*;
