//! Configuration for the imagecraft server
//!
//! Provides types and parsing for `imagecraft.toml`, plus environment
//! credentials.

pub mod loader;
pub mod schema;

pub use loader::{
    api_key_from_env, find_config, find_config_from, load_config, merge_cli_overrides,
    CliOverrides, ConfigError, CONFIG_FILE_NAME,
};
pub use schema::*;
