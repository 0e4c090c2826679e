//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod cache;
mod serve;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::config::{self, CliOverrides, ImagecraftConfig};
use crate::logging::init_logging;

/// Process exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// imagecraft - image analysis and generation over MCP
#[derive(Parser)]
#[command(name = "imagecraft")]
#[command(about = "imagecraft - cached image analysis and image generation for AI assistants over MCP")]
#[command(version)]
pub struct Cli {
    /// Path to imagecraft.toml (default: discovered from the current directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the analysis cache directory
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the MCP server on stdin/stdout
    Serve {
        /// Disable the analysis cache
        #[arg(long)]
        no_cache: bool,
    },
    /// Inspect or clear the analysis cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAction {
    /// Show cache location, entry count and size
    Info,
    /// Remove every cached analysis result
    Clear,
}

/// Load config, apply CLI overrides and start logging.
fn prepare(cli_config: Option<&PathBuf>, overrides: &CliOverrides) -> Result<ImagecraftConfig, ExitCode> {
    let mut config = match config::load_config(cli_config.map(PathBuf::as_path)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Err(ExitCode::from(EXIT_INVALID_ARGS));
        }
    };
    config::merge_cli_overrides(&mut config, overrides);
    init_logging(&config.logging);
    Ok(config)
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let no_cache = matches!(cli.command, Commands::Serve { no_cache: true });
    let overrides = CliOverrides { cache_dir: cli.cache_dir.clone(), no_cache };
    let config = match prepare(cli.config.as_ref(), &overrides) {
        Ok(config) => config,
        Err(code) => return code,
    };

    match cli.command {
        Commands::Serve { .. } => serve::run_serve(&config),
        Commands::Cache { action } => cache::run_cache(&config, action),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve_flags() {
        let cli = Cli::try_parse_from(["imagecraft", "serve", "--no-cache", "--cache-dir", "/tmp/c"])
            .unwrap();
        assert!(matches!(cli.command, Commands::Serve { no_cache: true }));
        assert_eq!(cli.cache_dir, Some(PathBuf::from("/tmp/c")));
    }

    #[test]
    fn test_parse_cache_actions() {
        let cli = Cli::try_parse_from(["imagecraft", "cache", "clear"]).unwrap();
        assert!(matches!(cli.command, Commands::Cache { action: CacheAction::Clear }));
        assert!(Cli::try_parse_from(["imagecraft", "cache", "purge"]).is_err());
    }
}
