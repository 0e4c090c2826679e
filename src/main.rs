//! imagecraft - MCP server for cached image analysis and image generation

use std::process::ExitCode;

use imagecraft::cli;

fn main() -> ExitCode {
    cli::run()
}
