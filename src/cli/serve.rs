//! `imagecraft serve`: run the MCP server over stdio.

use std::process::ExitCode;

use tokio::runtime::Runtime;

use super::{EXIT_ERROR, EXIT_SUCCESS};
use crate::config::{api_key_from_env, ImagecraftConfig};
use crate::mcp::{run_server, ImagecraftMcpServer};

pub fn run_serve(config: &ImagecraftConfig) -> ExitCode {
    let api_key = match api_key_from_env() {
        Ok(key) => key,
        Err(e) => {
            tracing::error!(error = %e, "cannot start server");
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let server = match ImagecraftMcpServer::from_config(config, &api_key) {
        Ok(server) => server,
        Err(e) => {
            eprintln!("Error: Failed to set up OpenAI client: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let rt = match Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: Failed to create async runtime: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    match rt.block_on(run_server(server)) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            tracing::error!(error = %e, "MCP server stopped with an error");
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
