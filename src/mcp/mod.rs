//! MCP (Model Context Protocol) server implementation for imagecraft
//!
//! Exposes image analysis and generation as MCP tools so AI assistants can
//! describe, compare and create images directly.
//!
//! Start the server with `imagecraft serve`.

mod server;
pub mod tools;

pub use server::{run_server, ImagecraftMcpServer};
