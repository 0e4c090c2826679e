//! imagecraft - image analysis and generation tools for AI assistants
//!
//! This library provides:
//! - Vision-model image analysis behind a content-addressed disk cache
//! - Image generation, editing and variations with per-model validation
//! - An MCP server exposing both as tools

pub mod analysis;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod generation;
pub mod inspect;
pub mod logging;
pub mod mcp;
pub mod openai;
pub mod paths;

pub use error::ImageToolError;
