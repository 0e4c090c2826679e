//! MCP tool inputs and response formatting.
//!
//! Each tool has a `JsonSchema` input struct and a `run_*` function that
//! drives a dispatcher and renders the outcome as text.

pub mod analysis;
pub mod generation;

use rmcp::model::{CallToolResult, Content};

use crate::error::ImageToolError;

/// Convert a tool outcome into an MCP result. Failures become error results,
/// never protocol errors.
pub fn into_call_result(result: Result<String, ImageToolError>) -> CallToolResult {
    match result {
        Ok(text) => CallToolResult::success(vec![Content::text(text)]),
        Err(e) => {
            tracing::info!(kind = e.kind(), error = %e, "tool call failed");
            CallToolResult::error(vec![Content::text(format_error(&e))])
        }
    }
}

pub fn format_error(error: &ImageToolError) -> String {
    format!("Error [{}]: {}", error.kind(), error)
}

/// `1234567` -> `1,234,567`
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
