//! MCP server over stdio.

pub mod protocol;
mod stdio;

pub use stdio::McpServer;
