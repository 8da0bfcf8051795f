//! MCP tool surface: argument parsing, definitions, dispatch and rendering.

mod args;
mod definitions;
mod dispatch;
pub mod names;
mod render;

pub use definitions::tool_definitions;
pub use dispatch::{ToolCall, ToolDispatcher};
