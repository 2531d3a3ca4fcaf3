//! MCP server exposing the Todoist "today + overdue" task list as a tool.

pub mod config;
pub mod error;
pub mod mcp;
pub mod todoist;
pub mod tools;
