pub mod interceptor;
mod macros;
pub mod params;
mod server;
mod types;

pub use server::{execute_tool, list_tools, Server};
pub use types::{Request, Response, RpcError, ToolDefinition, ToolParams, ToolProvider};
