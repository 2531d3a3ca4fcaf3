use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{error::ToolError, tools::ToolContext};

#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    /// Absent for notifications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    pub id: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_owned(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: serde_json::Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_owned(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    /// Server-defined range, used for rejected credentials
    pub const UNAUTHORIZED: i64 = -32001;

    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(Self::INVALID_PARAMS, message)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

/// Arguments of a tool, with the JSON schema advertised for them.
pub trait ToolParams: Sized {
    fn input_schema() -> serde_json::Value;

    fn extract_params(arguments: &serde_json::Value) -> Result<Self, ToolError>;
}

pub trait ToolProvider: Sized + Send + Sync {
    const NAME: &'static str;
    const DESCRIPTION: &'static str;
    type Params: ToolParams + Send;

    fn from_context(context: &ToolContext) -> Self;

    fn get_tool_definition() -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_owned(),
            description: Self::DESCRIPTION.to_owned(),
            input_schema: Self::Params::input_schema(),
        }
    }

    fn execute_with_params(
        &self,
        params: Self::Params,
    ) -> impl Future<Output = Result<serde_json::Value, ToolError>> + Send;

    fn execute(
        &self,
        arguments: &serde_json::Value,
    ) -> impl Future<Output = Result<serde_json::Value, ToolError>> + Send {
        async move {
            let params = Self::Params::extract_params(arguments)?;
            self.execute_with_params(params).await
        }
    }
}
