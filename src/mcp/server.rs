use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response as HttpResponse},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::{
    config::Config,
    error::ToolError,
    mcp::{
        interceptor::{ClientIdentity, InboundCall, InterceptorChain, Rejection},
        macros::register_tools,
        Request, Response, RpcError, ToolProvider,
    },
    todoist::{TaskSource, TodoistClient},
    tools::ToolContext,
};

register_tools! {
    crate::tools::today::ListToday,
}

const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];
const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
struct AppState {
    context: ToolContext,
    interceptors: Arc<InterceptorChain>,
}

pub struct Server;

impl Server {
    pub async fn run(config: Arc<Config>) -> Result<()> {
        let client = TodoistClient::new(&config.todoist).context("Failed to build Todoist client")?;
        let app = Self::router(config.clone(), Arc::new(client));

        let addr = config.server.listen_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;

        tracing::info!(
            "MCP server listening on http://{}{} (auth {})",
            listener.local_addr()?,
            config.server.path,
            if config.auth.is_enabled() { "enabled" } else { "disabled" }
        );

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    /// Routes of the server, with `tasks` as the Todoist backend.
    pub fn router(config: Arc<Config>, tasks: Arc<dyn TaskSource>) -> Router {
        let state = AppState {
            interceptors: Arc::new(InterceptorChain::from_config(&config)),
            context: ToolContext::new(config.clone(), tasks),
        };

        Router::new()
            .route(&config.server.path, post(handle_http))
            .route("/health", get(health))
            .with_state(state)
    }

    async fn handle_request(
        context: &ToolContext,
        request: Request,
        client: Option<&ClientIdentity>,
    ) -> std::result::Result<Value, RpcError> {
        match request.method.as_str() {
            "initialize" => Ok(Self::handle_initialize(request.params.as_ref())),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(Self::handle_list_tools(context)),
            "tools/call" => Self::handle_call_tool(context, request.params.as_ref(), client).await,
            method => Err(RpcError::new(
                RpcError::METHOD_NOT_FOUND,
                format!("Method not found: {method}"),
            )),
        }
    }

    fn handle_initialize(params: Option<&Value>) -> Value {
        let requested = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str);
        let protocol_version = requested
            .filter(|v| SUPPORTED_PROTOCOL_VERSIONS.contains(v))
            .unwrap_or(SUPPORTED_PROTOCOL_VERSIONS[0]);

        json!({
            "protocolVersion": protocol_version,
            "capabilities": {
                "tools": {"listChanged": false}
            },
            "serverInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION")
            }
        })
    }

    fn handle_list_tools(context: &ToolContext) -> Value {
        let tools = list_tools(&context.config);
        json!({
            "tools": tools
        })
    }

    async fn handle_call_tool(
        context: &ToolContext,
        params: Option<&Value>,
        client: Option<&ClientIdentity>,
    ) -> std::result::Result<Value, RpcError> {
        let params = params.ok_or_else(|| RpcError::invalid_params("Missing parameters"))?;
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("Missing tool name"))?;
        let no_arguments = json!({});
        let arguments = params.get("arguments").unwrap_or(&no_arguments);
        let client_id = client.map_or("anonymous", |c| c.client_id.as_str());

        match execute_tool(name, arguments, context).await {
            Ok(result) => {
                tracing::debug!(tool = name, client = client_id, "Tool call succeeded");
                Ok(json!({
                    "content": [
                        {
                            "type": "text",
                            "text": result.to_string()
                        }
                    ],
                    "isError": false
                }))
            }
            Err(e @ (ToolError::InvalidParams(_) | ToolError::NotFound(_))) => {
                Err(RpcError::invalid_params(e.to_string()))
            }
            Err(e) => {
                let retryable = e.is_retryable();
                tracing::warn!(
                    tool = name,
                    client = client_id,
                    error = %e,
                    retryable,
                    "Tool execution failed"
                );
                let mut text = format!("Tool execution failed: {e}");
                if retryable {
                    text.push_str(" (retryable)");
                }
                Ok(json!({
                    "content": [
                        {
                            "type": "text",
                            "text": text
                        }
                    ],
                    "isError": true
                }))
            }
        }
    }
}

async fn handle_http(
    State(state): State<AppState>,
    request: axum::extract::Request,
) -> HttpResponse {
    let source = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_owned(), |ConnectInfo(addr)| addr.to_string());
    let (parts, body) = request.into_parts();

    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return rpc_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                Response::failure(
                    Value::Null,
                    RpcError::new(RpcError::INVALID_REQUEST, e.to_string()),
                ),
            )
        }
    };
    let payload: Value = match serde_json::from_slice(&bytes) {
        Ok(payload) => payload,
        Err(e) => {
            return rpc_response(
                StatusCode::BAD_REQUEST,
                Response::failure(
                    Value::Null,
                    RpcError::new(RpcError::PARSE_ERROR, format!("Parse error: {e}")),
                ),
            )
        }
    };

    let mut call = InboundCall::new(source, parts.headers, payload);
    if let Err(rejection) = state.interceptors.run(&mut call) {
        return rejection_response(rejection, call.request_id());
    }
    let (payload, client) = call.into_parts();

    let request_id = payload.get("id").cloned().unwrap_or(Value::Null);
    let request: Request = match serde_json::from_value(payload) {
        Ok(request) => request,
        Err(e) => {
            return rpc_response(
                StatusCode::BAD_REQUEST,
                Response::failure(
                    request_id,
                    RpcError::new(RpcError::INVALID_REQUEST, format!("Invalid request: {e}")),
                ),
            )
        }
    };
    if request.jsonrpc != "2.0" {
        return rpc_response(
            StatusCode::BAD_REQUEST,
            Response::failure(
                request_id,
                RpcError::new(RpcError::INVALID_REQUEST, "Unsupported jsonrpc version"),
            ),
        );
    }

    let Some(id) = request.id.clone() else {
        tracing::debug!(method = %request.method, "Notification received");
        return StatusCode::ACCEPTED.into_response();
    };

    let response = match Server::handle_request(&state.context, request, client.as_ref()).await {
        Ok(result) => Response::success(id, result),
        Err(error) => Response::failure(id, error),
    };
    rpc_response(StatusCode::OK, response)
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

fn rpc_response(status: StatusCode, response: Response) -> HttpResponse {
    (status, Json(response)).into_response()
}

fn rejection_response(rejection: Rejection, id: Value) -> HttpResponse {
    let mut response = rpc_response(rejection.status, Response::failure(id, rejection.error));
    if rejection.status == StatusCode::UNAUTHORIZED {
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }
    response
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Received Ctrl+C, shutting down");
}
