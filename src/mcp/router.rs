//! Method dispatch for the responder
//!
//! Maps one decoded message to at most one reply, and tells the session
//! whether the exchange ends the connection (`shutdown` / `exit`).

use std::sync::Arc;
use std::time::Instant;

use rust_mcp_sdk::schema::{
    CallToolRequestParams, CallToolResult, ContentBlock, Implementation, InitializeResult,
    ListToolsResult, ProtocolVersion, ServerCapabilities, ServerCapabilitiesTools, TextContent,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::domain::tools::{ToolArguments, ToolHandler};
use crate::errors::AppError;
use crate::mcp::rpc::Message;
use crate::AppState;

pub const SUPPORTED_PROTOCOL_VERSION: &str = "2024-11-05";

/// Outcome of routing one message.
#[derive(Debug, Default, PartialEq)]
pub struct Routed {
    pub reply: Option<Message>,
    pub close: bool,
}

pub fn is_termination(method: &str) -> bool {
    matches!(method, "shutdown" | "exit")
}

pub async fn route_message(state: &AppState, message: Message) -> Routed {
    let Message {
        id,
        method,
        params,
        result,
        error,
        ..
    } = message;

    let Some(method) = method else {
        if result.is_some() || error.is_some() {
            debug!(id = ?id, "ignoring response sent to responder");
            return Routed::default();
        }
        return Routed {
            reply: id.map(|id| {
                Message::error(id, AppError::invalid_request("missing method").into())
            }),
            close: false,
        };
    };

    let started_at = Instant::now();
    let close = is_termination(&method);
    let outcome = if close {
        Ok(json!({}))
    } else {
        handle_request(state, &method, params).await
    };

    info!(
        method = %method,
        id = ?id,
        outcome = if outcome.is_ok() { "success" } else { "failure" },
        duration_ms = started_at.elapsed().as_millis(),
        "mcp action audited"
    );

    let reply = id.map(|id| match outcome {
        Ok(result) => Message::result(id, result),
        Err(err) => Message::error(id, err.into()),
    });

    Routed { reply, close }
}

pub async fn handle_request(
    state: &AppState,
    method: &str,
    params: Option<Value>,
) -> Result<Value, AppError> {
    match method {
        "initialize" => {
            if let Some(client_info) = params.as_ref().and_then(|p| p.get("clientInfo")) {
                debug!(client_info = %client_info, "client identified");
            }
            to_result_value(initialize_result())
        }
        "tools/list" => to_result_value(ListToolsResult {
            meta: None,
            next_cursor: None,
            tools: state.registry.descriptors(),
        }),
        "tools/call" => handle_tools_call(state, params).await,
        _ => Err(AppError::method_not_found(method)),
    }
}

fn to_result_value(result: impl Serialize) -> Result<Value, AppError> {
    serde_json::to_value(result)
        .map_err(|err| AppError::internal(format!("result serialization failed: {err}")))
}

pub fn initialize_result() -> InitializeResult {
    InitializeResult {
        server_info: Implementation {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: None,
            description: None,
            icons: vec![],
            website_url: None,
        },
        capabilities: ServerCapabilities {
            tools: Some(ServerCapabilitiesTools {
                list_changed: Some(false),
            }),
            ..Default::default()
        },
        protocol_version: ProtocolVersion::V2024_11_05.into(),
        instructions: None,
        meta: None,
    }
}

pub async fn handle_tools_call(state: &AppState, params: Option<Value>) -> Result<Value, AppError> {
    let Some(raw_params) = params else {
        return Err(AppError::invalid_params("tools/call params are required"));
    };

    let tool_call: CallToolRequestParams = serde_json::from_value(raw_params)
        .map_err(|err| AppError::invalid_params(format!("tools/call params: {err}")))?;
    let name = tool_call.name.as_str();

    let tool = state
        .registry
        .get(name)
        .ok_or_else(|| AppError::method_not_found(format!("tool {name}")))?;

    let text = invoke_tool(tool, name, tool_call.arguments.unwrap_or_default()).await?;
    to_result_value(CallToolResult {
        content: vec![ContentBlock::from(TextContent::new(text, None, None))],
        is_error: None,
        meta: None,
        structured_content: None,
    })
}

/// Runs the handler on its own task so a panic surfaces as a failed call
/// rather than tearing down the session.
async fn invoke_tool(
    tool: Arc<dyn ToolHandler>,
    name: &str,
    arguments: ToolArguments,
) -> Result<String, AppError> {
    match tokio::spawn(async move { tool.call(arguments).await }).await {
        Ok(result) => result,
        Err(join_error) => {
            error!(tool = %name, error = %join_error, "tool handler aborted");
            Err(AppError::internal(format!("tool {name} aborted")))
        }
    }
}
