use std::path::Path;
use std::sync::Arc;

pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod mcp;
pub mod transport;

use domain::files::{ReadFileHandler, SearchFileHandler};
use domain::tools::{RegistryError, ToolRegistry};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ToolRegistry>,
}

impl AppState {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }
}

/// The stock tool set: `read_file` and `search_file` over `context_file`.
pub fn default_registry(context_file: &Path) -> Result<ToolRegistry, RegistryError> {
    ToolRegistry::new()
        .with_tool(ReadFileHandler::new(context_file))?
        .with_tool(SearchFileHandler::new(context_file))
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use async_trait::async_trait;
    use rust_mcp_sdk::{macros, schema::Tool};
    use serde::{Deserialize, Serialize};
    use serde_json::{json, Value};

    use super::*;
    use crate::domain::tools::{ToolArguments, ToolHandler};
    use crate::errors::AppError;
    use crate::mcp::client::{text_parts, ClientError, McpClient};
    use crate::mcp::listener::Listener;
    use crate::mcp::rpc::RequestId;

    #[macros::mcp_tool(name = "sleep", description = "Waits for `ms` milliseconds")]
    #[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
    struct SleepTool {
        ms: Option<u64>,
    }

    struct Sleepy;

    #[async_trait]
    impl ToolHandler for Sleepy {
        fn descriptor(&self) -> Tool {
            SleepTool::tool()
        }

        async fn call(&self, arguments: ToolArguments) -> Result<String, AppError> {
            let ms = arguments.get("ms").and_then(Value::as_u64).unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(format!("slept {ms}ms"))
        }
    }

    async fn start_server(contents: &str) -> (std::net::SocketAddr, tempfile::NamedTempFile) {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write context");

        let registry = default_registry(file.path())
            .and_then(|registry| registry.with_tool(Sleepy))
            .expect("registry");
        let listener = Listener::bind("127.0.0.1:0", AppState::new(registry))
            .await
            .expect("bind listener");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(listener.run());
        (addr, file)
    }

    #[test]
    fn default_registry_exposes_file_tools() {
        let registry = default_registry(Path::new("context.txt")).expect("registry");

        let names = registry
            .descriptors()
            .into_iter()
            .map(|descriptor| descriptor.name)
            .collect::<Vec<_>>();
        assert_eq!(names, ["read_file", "search_file"]);
    }

    #[tokio::test]
    async fn client_and_server_complete_a_session_over_tcp() {
        let (addr, _file) = start_server("The quick brown fox\njumps over\nthe lazy dog\n").await;
        let mut client = McpClient::connect_tcp(addr).await.expect("connect");

        let init = client.initialize().await.expect("initialize");
        assert_eq!(init.protocol_version, "2024-11-05");
        assert_eq!(init.server_info.name, env!("CARGO_PKG_NAME"));

        let tools = client.list_tools().await.expect("tools/list");
        let names = tools.iter().map(|tool| tool.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["read_file", "search_file", "sleep"]);

        let result = client
            .call_tool("read_file", json!({}))
            .await
            .expect("read_file");
        assert_eq!(
            text_parts(&result),
            ["The quick brown fox\njumps over\nthe lazy dog\n"]
        );

        let result = client
            .call_tool("search_file", json!({ "words": "THE" }))
            .await
            .expect("search_file");
        assert_eq!(
            text_parts(&result),
            ["Matches (2) for: THE\n1: The quick brown fox\n3: the lazy dog"]
        );

        let err = client
            .call_tool("no_such_tool", json!({}))
            .await
            .expect_err("unknown tool");
        assert!(
            matches!(err, ClientError::Rpc(error) if error.code == -32601 && error.message.contains("no_such_tool"))
        );

        client.close().await;
    }

    #[tokio::test]
    async fn shutdown_ends_the_connection() {
        let (addr, _file) = start_server("").await;
        let mut client = McpClient::connect_tcp(addr).await.expect("connect");

        let reply = client.call("shutdown", json!({})).await.expect("shutdown");
        assert_eq!(reply.id, Some(RequestId::from(1)));
        assert_eq!(reply.result, Some(json!({})));

        let err = client
            .call("tools/list", json!({}))
            .await
            .expect_err("connection is closed");
        assert!(matches!(
            err,
            ClientError::TransportTerminated | ClientError::Frame(_)
        ));
    }

    #[tokio::test]
    async fn slow_tool_on_one_connection_does_not_stall_another() {
        let (addr, _file) = start_server("fast path\n").await;
        let mut slow = McpClient::connect_tcp(addr).await.expect("connect slow");
        let mut fast = McpClient::connect_tcp(addr).await.expect("connect fast");

        let slow_call = tokio::spawn(async move {
            slow.call_tool("sleep", json!({ "ms": 2_000 })).await
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let result = tokio::time::timeout(
            Duration::from_millis(1_000),
            fast.call_tool("read_file", json!({})),
        )
        .await
        .expect("fast connection answers while the slow tool runs")
        .expect("read_file");
        assert_eq!(text_parts(&result), ["fast path\n"]);
        assert!(!slow_call.is_finished());

        let slept = slow_call.await.expect("join").expect("sleep tool");
        assert_eq!(text_parts(&slept), ["slept 2000ms"]);
    }
}
