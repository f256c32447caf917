//! Tool descriptors, the handler seam, and the registry `tools/*` dispatches to.

use std::sync::Arc;

use async_trait::async_trait;
use rust_mcp_sdk::schema::Tool;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::errors::AppError;

pub type ToolArguments = Map<String, Value>;

/// A tool collaborator. The descriptor is published by `tools/list`; its
/// input schema is informational and never enforced at dispatch time.
/// Handlers return plain text, or `AppError::ResourceNotFound` /
/// `AppError::Internal` (or `InvalidParams` for unusable arguments).
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn descriptor(&self) -> Tool;

    async fn call(&self, arguments: ToolArguments) -> Result<String, AppError>;
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("tool {0:?} is already registered")]
    DuplicateTool(String),
}

#[derive(Clone)]
struct RegisteredTool {
    descriptor: Tool,
    handler: Arc<dyn ToolHandler>,
}

#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) -> Result<(), RegistryError> {
        let descriptor = handler.descriptor();
        if self.get(&descriptor.name).is_some() {
            return Err(RegistryError::DuplicateTool(descriptor.name));
        }

        self.tools.push(RegisteredTool {
            descriptor,
            handler,
        });
        Ok(())
    }

    pub fn with_tool(mut self, handler: impl ToolHandler + 'static) -> Result<Self, RegistryError> {
        self.register(Arc::new(handler))?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.tools
            .iter()
            .find(|tool| tool.descriptor.name == name)
            .map(|tool| Arc::clone(&tool.handler))
    }

    /// Descriptors in registration order.
    pub fn descriptors(&self) -> Vec<Tool> {
        self.tools
            .iter()
            .map(|tool| tool.descriptor.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use rust_mcp_sdk::macros;
    use serde::{Deserialize, Serialize};

    use super::*;

    #[macros::mcp_tool(name = "named", description = "Echoes its own name")]
    #[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
    struct NamedTool {
        /// Text to ignore
        note: Option<String>,
    }

    struct Named(&'static str);

    #[async_trait]
    impl ToolHandler for Named {
        fn descriptor(&self) -> Tool {
            let mut tool = NamedTool::tool();
            tool.name = self.0.to_string();
            tool
        }

        async fn call(&self, _arguments: ToolArguments) -> Result<String, AppError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn keeps_registration_order() {
        let registry = ToolRegistry::new()
            .with_tool(Named("zeta"))
            .and_then(|registry| registry.with_tool(Named("alpha")))
            .and_then(|registry| registry.with_tool(Named("mid")))
            .expect("unique names");

        let names = registry
            .descriptors()
            .into_iter()
            .map(|descriptor| descriptor.name)
            .collect::<Vec<_>>();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn rejects_duplicate_names() {
        let registry = ToolRegistry::new().with_tool(Named("echo")).expect("first");

        let err = registry
            .with_tool(Named("echo"))
            .err()
            .expect("duplicate must fail");
        assert!(matches!(err, RegistryError::DuplicateTool(name) if name == "echo"));
    }

    #[tokio::test]
    async fn looks_up_handlers_by_name() {
        let registry = ToolRegistry::new().with_tool(Named("echo")).expect("register");

        let handler = registry.get("echo").expect("registered");
        assert_eq!(handler.call(ToolArguments::new()).await.expect("call"), "echo");
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn descriptors_serialize_with_camel_case_schema_key() {
        let value = serde_json::to_value(Named("echo").descriptor()).expect("serialize");

        assert_eq!(value["name"], "echo");
        assert_eq!(value["description"], "Echoes its own name");
        assert_eq!(value["inputSchema"]["type"], "object");
        assert!(value["inputSchema"]["properties"]["note"].is_object());
        assert!(value.get("input_schema").is_none());
    }
}
