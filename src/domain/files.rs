//! `read_file` and `search_file` tools over a configured context file.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rust_mcp_sdk::{macros, schema::Tool};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::tools::{ToolArguments, ToolHandler};
use crate::errors::AppError;

#[macros::mcp_tool(
    name = "read_file",
    description = "Read the configured context file, or another file by path"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct ReadFileTool {
    /// File to read instead of the context file
    pub path: Option<String>,
}

#[macros::mcp_tool(
    name = "search_file",
    description = "Search for words in the context file and return matching lines"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct SearchFileTool {
    /// Search string, matched case-insensitively
    pub words: String,
    /// File to search instead of the context file
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReadFileArgs {
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchFileArgs {
    #[serde(alias = "query")]
    words: Option<String>,
    path: Option<String>,
}

fn parse_args<T: for<'de> Deserialize<'de>>(arguments: ToolArguments) -> Result<T, AppError> {
    serde_json::from_value(Value::Object(arguments))
        .map_err(|err| AppError::invalid_params(format!("tool arguments: {err}")))
}

async fn read_context(default_path: &Path, path: Option<&str>) -> Result<String, AppError> {
    let path = path
        .filter(|path| !path.trim().is_empty())
        .map_or_else(|| default_path.to_path_buf(), PathBuf::from);

    tokio::fs::read_to_string(&path)
        .await
        .map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => AppError::not_found(path.display().to_string()),
            _ => AppError::internal(format!("failed to read {}: {err}", path.display())),
        })
}

/// Case-insensitive substring search, one numbered line per hit.
pub fn search_lines(text: &str, query: &str) -> String {
    let needle = query.to_lowercase();
    let matches = text
        .lines()
        .enumerate()
        .filter(|(_, line)| line.to_lowercase().contains(&needle))
        .map(|(index, line)| format!("{}: {line}", index + 1))
        .collect::<Vec<_>>();

    if matches.is_empty() {
        return format!("No matches for: {query}");
    }

    let mut out = vec![format!("Matches ({}) for: {query}", matches.len())];
    out.extend(matches);
    out.join("\n")
}

#[derive(Debug, Clone)]
pub struct ReadFileHandler {
    default_path: PathBuf,
}

impl ReadFileHandler {
    pub fn new(default_path: impl Into<PathBuf>) -> Self {
        Self {
            default_path: default_path.into(),
        }
    }
}

#[async_trait]
impl ToolHandler for ReadFileHandler {
    fn descriptor(&self) -> Tool {
        ReadFileTool::tool()
    }

    async fn call(&self, arguments: ToolArguments) -> Result<String, AppError> {
        let args: ReadFileArgs = parse_args(arguments)?;
        read_context(&self.default_path, args.path.as_deref()).await
    }
}

#[derive(Debug, Clone)]
pub struct SearchFileHandler {
    default_path: PathBuf,
}

impl SearchFileHandler {
    pub fn new(default_path: impl Into<PathBuf>) -> Self {
        Self {
            default_path: default_path.into(),
        }
    }
}

#[async_trait]
impl ToolHandler for SearchFileHandler {
    fn descriptor(&self) -> Tool {
        SearchFileTool::tool()
    }

    async fn call(&self, arguments: ToolArguments) -> Result<String, AppError> {
        let args: SearchFileArgs = parse_args(arguments)?;
        let query = args.words.unwrap_or_default();
        let query = query.trim();
        if query.is_empty() {
            return Ok(String::new());
        }

        let text = read_context(&self.default_path, args.path.as_deref()).await?;
        Ok(search_lines(&text, query))
    }
}
