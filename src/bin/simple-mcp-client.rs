use clap::{Parser, Subcommand};
use rust_mcp_sdk::schema::CallToolResult;
use serde_json::json;
use simple_mcp::{
    config::{parse_host_port, DEFAULT_LISTEN},
    logging,
    mcp::client::{text_parts, ClientError, McpClient},
};
use tokio::process::Command;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about = "Call tools on a simple-mcp server")]
struct Cli {
    /// Server endpoint as HOST:PORT or :PORT
    #[arg(long, value_name = "HOST:PORT", default_value = DEFAULT_LISTEN)]
    tcp: String,

    /// Run the server as a child process and talk to it over its stdio.
    /// Takes the program and its arguments, terminated by `;` when a
    /// subcommand follows.
    #[arg(
        long,
        value_name = "COMMAND",
        num_args = 1..,
        value_terminator = ";",
        allow_hyphen_values = true
    )]
    spawn: Option<Vec<String>>,

    #[command(subcommand)]
    command: Option<ToolCommand>,
}

#[derive(Debug, PartialEq, Subcommand)]
enum ToolCommand {
    /// Print the context file, or another file
    Read { path: Option<String> },
    /// Print the lines containing the given words
    Search {
        #[arg(required = true)]
        words: Vec<String>,
    },
    /// List the server's tools
    Tools,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();
    let cli = Cli::parse();

    let mut client = match cli.spawn.as_deref() {
        Some([program, args @ ..]) => {
            let mut command = Command::new(program);
            command.args(args).env("MCP_TRANSPORT", "stdio");
            McpClient::spawn_command(command)?
        }
        _ => {
            let (host, port) = parse_host_port(&cli.tcp)?;
            McpClient::connect_tcp((host.as_str(), port)).await?
        }
    };

    let command = cli.command.unwrap_or(ToolCommand::Read { path: None });
    let outcome = run(&mut client, command).await;
    client.close().await;
    outcome.map_err(Into::into)
}

async fn run(client: &mut McpClient, command: ToolCommand) -> Result<(), ClientError> {
    client.initialize().await?;
    let tools = client.list_tools().await?;
    let names = tools
        .iter()
        .map(|tool| tool.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    info!(tools = %names, "connected");

    let (name, arguments) = match command {
        ToolCommand::Tools => {
            for tool in &tools {
                println!("{}\t{}", tool.name, tool.description.as_deref().unwrap_or(""));
            }
            return Ok(());
        }
        ToolCommand::Read { path: Some(path) } => ("read_file", json!({ "path": path })),
        ToolCommand::Read { path: None } => ("read_file", json!({})),
        ToolCommand::Search { words } => ("search_file", json!({ "words": words.join(" ") })),
    };

    let result = client.call_tool(name, arguments).await?;
    let rendered = render_result(&result)
        .map_err(|err| ClientError::MalformedResponse(format!("{name}: {err}")))?;
    println!("{rendered}");
    Ok(())
}

/// Text blocks one per line, or the whole result as pretty JSON when it has
/// no text.
fn render_result(result: &CallToolResult) -> Result<String, serde_json::Error> {
    let texts = text_parts(result);
    if texts.is_empty() {
        return serde_json::to_string_pretty(result);
    }
    Ok(texts.join("\n"))
}
