//! Caller side of the protocol
//!
//! One [`McpClient`] owns one transport and its request-id counter. Calls are
//! strictly sequential: a call reads frames until the reply carrying its id
//! shows up and discards anything else, which is only sound while no other
//! call is in flight on the same transport. Running calls concurrently would
//! need a pending-request table keyed by id, filled by a dedicated read loop.

use std::ffi::OsStr;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use rust_mcp_sdk::schema::{CallToolResult, ContentBlock, InitializeResult, ListToolsResult, Tool};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::mcp::rpc::{Message, RequestId, RpcError};
use crate::transport::codec::FrameError;
use crate::transport::stream::FramedStream;

/// How long a spawned server gets to exit on its own before it is killed.
const CHILD_EXIT_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to open transport: {0}")]
    Connect(#[source] io::Error),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("transport terminated before a reply arrived")]
    TransportTerminated,
    #[error("server returned an error: {0}")]
    Rpc(RpcError),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

pub struct McpClient {
    stream: FramedStream,
    next_id: i64,
    child: Option<Child>,
}

impl McpClient {
    pub fn from_stream(stream: FramedStream) -> Self {
        Self {
            stream,
            next_id: 1,
            child: None,
        }
    }

    pub async fn connect_tcp(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let socket = TcpStream::connect(addr).await.map_err(ClientError::Connect)?;
        Ok(Self::from_stream(FramedStream::new(socket)))
    }

    /// Runs `program args...` as a child process and talks to it over its
    /// stdin/stdout.
    pub fn spawn<I, S>(program: impl AsRef<OsStr>, args: I) -> Result<Self, ClientError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(program);
        command.args(args);
        Self::spawn_command(command)
    }

    /// Starts `command` with piped stdin/stdout and talks to it over those
    /// pipes. The child inherits stderr and is killed if the client is dropped.
    pub fn spawn_command(mut command: Command) -> Result<Self, ClientError> {
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(ClientError::Connect)?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(ClientError::Connect(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "child process pipes are unavailable",
            )));
        };

        let mut client = Self::from_stream(FramedStream::new((stdout, stdin)));
        client.child = Some(child);
        Ok(client)
    }

    fn next_request_id(&mut self) -> RequestId {
        let id = self.next_id;
        self.next_id += 1;
        RequestId::from(id)
    }

    /// Sends one request and returns the response carrying its id, whether
    /// that response holds a result or an error.
    pub async fn call(&mut self, method: &str, params: Value) -> Result<Message, ClientError> {
        let id = self.next_request_id();
        self.stream
            .send(&Message::request(id.clone(), method, params))
            .await?;

        loop {
            match self.stream.recv().await {
                Ok(Some(message)) if message.id.as_ref() == Some(&id) => return Ok(message),
                Ok(Some(message)) => {
                    debug!(expected = %id, received = ?message.id, "discarding uncorrelated message");
                }
                Ok(None) => return Err(ClientError::TransportTerminated),
                Err(err) if err.is_recoverable() => {
                    warn!(error = %err, "skipping undecodable frame");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Like [`McpClient::call`], but turns a response `error` into
    /// [`ClientError::Rpc`].
    pub async fn request(&mut self, method: &str, params: Value) -> Result<Value, ClientError> {
        match self.call(method, params).await?.into_outcome() {
            Some(Ok(result)) => Ok(result),
            Some(Err(error)) => Err(ClientError::Rpc(error)),
            None => Err(ClientError::MalformedResponse(format!(
                "{method} reply must carry exactly one of result or error"
            ))),
        }
    }

    pub async fn initialize(&mut self) -> Result<InitializeResult, ClientError> {
        let result = self
            .request(
                "initialize",
                json!({
                    "clientInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION"),
                    }
                }),
            )
            .await?;
        decode_result("initialize", result)
    }

    pub async fn list_tools(&mut self) -> Result<Vec<Tool>, ClientError> {
        let result = self.request("tools/list", json!({})).await?;
        decode_result::<ListToolsResult>("tools/list", result).map(|listed| listed.tools)
    }

    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: Value,
    ) -> Result<CallToolResult, ClientError> {
        let result = self
            .request("tools/call", json!({ "name": name, "arguments": arguments }))
            .await?;
        decode_result("tools/call", result)
    }

    /// Best-effort teardown. Each step runs even when an earlier one failed:
    /// send `shutdown` without waiting for the reply, shut down the write
    /// half, then reap (or kill) a spawned server. Returns the server's exit
    /// status when one was spawned and reaped.
    pub async fn close(mut self) -> Option<ExitStatus> {
        let id = self.next_request_id();
        if let Err(err) = self
            .stream
            .send(&Message::request(id, "shutdown", json!({})))
            .await
        {
            debug!(error = %err, "shutdown request not delivered");
        }

        if let Err(err) = self.stream.close().await {
            debug!(error = %err, "closing transport failed");
        }

        match self.child.take() {
            Some(mut child) => reap(&mut child).await,
            None => None,
        }
    }
}

async fn reap(child: &mut Child) -> Option<ExitStatus> {
    match tokio::time::timeout(CHILD_EXIT_GRACE, child.wait()).await {
        Ok(Ok(status)) => {
            debug!(status = %status, "server process exited");
            Some(status)
        }
        Ok(Err(err)) => {
            debug!(error = %err, "waiting for server process failed");
            None
        }
        Err(_) => {
            warn!("server process did not exit after shutdown, killing it");
            if let Err(err) = child.kill().await {
                debug!(error = %err, "killing server process failed");
                return None;
            }
            child.try_wait().ok().flatten()
        }
    }
}

fn decode_result<T: DeserializeOwned>(method: &str, result: Value) -> Result<T, ClientError> {
    serde_json::from_value(result)
        .map_err(|err| ClientError::MalformedResponse(format!("{method}: {err}")))
}

/// The text of every `text` block in a tool result, in order.
pub fn text_parts(result: &CallToolResult) -> Vec<&str> {
    result
        .content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::TextContent(text) => Some(text.text.as_str()),
            _ => None,
        })
        .collect()
}
