use std::{env, path::PathBuf};

use thiserror::Error;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:8765";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_CONTEXT_FILE: &str = "context.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Tcp,
    Stdio,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub transport: TransportKind,
    pub listen_host: String,
    pub listen_port: u16,
    pub context_file: PathBuf,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("MCP_TRANSPORT must be one of: tcp, stdio")]
    InvalidTransport,
    #[error("endpoint must not be empty")]
    EmptyEndpoint,
    #[error("expected HOST:PORT or :PORT, got {0:?}")]
    InvalidEndpoint(String),
    #[error("port must be a valid u16, got {0:?}")]
    InvalidPort(String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let transport = match lookup("MCP_TRANSPORT")
            .map(|value| value.trim().to_ascii_lowercase())
            .filter(|value| !value.is_empty())
            .as_deref()
        {
            None | Some("tcp") => TransportKind::Tcp,
            Some("stdio") => TransportKind::Stdio,
            Some(_) => return Err(ConfigError::InvalidTransport),
        };

        let listen = lookup("MCP_LISTEN").unwrap_or_else(|| DEFAULT_LISTEN.to_string());
        let (listen_host, listen_port) = parse_host_port(&listen)?;

        let context_file = lookup("MCP_CONTEXT_FILE")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_CONTEXT_FILE.to_string())
            .into();

        Ok(Self {
            transport,
            listen_host,
            listen_port,
            context_file,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.listen_port)
    }
}

/// Parses `HOST:PORT`, or `:PORT` for the loopback host. The split happens at
/// the last colon.
pub fn parse_host_port(endpoint: &str) -> Result<(String, u16), ConfigError> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Err(ConfigError::EmptyEndpoint);
    }

    let (host, port) = endpoint
        .rsplit_once(':')
        .ok_or_else(|| ConfigError::InvalidEndpoint(endpoint.to_string()))?;
    let host = if host.is_empty() { DEFAULT_HOST } else { host };
    let port = port
        .parse::<u16>()
        .map_err(|_| ConfigError::InvalidPort(port.to_string()))?;

    Ok((host.to_string(), port))
}
