//! Header-framed message codec.
//!
//! Each frame is a block of `Key: Value\r\n` header lines, a bare `\r\n`, and
//! then exactly `Content-Length` bytes of JSON:
//!
//! ```text
//! Content-Length: 46\r\n
//! \r\n
//! {"jsonrpc":"2.0","id":1,"method":"tools/list"}
//! ```

use std::io;

use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::mcp::rpc::{recover_request_id, Message, RequestId};

pub const CONTENT_LENGTH: &str = "content-length";

/// Largest body accepted from a peer.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Largest header block (all lines plus the terminator) accepted from a peer.
pub const MAX_HEADER_LEN: usize = 8 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("transport i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("frame is missing the Content-Length header")]
    MissingContentLength,
    #[error("invalid Content-Length value: {0:?}")]
    InvalidContentLength(String),
    #[error("header line is not valid UTF-8")]
    InvalidHeader,
    #[error("frame body of {0} bytes exceeds the limit")]
    FrameTooLarge(usize),
    #[error("header block exceeds {} bytes", MAX_HEADER_LEN)]
    HeaderTooLarge,
    #[error("frame body is not valid JSON: {0}")]
    MalformedBody(#[source] serde_json::Error),
    #[error("frame body is not a JSON-RPC message: {source}")]
    InvalidMessage {
        id: Option<RequestId>,
        #[source]
        source: serde_json::Error,
    },
}

impl FrameError {
    /// Whether the stream is still positioned at a frame boundary, so the
    /// next decode can proceed.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::Io(_) | Self::FrameTooLarge(_) | Self::HeaderTooLarge
        )
    }
}

/// Reads one frame. `Ok(None)` means the stream ended, either cleanly before
/// a frame started or part-way through one.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Message>, FrameError>
where
    R: AsyncBufRead + Unpin,
{
    let Some(content_length) = read_headers(reader).await? else {
        return Ok(None);
    };

    let mut body = vec![0u8; content_length];
    match reader.read_exact(&mut body).await {
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(FrameError::Io(err)),
    }

    decode_body(&body).map(Some)
}

/// Consumes the header block and returns the declared body length.
async fn read_headers<R>(reader: &mut R) -> Result<Option<usize>, FrameError>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<String> = None;
    let mut line = Vec::new();
    let mut consumed = 0usize;

    loop {
        line.clear();
        let budget = (MAX_HEADER_LEN - consumed) as u64;
        let read = (&mut *reader).take(budget).read_until(b'\n', &mut line).await?;
        if !line.ends_with(b"\n") && read as u64 == budget {
            return Err(FrameError::HeaderTooLarge);
        }
        if read == 0 {
            return Ok(None);
        }
        consumed += read;

        let text = std::str::from_utf8(&line).map_err(|_| FrameError::InvalidHeader)?;
        let text = text.trim_end_matches(['\r', '\n']);
        if text.is_empty() {
            break;
        }

        if let Some((key, value)) = text.split_once(':') {
            if key.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
                content_length = Some(value.trim().to_string());
            }
        }
    }

    let raw = content_length.ok_or(FrameError::MissingContentLength)?;
    let length = raw
        .parse::<usize>()
        .map_err(|_| FrameError::InvalidContentLength(raw.clone()))?;
    if length > MAX_FRAME_LEN {
        return Err(FrameError::FrameTooLarge(length));
    }

    Ok(Some(length))
}

fn decode_body(body: &[u8]) -> Result<Message, FrameError> {
    let value: Value = serde_json::from_slice(body).map_err(FrameError::MalformedBody)?;
    let id = recover_request_id(&value);
    serde_json::from_value(value).map_err(|source| FrameError::InvalidMessage { id, source })
}

/// Writes one frame and flushes, so the bytes have left any buffer by the
/// time this returns.
pub async fn write_frame<W>(writer: &mut W, message: &Message) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(message).map_err(|err| FrameError::Io(err.into()))?;
    let header = format!("Content-Length: {}\r\n\r\n", body.len());

    writer.write_all(header.as_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}
