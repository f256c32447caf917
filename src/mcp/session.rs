//! One responder connection: decode, route, reply, until the peer goes away
//! or asks to shut down.

use tracing::{debug, info, warn};

use crate::errors::AppError;
use crate::mcp::rpc::Message;
use crate::mcp::router::route_message;
use crate::transport::codec::FrameError;
use crate::transport::stream::FramedStream;
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    EndOfStream,
    Terminated,
}

pub struct Session {
    state: AppState,
    stream: FramedStream,
    peer: String,
    status: SessionState,
}

impl Session {
    pub fn new(state: AppState, stream: FramedStream, peer: impl Into<String>) -> Self {
        Self {
            state,
            stream,
            peer: peer.into(),
            status: SessionState::Open,
        }
    }

    pub fn status(&self) -> SessionState {
        self.status
    }

    /// Serves the connection to completion. The write half is shut down on
    /// every exit path; both halves are dropped with the session.
    pub async fn run(mut self) -> Result<CloseReason, FrameError> {
        info!(peer = %self.peer, "session opened");
        let outcome = self.serve().await;
        self.status = SessionState::Closed;

        if let Err(err) = self.stream.close().await {
            debug!(peer = %self.peer, error = %err, "closing write half failed");
        }

        match &outcome {
            Ok(reason) => info!(peer = %self.peer, reason = ?reason, "session closed"),
            Err(err) => warn!(peer = %self.peer, error = %err, "session closed on transport failure"),
        }
        outcome
    }

    async fn serve(&mut self) -> Result<CloseReason, FrameError> {
        while self.status == SessionState::Open {
            let message = match self.stream.recv().await {
                Ok(Some(message)) => message,
                Ok(None) => return Ok(CloseReason::EndOfStream),
                Err(err) if err.is_recoverable() => {
                    self.reject_frame(err).await?;
                    continue;
                }
                Err(err) => return Err(err),
            };

            let routed = route_message(&self.state, message).await;
            if let Some(reply) = routed.reply {
                self.stream.send(&reply).await?;
            }
            if routed.close {
                self.status = SessionState::Closed;
            }
        }

        Ok(CloseReason::Terminated)
    }

    /// Skips a bad frame, answering only when an id could be recovered.
    async fn reject_frame(&mut self, err: FrameError) -> Result<(), FrameError> {
        warn!(peer = %self.peer, error = %err, "skipping undecodable frame");

        if let FrameError::InvalidMessage { id: Some(id), .. } = err {
            let reply = Message::error(id, AppError::invalid_request("malformed message").into());
            self.stream.send(&reply).await?;
        }
        Ok(())
    }
}
