//! TCP acceptor: one independent session task per connection.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{debug, info, warn};

use crate::mcp::session::Session;
use crate::transport::stream::FramedStream;
use crate::AppState;

/// Pause after a failed accept, so persistent failures such as descriptor
/// exhaustion do not spin the loop.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_secs(1);

pub struct Listener {
    inner: TcpListener,
    state: AppState,
}

impl Listener {
    pub async fn bind(addr: impl ToSocketAddrs, state: AppState) -> io::Result<Self> {
        let inner = TcpListener::bind(addr).await?;
        Ok(Self { inner, state })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// Accepts connections until the process is stopped. A failed accept is
    /// logged and retried after a pause; it does not end the loop.
    pub async fn run(self) {
        let listener = &self.inner;
        loop {
            let (stream, peer) = accept_with_backoff(move || listener.accept()).await;

            info!(peer = %peer, "accepted connection");
            let session =
                Session::new(self.state.clone(), FramedStream::new(stream), peer.to_string());
            tokio::spawn(async move {
                if let Err(err) = session.run().await {
                    debug!(peer = %peer, error = %err, "session task finished with error");
                }
            });
        }
    }
}

async fn accept_with_backoff<T, F, Fut>(mut accept: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    loop {
        match accept().await {
            Ok(accepted) => return accepted,
            Err(err) => {
                warn!(
                    error = %err,
                    retry_in_ms = ACCEPT_RETRY_DELAY.as_millis() as u64,
                    "failed to accept connection"
                );
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn accept_failures_pause_before_retrying() {
        let mut failures = 3;
        let started = Instant::now();

        let accepted = accept_with_backoff(|| {
            let fail = failures > 0;
            if fail {
                failures -= 1;
            }
            async move {
                if fail {
                    Err(io::Error::other("too many open files"))
                } else {
                    Ok("connection")
                }
            }
        })
        .await;

        assert_eq!(accepted, "connection");
        assert_eq!(failures, 0);
        assert!(started.elapsed() >= ACCEPT_RETRY_DELAY * 3);
    }

    #[tokio::test]
    async fn successful_accepts_do_not_wait() {
        let started = Instant::now();

        let accepted = accept_with_backoff(|| async { Ok::<_, io::Error>(7) }).await;

        assert_eq!(accepted, 7);
        assert!(started.elapsed() < ACCEPT_RETRY_DELAY);
    }
}
