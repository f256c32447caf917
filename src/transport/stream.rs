//! Byte-stream pairs and the framed stream built on top of them.
//!
//! A socket, a child process's pipes, and the process's own stdio all reduce
//! to one read half and one write half. The codec and sessions only see
//! [`FramedStream`].

use std::io;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream};
use tokio::net::TcpStream;

use crate::mcp::rpc::Message;
use crate::transport::codec::{read_frame, write_frame, FrameError};

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

pub trait ByteStreamPair {
    fn into_halves(self) -> (BoxedReader, BoxedWriter);
}

impl ByteStreamPair for TcpStream {
    fn into_halves(self) -> (BoxedReader, BoxedWriter) {
        let (reader, writer) = self.into_split();
        (Box::new(reader), Box::new(writer))
    }
}

impl ByteStreamPair for DuplexStream {
    fn into_halves(self) -> (BoxedReader, BoxedWriter) {
        let (reader, writer) = tokio::io::split(self);
        (Box::new(reader), Box::new(writer))
    }
}

/// Any separate reader and writer, e.g. `(ChildStdout, ChildStdin)` or
/// `(Stdin, Stdout)`.
impl<R, W> ByteStreamPair for (R, W)
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    fn into_halves(self) -> (BoxedReader, BoxedWriter) {
        (Box::new(self.0), Box::new(self.1))
    }
}

pub struct FramedStream {
    reader: BufReader<BoxedReader>,
    writer: BoxedWriter,
}

impl FramedStream {
    pub fn new(pair: impl ByteStreamPair) -> Self {
        let (reader, writer) = pair.into_halves();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    pub fn stdio() -> Self {
        Self::new((tokio::io::stdin(), tokio::io::stdout()))
    }

    pub async fn recv(&mut self) -> Result<Option<Message>, FrameError> {
        read_frame(&mut self.reader).await
    }

    pub async fn send(&mut self, message: &Message) -> Result<(), FrameError> {
        write_frame(&mut self.writer, message).await
    }

    /// Shuts down the write half. The read half is released on drop.
    pub async fn close(&mut self) -> io::Result<()> {
        self.writer.shutdown().await
    }
}
