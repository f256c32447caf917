//! Byte-level transport for framed JSON-RPC messages
//!
//! Provides the header framing codec and the stream abstraction shared by TCP
//! connections and process pipes.

pub mod codec;
pub mod stream;
