//! JSON-RPC message handling for both ends of a connection
//!
//! The responder side is `router` + `session` + `listener`; the caller side is
//! `client`. Both exchange `rpc::Message` values over a framed stream.

pub mod client;
pub mod listener;
pub mod router;
pub mod rpc;
pub mod session;
