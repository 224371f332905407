//! Test harness for driving a connection from the other end of an in-memory
//! stream.

#![allow(dead_code)]

mod endpoint;
mod peer;

pub use endpoint::Endpoint;
pub use peer::{PEER_MASK, Peer, RecvFrame};
