//! Per-connection WebSocket engine.
//!
//! A connection owns the upgraded socket and runs as one task that handles
//! requests and socket completions strictly one at a time:
//!
//! - **Read loop**: fill a small fixed buffer, parse a frame header, read the
//!   payload into storage sized for it, hand the frame to the message handler,
//!   repeat.
//! - **Write loop**: queue outgoing buffer groups and send them in batches,
//!   one vectored write at a time.
//! - **Close**: either graceful (queued data is flushed, then a close frame,
//!   then the socket is closed) or immediate on error. The close handler runs
//!   at most once.
//!
//! [`WsConnection`] is the handle used to talk to the task.

mod role;
mod state;

pub use role::Role;
pub use state::ReadState;

#[cfg(feature = "async-tokio")]
#[allow(clippy::module_inception)]
mod connection;
#[cfg(feature = "async-tokio")]
mod handle;
#[cfg(feature = "async-tokio")]
mod ops;

#[cfg(feature = "async-tokio")]
pub use connection::{CLOSED_BY_PEER, CloseHandler, MessageHandler, PEER_DISCONNECTED, USER_INITIATED};
#[cfg(feature = "async-tokio")]
pub use handle::WsConnection;
