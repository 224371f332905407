//! # wsconn - Per-connection WebSocket protocol engine
//!
//! `wsconn` drives one already upgraded WebSocket connection (RFC 6455) on top
//! of any Tokio byte stream. It parses inbound frames and hands them to a
//! message handler, sends outbound data through an ordered queue with batched
//! vectored writes, and closes the connection gracefully or on error.
//!
//! The HTTP upgrade handshake, TLS and message reassembly are left to the
//! caller.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wsconn::{ConnectionSettings, WsConnection};
//!
//! let conn = WsConnection::spawn(
//!     upgraded_stream,
//!     &ConnectionSettings::default(),
//!     |conn, msg| conn.send_message(msg),
//!     |reason| tracing::info!("connection closed: {reason}"),
//! );
//! conn.init_read();
//! ```

pub mod buffers;
pub mod config;
pub mod connection;
pub mod error;
pub mod logger;
pub mod message;
pub mod output;
pub mod protocol;
pub mod queue;

pub use buffers::{BufferGroup, FixedInputBuffer};
pub use config::{Config, ConnectionSettings, Limits};
#[cfg(feature = "async-tokio")]
pub use connection::WsConnection;
pub use connection::{ReadState, Role};
pub use error::{Error, Result};
pub use logger::{Logger, LoggerExt, NullLogger, TracingLogger};
pub use message::WsMessage;
pub use output::RawOutputContext;
pub use protocol::{CloseCode, CloseFrame, FrameHeader, OpCode};
pub use queue::OutgoingDataQueue;
