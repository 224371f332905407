use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::buffers::BufferGroup;
use crate::config::ConnectionSettings;
use crate::connection::Role;
use crate::connection::connection::ConnectionCore;
use crate::connection::ops::{Envelope, Mailbox, Op};
use crate::error::{Error, Result};
use crate::logger::{Logger, LoggerExt};
use crate::message::WsMessage;
use crate::protocol::{CloseCode, CloseFrame};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to a running WebSocket connection.
///
/// Cheap to clone. Every method only posts a request to the connection's task
/// and returns immediately; requests are handled in the order they were made.
/// The connection stays alive while a handle or an outstanding socket
/// operation refers to it.
///
/// # Example
///
/// ```rust,ignore
/// use wsconn::{ConnectionSettings, WsConnection, WsMessage};
///
/// let conn = WsConnection::spawn(
///     stream,
///     &ConnectionSettings::default(),
///     |conn, msg| {
///         if msg.opcode.is_data() {
///             conn.send_message(msg);
///         }
///     },
///     |reason| println!("closed: {reason}"),
/// );
/// conn.init_read();
/// ```
#[derive(Clone)]
pub struct WsConnection {
    id: u64,
    role: Role,
    mailbox: Mailbox,
    logger: Arc<dyn Logger>,
}

impl WsConnection {
    /// Take over an upgraded stream and start the connection task.
    ///
    /// `on_message` gets every complete inbound frame, `on_close` is called at
    /// most once with the reason the connection ended. Nothing is read until
    /// [`init_read`](Self::init_read).
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn spawn<S, M, C>(stream: S, settings: &ConnectionSettings, on_message: M, on_close: C) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
        M: FnMut(WsConnection, WsMessage) + Send + 'static,
        C: FnOnce(String) + Send + 'static,
    {
        let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
        let (reader, writer) = tokio::io::split(stream);
        let core = ConnectionCore::new(
            id,
            settings,
            Box::new(reader),
            Box::new(writer),
            Box::new(on_message),
            Box::new(on_close),
        );

        let (mailbox, rx) = mpsc::unbounded_channel();
        tokio::spawn(core.run(rx));

        Self::from_mailbox(id, settings.config.role, mailbox, Arc::clone(&settings.logger))
    }

    pub(crate) fn from_mailbox(id: u64, role: Role, mailbox: Mailbox, logger: Arc<dyn Logger>) -> Self {
        Self {
            id,
            role,
            mailbox,
            logger,
        }
    }

    /// Identifier of the connection, unique within the process.
    #[inline]
    #[must_use]
    pub fn connection_id(&self) -> u64 {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Start the read loop. Call once; later calls are logged and ignored.
    pub fn init_read(&self) {
        self.dispatch(Op::InitRead);
    }

    /// Queue raw buffer groups for sending, after everything queued before.
    ///
    /// Groups are written as they are, so they must already be framed.
    pub fn write_data(&self, groups: Vec<BufferGroup>) {
        self.dispatch(Op::WriteData(groups));
    }

    /// Frame `message` for this connection's role and queue it.
    pub fn send_message(&self, message: WsMessage) {
        let group = message.into_buffer_group(self.role.outgoing_mask());
        self.write_data(vec![group]);
    }

    /// Close gracefully with status 1000: data queued so far is sent, followed
    /// by a close frame, then the socket is closed.
    pub fn close(&self) {
        self.dispatch(Op::Close(CloseFrame::new(CloseCode::Normal, "")));
    }

    /// Like [`close`](Self::close), with a custom status code and reason.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCloseCode`] if `code` may not be sent on the
    /// wire.
    pub fn close_with(&self, code: CloseCode, reason: impl Into<String>) -> Result<()> {
        if !code.is_valid() {
            return Err(Error::InvalidCloseCode(code.as_u16()));
        }
        self.dispatch(Op::Close(CloseFrame::new(code, reason)));
        Ok(())
    }

    fn dispatch(&self, op: Op) {
        let envelope = Envelope {
            ctx: self.mailbox.clone(),
            op,
        };
        if self.mailbox.send(envelope).is_err() {
            let id = self.id;
            self.logger
                .warn(|| format!("[ws_connection:{id}] request dropped, connection is gone"));
        }
    }
}

impl std::fmt::Debug for WsConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsConnection")
            .field("id", &self.id)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}
