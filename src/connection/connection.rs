use std::io;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, watch};

use crate::buffers::{BufferGroup, FixedInputBuffer};
use crate::config::{Config, ConnectionSettings};
use crate::connection::ops::{
    self, Envelope, IncomingFrame, Mailbox, Op, ReadSide, SocketReader, SocketWriter,
};
use crate::connection::{ReadState, WsConnection};
use crate::error::{Error, Result, is_operation_aborted};
use crate::logger::{Logger, LoggerExt};
use crate::message::WsMessage;
use crate::output::RawOutputContext;
use crate::protocol::{
    CloseCode, CloseFrame, FrameHeader, FrameValidator, MAX_HEADER_LEN, OpCode, apply_mask,
};
use crate::queue::OutgoingDataQueue;

/// Called with every complete inbound frame.
pub type MessageHandler = Box<dyn FnMut(WsConnection, WsMessage) + Send>;

/// Called at most once, with the reason the connection ended.
pub type CloseHandler = Box<dyn FnOnce(String) + Send>;

/// Close reason reported when the user's close request has been flushed.
pub const USER_INITIATED: &str = "user initiated";

/// Close reason reported after answering the peer's close frame.
pub const CLOSED_BY_PEER: &str = "closed by peer";

/// Close reason reported when the peer shut the stream down without a close
/// frame.
pub const PEER_DISCONNECTED: &str = "peer disconnected";

/// State of one WebSocket connection.
///
/// Lives inside the connection task and is only touched from there, one
/// envelope at a time. The read loop (header, then payload) and the write loop
/// (queue, then one vectored write at a time) run independently; the socket
/// is shut down once the queue drains with close requested, or right away on
/// error.
pub(crate) struct ConnectionCore {
    id: u64,
    config: Config,
    logger: Arc<dyn Logger>,

    /// `None` while a read is in flight or after close.
    read_side: Option<ReadSide>,
    /// `None` while a write is in flight or after close.
    writer: Option<SocketWriter>,
    socket_open: bool,
    /// Flipped on close to abort in-flight operations.
    shutdown: watch::Sender<bool>,

    read_state: ReadState,
    validator: FrameValidator,

    msg_handler: MessageHandler,
    close_handler: Option<CloseHandler>,

    resp_out_ctx: RawOutputContext,
    awaiting_buffers: OutgoingDataQueue,
    /// Reason reported once the queue drains; `None` means user initiated.
    close_reason: Option<String>,
}

impl ConnectionCore {
    pub(crate) fn new(
        id: u64,
        settings: &ConnectionSettings,
        reader: SocketReader,
        writer: SocketWriter,
        msg_handler: MessageHandler,
        close_handler: CloseHandler,
    ) -> Self {
        let config = settings.config.clone();
        let validator = FrameValidator::new(config.role, config.limits.clone())
            .with_accept_unmasked(config.accept_unmasked_frames);
        let input = FixedInputBuffer::new(config.input_buffer_size.max(MAX_HEADER_LEN));
        let (shutdown, _) = watch::channel(false);

        let core = Self {
            id,
            logger: Arc::clone(&settings.logger),
            read_side: Some(ReadSide { reader, input }),
            writer: Some(writer),
            socket_open: true,
            shutdown,
            read_state: ReadState::Idle,
            validator,
            msg_handler,
            close_handler: Some(close_handler),
            resp_out_ctx: RawOutputContext::new(config.max_groups_per_write),
            awaiting_buffers: OutgoingDataQueue::new(),
            close_reason: None,
            config,
        };

        core.logger.trace(|| {
            format!(
                "[ws_connection:{}] start connection as {}",
                id, core.config.role
            )
        });

        core
    }

    /// Handle envelopes until the last reference to the connection is gone.
    pub(crate) async fn run(mut self, mut mailbox: mpsc::UnboundedReceiver<Envelope>) {
        while let Some(Envelope { ctx, op }) = mailbox.recv().await {
            self.dispatch(&ctx, op);
        }
    }

    fn dispatch(&mut self, ctx: &Mailbox, op: Op) {
        let id = self.id;
        match op {
            Op::Close(frame) => {
                if let Err(e) = self.graceful_close(ctx, frame, None) {
                    self.logger
                        .error(|| format!("[ws_connection:{id}] close operation error: {e}"));
                }
            }
            Op::InitRead => {
                if self.read_state != ReadState::Idle {
                    let state = self.read_state;
                    self.logger.warn(|| {
                        format!("[ws_connection:{id}] init read ignored, read loop is {state}")
                    });
                } else if let Err(e) = self.start_read_header(ctx) {
                    let reason = e.to_string();
                    self.trigger_error_and_close(reason, || {
                        format!("[ws_connection:{id}] unable to init read: {e}")
                    });
                }
            }
            Op::WriteData(groups) => {
                if let Err(e) = self.write_data_impl(ctx, groups) {
                    let reason = e.to_string();
                    self.trigger_error_and_close(reason, || {
                        format!("[ws_connection:{id}] unable to write data: {e}")
                    });
                }
            }
            Op::HeaderRead { side, result } => {
                if let Err(e) = self.after_read_header(ctx, side, result) {
                    let reason = e.to_string();
                    self.trigger_error_and_close(reason, || {
                        format!("[ws_connection:{id}] after read header callback error: {e}")
                    });
                }
            }
            Op::PayloadRead {
                side,
                frame,
                result,
            } => {
                if let Err(e) = self.after_read_payload(ctx, side, frame, result) {
                    let reason = e.to_string();
                    self.trigger_error_and_close(reason, || {
                        format!("[ws_connection:{id}] after read payload callback error: {e}")
                    });
                }
            }
            Op::WriteDone { writer, result } => {
                if let Err(e) = self.after_write(ctx, writer, result) {
                    let reason = e.to_string();
                    self.trigger_error_and_close(reason, || {
                        format!("[ws_connection:{id}] after write callback error: {e}")
                    });
                }
            }
        }
    }

    // Read direction.

    fn start_read_header(&mut self, ctx: &Mailbox) -> Result<()> {
        if !self.socket_open {
            return Err(Error::ConnectionClosed);
        }
        let side = self.read_side.take().ok_or(Error::ReadInProgress)?;

        let id = self.id;
        self.logger
            .trace(|| format!("[ws_connection:{id}] start reading header"));

        self.read_state = ReadState::ReadingHeader;
        ops::spawn_read_header(ctx.clone(), side, self.shutdown.subscribe());
        Ok(())
    }

    fn after_read_header(
        &mut self,
        ctx: &Mailbox,
        mut side: ReadSide,
        result: io::Result<usize>,
    ) -> Result<()> {
        if !self.socket_open {
            return Ok(());
        }

        match result {
            Ok(0) => {
                self.read_side = Some(side);
                self.read_failed(PEER_DISCONNECTED.to_string());
                Ok(())
            }
            Ok(n) => {
                side.input.obtained_bytes(n);
                self.read_side = Some(side);
                self.consume_input(ctx)
            }
            Err(e) => {
                self.read_side = Some(side);
                self.read_error(e);
                Ok(())
            }
        }
    }

    /// Parse and dispatch frames from the input buffer until it runs dry, then
    /// go back to reading headers, or read the rest of a payload.
    fn consume_input(&mut self, ctx: &Mailbox) -> Result<()> {
        loop {
            if self.read_state == ReadState::Stopped || !self.socket_open {
                return Ok(());
            }

            let side = self.read_side.as_mut().ok_or(Error::ReadInProgress)?;
            let (header, header_len) = match FrameHeader::parse(side.input.bytes()) {
                Ok(parsed) => parsed,
                Err(Error::IncompleteFrame { .. }) => return self.start_read_header(ctx),
                Err(e) => return self.protocol_error(ctx, e),
            };
            side.input.consumed_bytes(header_len);

            if let Err(e) = self.validator.validate_header(&header) {
                return self.protocol_error(ctx, e);
            }

            // Size limit checked above, so the length fits in memory.
            let payload_len = usize::try_from(header.payload_len).map_err(|_| {
                Error::FrameTooLarge {
                    size: header.payload_len,
                    max: self.config.limits.max_frame_size,
                }
            })?;

            let id = self.id;
            self.logger.trace(|| {
                format!(
                    "[ws_connection:{id}] frame header: {}, fin: {}, payload: {payload_len}b",
                    header.opcode, header.fin
                )
            });

            let mut frame = IncomingFrame::new(header, payload_len);
            let side = self.read_side.as_mut().ok_or(Error::ReadInProgress)?;
            let part = side.input.length().min(payload_len);
            frame.payload[..part].copy_from_slice(&side.input.bytes()[..part]);
            side.input.consumed_bytes(part);
            frame.filled = part;

            if !frame.is_complete() {
                return self.start_read_payload(ctx, frame);
            }
            self.call_handler_on_current_message(ctx, frame)?;
        }
    }

    fn start_read_payload(&mut self, ctx: &Mailbox, frame: IncomingFrame) -> Result<()> {
        let side = self.read_side.take().ok_or(Error::ReadInProgress)?;

        let id = self.id;
        let remaining = frame.remaining();
        self.logger.trace(|| {
            format!("[ws_connection:{id}] start reading payload, {remaining}b remaining")
        });

        self.read_state = ReadState::ReadingPayload;
        ops::spawn_read_payload(ctx.clone(), side, frame, self.shutdown.subscribe());
        Ok(())
    }

    fn after_read_payload(
        &mut self,
        ctx: &Mailbox,
        side: ReadSide,
        mut frame: IncomingFrame,
        result: io::Result<usize>,
    ) -> Result<()> {
        if !self.socket_open {
            return Ok(());
        }
        self.read_side = Some(side);

        match result {
            Ok(0) => {
                self.read_failed(PEER_DISCONNECTED.to_string());
                Ok(())
            }
            Ok(n) => {
                debug_assert!(n <= frame.remaining());
                frame.filled += n;
                if frame.is_complete() {
                    self.call_handler_on_current_message(ctx, frame)?;
                    self.consume_input(ctx)
                } else {
                    self.start_read_payload(ctx, frame)
                }
            }
            Err(e) => {
                self.read_error(e);
                Ok(())
            }
        }
    }

    fn call_handler_on_current_message(&mut self, ctx: &Mailbox, frame: IncomingFrame) -> Result<()> {
        let IncomingFrame {
            header,
            mut payload,
            ..
        } = frame;
        if let Some(key) = header.mask {
            apply_mask(&mut payload, key);
        }
        if let Err(e) = self.validator.validate_payload(&header, &payload) {
            return self.protocol_error(ctx, e);
        }

        let message = WsMessage::new(header.fin, header.opcode, payload);
        let payload = message.payload.clone();

        let id = self.id;
        self.logger.trace(|| {
            format!(
                "[ws_connection:{id}] message received: {}, {}b",
                header.opcode,
                payload.len()
            )
        });

        let handle = WsConnection::from_mailbox(
            id,
            self.config.role,
            ctx.clone(),
            Arc::clone(&self.logger),
        );
        (self.msg_handler)(handle, message);

        match header.opcode {
            OpCode::Close => {
                self.read_state = ReadState::Stopped;
                let reply = CloseFrame::parse(&payload)?
                    .map(|peer| CloseFrame::new(peer.code, ""))
                    .unwrap_or_else(|| CloseFrame::new(CloseCode::Normal, ""));
                self.graceful_close(ctx, reply, Some(CLOSED_BY_PEER.to_string()))
            }
            OpCode::Ping => {
                if self.socket_open && !self.awaiting_buffers.close_when_done() {
                    let pong = WsMessage::pong(payload)
                        .into_buffer_group(self.config.role.outgoing_mask());
                    self.write_data_impl(ctx, vec![pong])
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    /// Inbound data broke the protocol: stop reading and close with the
    /// matching status code.
    fn protocol_error(&mut self, ctx: &Mailbox, error: Error) -> Result<()> {
        let id = self.id;
        self.logger
            .error(|| format!("[ws_connection:{id}] protocol error: {error}"));

        self.read_state = ReadState::Stopped;
        let frame = CloseFrame::new(error.close_code(), "");
        self.graceful_close(ctx, frame, Some(error.to_string()))
    }

    fn read_error(&mut self, error: io::Error) {
        if is_operation_aborted(&error) {
            self.read_state = ReadState::Stopped;
            return;
        }
        self.read_failed(error.to_string());
    }

    fn read_failed(&mut self, reason: String) {
        self.read_state = ReadState::Stopped;

        let id = self.id;
        if self.awaiting_buffers.close_when_done() {
            // Peer went away while our close was pending.
            self.logger
                .trace(|| format!("[ws_connection:{id}] read stopped while closing: {reason}"));
            return;
        }

        let message = format!("[ws_connection:{id}] unable to read: {reason}");
        self.trigger_error_and_close(reason, || message);
    }

    // Write direction.

    fn write_data_impl(&mut self, ctx: &Mailbox, groups: Vec<BufferGroup>) -> Result<()> {
        let id = self.id;
        if !self.socket_open {
            self.logger.warn(|| {
                format!("[ws_connection:{id}] try to write response, while socket is closed")
            });
            return Ok(());
        }
        if self.awaiting_buffers.close_when_done() {
            // Races between user code and teardown make this legal.
            self.logger.warn(|| {
                format!("[ws_connection:{id}] try to write response after websocket was closed")
            });
            return Ok(());
        }

        self.awaiting_buffers.append(groups);
        self.init_write_if_necessary(ctx)
    }

    /// Start a write if none is outstanding and there is something queued;
    /// close the socket if the queue is drained and close was requested.
    fn init_write_if_necessary(&mut self, ctx: &Mailbox) -> Result<()> {
        if self.resp_out_ctx.transmitting() {
            return Ok(());
        }

        if self.resp_out_ctx.obtain_bufs(&mut self.awaiting_buffers) {
            let Some(writer) = self.writer.take() else {
                self.resp_out_ctx.done();
                return Err(Error::ConnectionClosed);
            };
            let bufs = self.resp_out_ctx.create_bufs();

            let id = self.id;
            let count = bufs.len();
            self.logger.trace(|| {
                format!("[ws_connection:{id}] sending resp data, buf count: {count}")
            });

            ops::spawn_write(ctx.clone(), writer, bufs, self.shutdown.subscribe());
        } else if self.awaiting_buffers.close_when_done() {
            let reason = self
                .close_reason
                .take()
                .unwrap_or_else(|| USER_INITIATED.to_string());
            self.call_close_handler(reason);
            self.close_impl();
        }

        Ok(())
    }

    fn after_write(
        &mut self,
        ctx: &Mailbox,
        writer: SocketWriter,
        result: io::Result<usize>,
    ) -> Result<()> {
        self.resp_out_ctx.done();
        if self.socket_open {
            self.writer = Some(writer);
        }

        let id = self.id;
        match result {
            Ok(written) => {
                self.logger.trace(|| {
                    format!("[ws_connection:{id}] outgoing data was sent: {written}b")
                });
                if self.socket_open {
                    self.init_write_if_necessary(ctx)?;
                }
            }
            // Only an intentional close aborts a write.
            Err(e) if is_operation_aborted(&e) => {}
            Err(e) if !self.socket_open => {
                self.logger
                    .trace(|| format!("[ws_connection:{id}] write failed after close: {e}"));
            }
            Err(e) => {
                let reason = e.to_string();
                self.trigger_error_and_close(reason, || {
                    format!("[ws_connection:{id}] unable to write: {e}")
                });
            }
        }
        Ok(())
    }

    // Closing.

    /// Queue a close frame and let the write loop close the socket once
    /// everything before it has been sent. No-op if close was already
    /// requested.
    fn graceful_close(
        &mut self,
        ctx: &Mailbox,
        frame: CloseFrame,
        reason: Option<String>,
    ) -> Result<()> {
        if self.awaiting_buffers.close_when_done() {
            return Ok(());
        }

        if self.socket_open {
            let close = WsMessage::new(true, OpCode::Close, frame.encode())
                .into_buffer_group(self.config.role.outgoing_mask());
            self.awaiting_buffers.append(vec![close]);
        }
        self.close_reason = reason;
        self.awaiting_buffers.set_close_when_done();
        self.init_write_if_necessary(ctx)
    }

    /// Shut the socket down in both directions and close it. Idempotent.
    fn close_impl(&mut self) {
        if !self.socket_open {
            return;
        }

        let id = self.id;
        self.logger.trace(|| format!("[ws_connection:{id}] close"));

        self.socket_open = false;
        self.read_state = ReadState::Stopped;
        self.shutdown.send_replace(true);
        self.read_side = None;
        let _ = self.awaiting_buffers.pop_ready(usize::MAX);

        if let Some(mut writer) = self.writer.take() {
            tokio::spawn(async move {
                // Best effort: the socket is dropped either way.
                let _ = writer.shutdown().await;
            });
        }
    }

    fn trigger_error_and_close<F>(&mut self, reason: String, build: F)
    where
        F: FnOnce() -> String,
    {
        self.logger.error(build);
        self.call_close_handler(reason);
        self.close_impl();
    }

    fn call_close_handler(&mut self, reason: String) {
        if let Some(handler) = self.close_handler.take() {
            handler(reason);
        }
    }
}

impl Drop for ConnectionCore {
    fn drop(&mut self) {
        let id = self.id;
        self.logger
            .trace(|| format!("[ws_connection:{id}] destroyed"));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use bytes::Bytes;
    use tokio::io::{AsyncReadExt, DuplexStream};
    use tracing::Level;

    use super::*;
    use crate::error::operation_aborted;
    use crate::logger::testing::RecordingLogger;

    struct Fixture {
        core: ConnectionCore,
        remote: DuplexStream,
        logger: Arc<RecordingLogger>,
        closes: Arc<Mutex<Vec<String>>>,
        messages: Arc<Mutex<Vec<WsMessage>>>,
        ctx: Mailbox,
        _rx: mpsc::UnboundedReceiver<Envelope>,
    }

    fn fixture(config: Config) -> Fixture {
        let (local, remote) = tokio::io::duplex(4096);
        let (reader, writer) = tokio::io::split(local);
        let logger = Arc::new(RecordingLogger::default());
        let settings = ConnectionSettings::with_logger(config, logger.clone());

        let closes = Arc::new(Mutex::new(Vec::new()));
        let messages = Arc::new(Mutex::new(Vec::new()));
        let (c, m) = (closes.clone(), messages.clone());

        let core = ConnectionCore::new(
            7,
            &settings,
            Box::new(reader),
            Box::new(writer),
            Box::new(move |_: WsConnection, msg: WsMessage| m.lock().unwrap().push(msg)),
            Box::new(move |reason: String| c.lock().unwrap().push(reason)),
        );
        let (ctx, rx) = mpsc::unbounded_channel();

        Fixture {
            core,
            remote,
            logger,
            closes,
            messages,
            ctx,
            _rx: rx,
        }
    }

    fn closes(f: &Fixture) -> Vec<String> {
        f.closes.lock().unwrap().clone()
    }

    fn count_lines(f: &Fixture, level: Level, needle: &str) -> usize {
        f.logger
            .lines_at(level)
            .iter()
            .filter(|l| l.contains(needle))
            .count()
    }

    #[tokio::test]
    async fn test_drained_close_notifies_user_initiated_once() {
        let mut f = fixture(Config::server());
        f.core.awaiting_buffers.set_close_when_done();

        f.core.init_write_if_necessary(&f.ctx).unwrap();
        assert_eq!(closes(&f), vec![USER_INITIATED.to_string()]);
        assert!(!f.core.socket_open);

        f.core.init_write_if_necessary(&f.ctx).unwrap();
        assert_eq!(closes(&f).len(), 1);
        assert_eq!(count_lines(&f, Level::TRACE, "] close"), 1);

        // Peer sees the shutdown.
        let mut buf = [0u8; 8];
        assert_eq!(f.remote.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_write_to_closed_socket_is_ignored() {
        let mut f = fixture(Config::server());
        f.core.close_impl();

        f.core
            .write_data_impl(&f.ctx, vec![BufferGroup::from("late")])
            .unwrap();

        assert!(f.core.awaiting_buffers.is_empty());
        assert!(!f.core.resp_out_ctx.transmitting());
        assert_eq!(count_lines(&f, Level::WARN, "while socket is closed"), 1);
    }

    #[tokio::test]
    async fn test_write_after_close_requested_is_ignored() {
        let mut f = fixture(Config::server());
        f.core.write_data_impl(&f.ctx, vec![BufferGroup::from("first")]).unwrap();
        assert!(f.core.resp_out_ctx.transmitting());

        f.core
            .graceful_close(&f.ctx, CloseFrame::new(CloseCode::Normal, ""), None)
            .unwrap();
        let queued = f.core.awaiting_buffers.len();

        f.core
            .write_data_impl(&f.ctx, vec![BufferGroup::from("second")])
            .unwrap();
        assert_eq!(f.core.awaiting_buffers.len(), queued);
        assert_eq!(count_lines(&f, Level::WARN, "after websocket was closed"), 1);
    }

    #[tokio::test]
    async fn test_aborted_write_after_close_is_silent() {
        let mut f = fixture(Config::server());
        f.core.write_data_impl(&f.ctx, vec![BufferGroup::from("data")]).unwrap();
        assert!(f.core.resp_out_ctx.transmitting());

        f.core.trigger_error_and_close("boom".into(), || "boom".into());
        assert_eq!(closes(&f), vec!["boom".to_string()]);
        let errors_before = f.logger.lines_at(Level::ERROR).len();

        f.core
            .after_write(&f.ctx, Box::new(tokio::io::sink()), Err(operation_aborted()))
            .unwrap();

        assert_eq!(closes(&f).len(), 1);
        assert_eq!(f.logger.lines_at(Level::ERROR).len(), errors_before);
        assert!(!f.core.resp_out_ctx.transmitting());
        assert!(f.core.writer.is_none());
    }

    #[tokio::test]
    async fn test_failed_write_closes_with_reason() {
        let mut f = fixture(Config::server());
        f.core.write_data_impl(&f.ctx, vec![BufferGroup::from("data")]).unwrap();

        let err = io::Error::new(io::ErrorKind::BrokenPipe, "pipe broken");
        f.core
            .after_write(&f.ctx, Box::new(tokio::io::sink()), Err(err))
            .unwrap();

        assert_eq!(closes(&f), vec!["pipe broken".to_string()]);
        assert!(!f.core.socket_open);
        assert_eq!(count_lines(&f, Level::ERROR, "unable to write"), 1);
    }

    #[tokio::test]
    async fn test_second_write_waits_for_first() {
        let mut f = fixture(Config::server());
        f.core.write_data_impl(&f.ctx, vec![BufferGroup::from("a")]).unwrap();
        f.core.write_data_impl(&f.ctx, vec![BufferGroup::from("b")]).unwrap();

        // Only one write went out; "b" stays queued.
        assert!(f.core.resp_out_ctx.transmitting());
        assert_eq!(f.core.awaiting_buffers.len(), 1);
        assert_eq!(count_lines(&f, Level::TRACE, "sending resp data"), 1);

        f.core.init_write_if_necessary(&f.ctx).unwrap();
        assert_eq!(count_lines(&f, Level::TRACE, "sending resp data"), 1);
    }

    #[tokio::test]
    async fn test_graceful_close_queues_close_frame_first() {
        let mut f = fixture(Config::server());
        f.core
            .graceful_close(&f.ctx, CloseFrame::new(CloseCode::Normal, ""), None)
            .unwrap();
        f.core
            .graceful_close(&f.ctx, CloseFrame::new(CloseCode::GoingAway, ""), None)
            .unwrap();

        assert!(f.core.awaiting_buffers.close_when_done());
        assert!(f.core.resp_out_ctx.transmitting());
        assert!(closes(&f).is_empty());

        let mut buf = [0u8; 4];
        f.remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0x88, 0x02, 0x03, 0xE8]);
    }

    #[tokio::test]
    async fn test_header_and_payload_in_one_read() {
        let mut f = fixture(Config::server().with_accept_unmasked_frames(true));
        let side = f.core.read_side.as_mut().unwrap();
        let wire = [0x82, 0x03, 1, 2, 3, 0x81];
        side.input.read_space()[..wire.len()].copy_from_slice(&wire);
        side.input.obtained_bytes(wire.len());

        f.core.consume_input(&f.ctx).unwrap();

        let messages = f.messages.lock().unwrap().clone();
        assert_eq!(messages, vec![WsMessage::binary(Bytes::from_static(&[1, 2, 3]))]);
        // The trailing byte starts the next header, so a header read is pending.
        assert_eq!(f.core.read_state, ReadState::ReadingHeader);
        assert!(f.core.read_side.is_none());
    }

    #[tokio::test]
    async fn test_protocol_error_stops_reading_and_closes() {
        let mut f = fixture(Config::server());
        let side = f.core.read_side.as_mut().unwrap();
        // Unmasked frame from a client.
        let wire = [0x81, 0x01, b'x'];
        side.input.read_space()[..wire.len()].copy_from_slice(&wire);
        side.input.obtained_bytes(wire.len());

        f.core.consume_input(&f.ctx).unwrap();

        assert_eq!(f.core.read_state, ReadState::Stopped);
        assert!(f.core.awaiting_buffers.close_when_done());
        assert!(f.messages.lock().unwrap().is_empty());
        assert_eq!(count_lines(&f, Level::ERROR, "protocol error"), 1);

        let mut buf = [0u8; 4];
        f.remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0x88, 0x02, 0x03, 0xEA]);
    }

    #[tokio::test]
    async fn test_eof_while_reading_reports_error() {
        let mut f = fixture(Config::server());
        let side = f.core.read_side.take().unwrap();
        f.core.read_state = ReadState::ReadingHeader;

        f.core.after_read_header(&f.ctx, side, Ok(0)).unwrap();

        assert_eq!(closes(&f), vec![PEER_DISCONNECTED.to_string()]);
        assert!(!f.core.socket_open);
    }

    #[tokio::test]
    async fn test_aborted_read_is_silent() {
        let mut f = fixture(Config::server());
        let side = f.core.read_side.take().unwrap();
        f.core.read_state = ReadState::ReadingHeader;

        f.core
            .after_read_header(&f.ctx, side, Err(operation_aborted()))
            .unwrap();

        assert!(closes(&f).is_empty());
        assert_eq!(f.core.read_state, ReadState::Stopped);
        assert!(f.logger.lines_at(Level::ERROR).is_empty());
    }

    fn partial_payload(f: &mut Fixture) -> (ReadSide, IncomingFrame) {
        let side = f.core.read_side.take().unwrap();
        f.core.read_state = ReadState::ReadingPayload;
        let header = FrameHeader::new(OpCode::Binary, 100).with_mask(Some([1, 2, 3, 4]));
        let mut frame = IncomingFrame::new(header, 100);
        frame.filled = 40;
        (side, frame)
    }

    #[tokio::test]
    async fn test_payload_read_error_closes() {
        let mut f = fixture(Config::server());
        let (side, frame) = partial_payload(&mut f);

        let err = io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer");
        f.core.after_read_payload(&f.ctx, side, frame, Err(err)).unwrap();

        assert_eq!(closes(&f), vec!["reset by peer".to_string()]);
        assert!(!f.core.socket_open);
        assert!(f.messages.lock().unwrap().is_empty());
        assert_eq!(count_lines(&f, Level::ERROR, "unable to read"), 1);
    }

    #[tokio::test]
    async fn test_eof_during_payload_reports_disconnect() {
        let mut f = fixture(Config::server());
        let (side, frame) = partial_payload(&mut f);

        f.core.after_read_payload(&f.ctx, side, frame, Ok(0)).unwrap();

        assert_eq!(closes(&f), vec![PEER_DISCONNECTED.to_string()]);
        assert!(!f.core.socket_open);
        assert!(f.messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_aborted_payload_read_is_silent() {
        let mut f = fixture(Config::server());
        let (side, frame) = partial_payload(&mut f);

        f.core
            .after_read_payload(&f.ctx, side, frame, Err(operation_aborted()))
            .unwrap();

        assert!(closes(&f).is_empty());
        assert_eq!(f.core.read_state, ReadState::Stopped);
        assert!(f.logger.lines_at(Level::ERROR).is_empty());
    }

    #[tokio::test]
    async fn test_write_error_after_close_is_traced_only() {
        let mut f = fixture(Config::server());
        f.core.write_data_impl(&f.ctx, vec![BufferGroup::from("data")]).unwrap();

        f.core.trigger_error_and_close("read failed".into(), || "read failed".into());
        let errors_before = f.logger.lines_at(Level::ERROR).len();

        let err = io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer");
        f.core
            .after_write(&f.ctx, Box::new(tokio::io::sink()), Err(err))
            .unwrap();

        assert_eq!(closes(&f), vec!["read failed".to_string()]);
        assert_eq!(f.logger.lines_at(Level::ERROR).len(), errors_before);
        assert_eq!(count_lines(&f, Level::TRACE, "write failed after close"), 1);
    }
}
