//! Socket operations issued by a connection and the envelopes their
//! completions come back in.
//!
//! Each operation runs in its own task, owns the socket half it works on and
//! holds a strong sender to the connection's mailbox. On completion it posts
//! the half, the buffers and the result back, so the connection state is only
//! ever touched from the connection's own task. Closing the connection flips
//! the shutdown flag; pending operations then complete with
//! [`operation_aborted`].

use std::future::Future;
use std::io::{self, IoSlice};

use bytes::{Buf, Bytes};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};

use crate::buffers::{BufferGroup, FixedInputBuffer};
use crate::error::operation_aborted;
use crate::protocol::{CloseFrame, FrameHeader};

pub(crate) type SocketReader = Box<dyn AsyncRead + Send + Unpin>;
pub(crate) type SocketWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Strong reference to a connection: while one exists the connection task
/// keeps running.
pub(crate) type Mailbox = mpsc::UnboundedSender<Envelope>;

/// Work item for the connection task, with the reference that keeps the
/// connection alive until it has been handled.
pub(crate) struct Envelope {
    pub(crate) ctx: Mailbox,
    pub(crate) op: Op,
}

pub(crate) enum Op {
    Close(CloseFrame),
    InitRead,
    WriteData(Vec<BufferGroup>),
    HeaderRead {
        side: ReadSide,
        result: io::Result<usize>,
    },
    PayloadRead {
        side: ReadSide,
        frame: IncomingFrame,
        result: io::Result<usize>,
    },
    WriteDone {
        writer: SocketWriter,
        result: io::Result<usize>,
    },
}

/// Read half of the socket together with the header input buffer.
pub(crate) struct ReadSide {
    pub(crate) reader: SocketReader,
    pub(crate) input: FixedInputBuffer,
}

/// Frame whose payload is being received.
#[derive(Debug)]
pub(crate) struct IncomingFrame {
    pub(crate) header: FrameHeader,
    pub(crate) payload: Vec<u8>,
    /// Bytes of `payload` received so far.
    pub(crate) filled: usize,
}

impl IncomingFrame {
    pub(crate) fn new(header: FrameHeader, payload_len: usize) -> Self {
        Self {
            header,
            payload: vec![0u8; payload_len],
            filled: 0,
        }
    }

    #[inline]
    pub(crate) fn remaining(&self) -> usize {
        self.payload.len() - self.filled
    }

    #[inline]
    pub(crate) fn is_complete(&self) -> bool {
        self.filled == self.payload.len()
    }
}

fn post(ctx: Mailbox, op: Op) {
    // The receiver lives as long as any sender, and `ctx` is one.
    let _ = ctx.send(Envelope {
        ctx: ctx.clone(),
        op,
    });
}

async fn cancellable<F, T>(shutdown: &mut watch::Receiver<bool>, op: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    tokio::select! {
        biased;
        _ = shutdown.wait_for(|closed| *closed) => Err(operation_aborted()),
        result = op => result,
    }
}

/// Read whatever is available into the free space of the input buffer.
pub(crate) fn spawn_read_header(ctx: Mailbox, mut side: ReadSide, mut shutdown: watch::Receiver<bool>) {
    tokio::spawn(async move {
        let result = cancellable(&mut shutdown, side.reader.read(side.input.read_space())).await;
        post(ctx, Op::HeaderRead { side, result });
    });
}

/// Read whatever is available, up to the rest of the frame, straight into the
/// frame's payload storage.
pub(crate) fn spawn_read_payload(
    ctx: Mailbox,
    mut side: ReadSide,
    mut frame: IncomingFrame,
    mut shutdown: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let dst = &mut frame.payload[frame.filled..];
        let result = cancellable(&mut shutdown, side.reader.read(dst)).await;
        post(ctx, Op::PayloadRead { side, frame, result });
    });
}

/// Write all of `bufs` with vectored writes.
pub(crate) fn spawn_write(
    ctx: Mailbox,
    mut writer: SocketWriter,
    bufs: Vec<Bytes>,
    mut shutdown: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let result = cancellable(&mut shutdown, write_all_vectored(&mut writer, bufs)).await;
        post(ctx, Op::WriteDone { writer, result });
    });
}

async fn write_all_vectored<W>(writer: &mut W, mut bufs: Vec<Bytes>) -> io::Result<usize>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let total = bufs.iter().map(Bytes::len).sum();
    let mut first = 0;

    while first < bufs.len() {
        let written = {
            let slices: Vec<IoSlice<'_>> = bufs[first..].iter().map(|b| IoSlice::new(b)).collect();
            writer.write_vectored(&slices).await?
        };
        if written == 0 {
            return Err(io::ErrorKind::WriteZero.into());
        }

        let mut left = written;
        while left > 0 {
            let len = bufs[first].len();
            if left >= len {
                left -= len;
                first += 1;
            } else {
                bufs[first].advance(left);
                left = 0;
            }
        }
    }

    writer.flush().await?;
    Ok(total)
}
