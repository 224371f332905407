//! Remote side of a connection: writes raw frames and reads back whatever the
//! connection sends.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use wsconn::protocol::{FrameHeader, OpCode, apply_mask};
use wsconn::{CloseFrame, Error};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Key used for every frame the peer masks.
pub const PEER_MASK: [u8; 4] = [0x37, 0xfa, 0x21, 0x3d];

/// Frame as received by the peer, payload already unmasked.
#[derive(Debug)]
pub struct RecvFrame {
    pub header: FrameHeader,
    pub payload: Vec<u8>,
}

impl RecvFrame {
    pub fn text(&self) -> &str {
        std::str::from_utf8(&self.payload).unwrap()
    }

    pub fn close_frame(&self) -> CloseFrame {
        assert_eq!(self.header.opcode, OpCode::Close);
        CloseFrame::parse(&self.payload).unwrap().unwrap()
    }
}

pub struct Peer {
    stream: DuplexStream,
}

impl Peer {
    pub fn new(stream: DuplexStream) -> Self {
        Self { stream }
    }

    /// Wire bytes of a frame.
    pub fn encode(opcode: OpCode, fin: bool, payload: &[u8], mask: Option<[u8; 4]>) -> Vec<u8> {
        let header = FrameHeader::new(opcode, payload.len() as u64)
            .with_fin(fin)
            .with_mask(mask);
        let mut out = header.to_bytes().to_vec();
        let start = out.len();
        out.extend_from_slice(payload);
        if let Some(key) = mask {
            apply_mask(&mut out[start..], key);
        }
        out
    }

    /// Wire bytes of a masked frame, as a client sends it.
    pub fn client_frame(opcode: OpCode, fin: bool, payload: &[u8]) -> Vec<u8> {
        Self::encode(opcode, fin, payload, Some(PEER_MASK))
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    pub async fn send_masked(&mut self, opcode: OpCode, payload: &[u8]) {
        let bytes = Self::client_frame(opcode, true, payload);
        self.send_raw(&bytes).await;
    }

    pub async fn send_unmasked(&mut self, opcode: OpCode, payload: &[u8]) {
        let bytes = Self::encode(opcode, true, payload, None);
        self.send_raw(&bytes).await;
    }

    /// Next frame, or `None` once the connection has shut the stream down.
    pub async fn recv_frame(&mut self) -> Option<RecvFrame> {
        tokio::time::timeout(RECV_TIMEOUT, self.read_frame())
            .await
            .expect("timed out waiting for a frame")
            .unwrap()
    }

    /// Asserts that the connection closed the stream without sending more.
    pub async fn expect_eof(&mut self) {
        let frame = self.recv_frame().await;
        assert!(frame.is_none(), "expected EOF, got {frame:?}");
    }

    async fn read_frame(&mut self) -> io::Result<Option<RecvFrame>> {
        let mut buf = vec![0u8; 2];
        match self.stream.read_exact(&mut buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        }

        let (header, _) = loop {
            match FrameHeader::parse(&buf) {
                Ok(parsed) => break parsed,
                Err(Error::IncompleteFrame { needed }) => {
                    let start = buf.len();
                    buf.resize(start + needed, 0);
                    self.stream.read_exact(&mut buf[start..]).await?;
                }
                Err(e) => return Err(io::Error::other(e)),
            }
        };

        let mut payload = vec![0u8; header.payload_len as usize];
        self.stream.read_exact(&mut payload).await?;
        if let Some(key) = header.mask {
            apply_mask(&mut payload, key);
        }
        Ok(Some(RecvFrame { header, payload }))
    }
}
