//! Connection under test, with its callbacks turned into channels.

use std::time::Duration;

use tokio::sync::mpsc;
use wsconn::{Config, ConnectionSettings, WsConnection, WsMessage};

use super::Peer;

const WAIT: Duration = Duration::from_secs(5);

pub struct Endpoint {
    pub conn: WsConnection,
    messages: mpsc::UnboundedReceiver<WsMessage>,
    closes: mpsc::UnboundedReceiver<String>,
}

impl Endpoint {
    /// Spawn a connection that records what it receives.
    pub fn spawn(config: Config) -> (Self, Peer) {
        Self::spawn_with(config, false)
    }

    /// Spawn a connection that also sends every data frame back.
    pub fn spawn_echo(config: Config) -> (Self, Peer) {
        Self::spawn_with(config, true)
    }

    fn spawn_with(config: Config, echo: bool) -> (Self, Peer) {
        let (local, remote) = tokio::io::duplex(64 * 1024);
        let (msg_tx, messages) = mpsc::unbounded_channel();
        let (close_tx, closes) = mpsc::unbounded_channel();

        let conn = WsConnection::spawn(
            local,
            &ConnectionSettings::new(config),
            move |conn: WsConnection, msg: WsMessage| {
                if echo && msg.opcode.is_data() {
                    conn.send_message(msg.clone());
                }
                let _ = msg_tx.send(msg);
            },
            move |reason: String| {
                let _ = close_tx.send(reason);
            },
        );

        (
            Self {
                conn,
                messages,
                closes,
            },
            Peer::new(remote),
        )
    }

    pub async fn next_message(&mut self) -> WsMessage {
        tokio::time::timeout(WAIT, self.messages.recv())
            .await
            .expect("timed out waiting for a message")
            .expect("message handler dropped")
    }

    pub async fn close_reason(&mut self) -> String {
        tokio::time::timeout(WAIT, self.closes.recv())
            .await
            .expect("timed out waiting for the close handler")
            .expect("close handler dropped without being called")
    }

    /// The close handler has not run, and will never run again.
    pub fn no_more_closes(&mut self) -> bool {
        self.closes.try_recv().is_err()
    }

    pub fn no_pending_messages(&mut self) -> bool {
        self.messages.try_recv().is_err()
    }
}
