//! Per-connection client handles.
//!
//! A [`ClientHandle`] is the only thing the core ever holds for a live
//! connection: an id and the outbound message channel. The websocket read
//! loop and writer task own the socket itself; the core pushes frames
//! through the channel without ever touching transport state.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::Message;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tracing::trace;

use spigot_protocol::ResponseFrame;

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier for one live connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    pub fn next() -> Self {
        ClientId(NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Outbound side of one connection.
///
/// Sends never block; a full or closed channel means the connection is
/// going away and the frame is dropped, which is the correct behavior for
/// pushes to a dying socket.
#[derive(Clone)]
pub struct ClientHandle {
    pub id: ClientId,
    tx: UnboundedSender<Message>,
}

impl ClientHandle {
    pub fn new(id: ClientId, tx: UnboundedSender<Message>) -> Self {
        Self { id, tx }
    }

    /// Serialize and queue a frame for this client.
    pub fn send_frame(&self, frame: &ResponseFrame) {
        match serde_json::to_string(frame) {
            Ok(json) => {
                if self.tx.send(Message::Text(json)).is_err() {
                    trace!(client = %self.id, "dropping frame for closed connection");
                }
            }
            Err(e) => {
                trace!(client = %self.id, error = %e, "unserializable frame");
            }
        }
    }

    /// Queue an unsolicited push.
    pub fn push(&self, action: &str, data: Value) {
        self.send_frame(&ResponseFrame::push(action, data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_ids_are_unique() {
        let a = ClientId::next();
        let b = ClientId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn send_frame_delivers_json() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = ClientHandle::new(ClientId::next(), tx);
        handle.push("config", serde_json::json!({"nonceCount": 1}));

        match rx.try_recv().unwrap() {
            Message::Text(json) => {
                assert!(json.contains("\"action\":\"config\""));
                assert!(!json.contains("rsp"));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn send_to_closed_connection_is_silent() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        let handle = ClientHandle::new(ClientId::next(), tx);
        handle.push("config", serde_json::json!({}));
    }
}
