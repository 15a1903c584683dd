//! Realtime connection to the game server.
//!
//! ARCHITECTURE
//! ============
//! [`RealtimeHandle`] is the thin, user-facing wrapper: it is built eagerly,
//! started explicitly, and exposes [`ConnectionStatus`]. The `transport`
//! worker speaks Socket.IO over a single websocket and reports lifecycle
//! callbacks (`connect`, `disconnect`, `connect_error`, any event) back to the
//! handle. Reconnect/backoff lives entirely in the transport; the handle only
//! records what it is told.

pub mod handle;
mod transport;

#[cfg(test)]
pub(crate) mod test_server;

use serde::Serialize;
use serde_json::Value;

pub use handle::RealtimeHandle;

/// One inbound event as seen by the catch-all listener.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InboundEvent {
    pub name: String,
    pub args: Vec<Value>,
}

/// Connection state published by the handle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    /// Most recent inbound events, oldest first.
    pub recent_events: Vec<InboundEvent>,
}

/// Lifecycle callbacks delivered by the transport.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TransportEvent {
    Connect { socket_id: String },
    Disconnect { reason: String },
    ConnectError { message: String },
    Event { name: String, args: Vec<Value> },
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("realtime connection has not been started")]
    NotStarted,
    #[error("invalid realtime url: {0}")]
    InvalidUrl(String),
    #[error("websocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("packet decode failed: {0}")]
    Codec(#[from] packets::CodecError),
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("connection refused by server: {0}")]
    Refused(String),
    #[error("transport closed")]
    Closed,
}

impl From<tokio_tungstenite::tungstenite::Error> for ConnectionError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(error))
    }
}
