//! Engine.IO v4 / Socket.IO v5 text packet codec for the realtime transport.
//!
//! The client only ever speaks the websocket transport, so each packet travels
//! as exactly one text frame and payload batching never applies. Binary
//! attachments are rejected at decode time.
//!
//! LAYERING
//! ========
//! An Engine.IO `Message` packet (`4`) carries a Socket.IO packet as its body,
//! so a game event on the wire looks like `42["room_update",{...}]`: engine
//! type `4`, socket type `2`, then the JSON argument array.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Namespace used when a packet does not name one explicitly.
pub const DEFAULT_NAMESPACE: &str = "/";

/// Error returned by the packet decoders.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The frame had no packet type character.
    #[error("empty packet")]
    Empty,
    /// The leading character is not a known Engine.IO packet type.
    #[error("unknown engine.io packet type: {0:?}")]
    UnknownEngineType(char),
    /// The leading character is not a known Socket.IO packet type.
    #[error("unknown socket.io packet type: {0:?}")]
    UnknownSocketType(char),
    /// Binary event/ack packets need attachment frames, which we never negotiate.
    #[error("binary socket.io packets are not supported")]
    BinaryUnsupported,
    /// The packet body is not valid JSON.
    #[error("invalid packet payload: {0}")]
    Json(#[from] serde_json::Error),
    /// Event payloads must be an array whose first element is the event name.
    #[error("event packet must be an array starting with a string name")]
    InvalidEvent,
}

// =============================================================================
// ENGINE.IO
// =============================================================================

/// Handshake body sent by the server in the Engine.IO `open` packet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPayload {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds between server pings.
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong.
    pub ping_timeout: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload: Option<u64>,
}

/// A single Engine.IO packet.
#[derive(Clone, Debug, PartialEq)]
pub enum EnginePacket {
    Open(OpenPayload),
    Close,
    Ping(Option<String>),
    Pong(Option<String>),
    /// Opaque message body; for Socket.IO this is an encoded [`SocketPacket`].
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    /// Wrap a Socket.IO packet in an Engine.IO message.
    #[must_use]
    pub fn socket(packet: &SocketPacket) -> Self {
        Self::Message(packet.encode())
    }

    /// Encode into the text form sent over the websocket.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::Open(open) => {
                let body = serde_json::to_string(open).unwrap_or_default();
                format!("0{body}")
            }
            Self::Close => "1".to_owned(),
            Self::Ping(probe) => format!("2{}", probe.as_deref().unwrap_or_default()),
            Self::Pong(probe) => format!("3{}", probe.as_deref().unwrap_or_default()),
            Self::Message(body) => format!("4{body}"),
            Self::Upgrade => "5".to_owned(),
            Self::Noop => "6".to_owned(),
        }
    }

    /// Decode a websocket text frame.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] for an empty frame, an unknown type character,
    /// or an `open` packet whose body is not a valid handshake.
    pub fn decode(text: &str) -> Result<Self, CodecError> {
        let mut chars = text.chars();
        let kind = chars.next().ok_or(CodecError::Empty)?;
        let rest = chars.as_str();
        match kind {
            '0' => Ok(Self::Open(serde_json::from_str(rest)?)),
            '1' => Ok(Self::Close),
            '2' => Ok(Self::Ping(non_empty(rest))),
            '3' => Ok(Self::Pong(non_empty(rest))),
            '4' => Ok(Self::Message(rest.to_owned())),
            '5' => Ok(Self::Upgrade),
            '6' => Ok(Self::Noop),
            other => Err(CodecError::UnknownEngineType(other)),
        }
    }
}

fn non_empty(raw: &str) -> Option<String> {
    if raw.is_empty() { None } else { Some(raw.to_owned()) }
}

// =============================================================================
// SOCKET.IO
// =============================================================================

/// Socket.IO packet type. Binary variants are intentionally absent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SocketPacketKind {
    Connect,
    Disconnect,
    Event,
    Ack,
    ConnectError,
}

impl SocketPacketKind {
    fn as_char(self) -> char {
        match self {
            Self::Connect => '0',
            Self::Disconnect => '1',
            Self::Event => '2',
            Self::Ack => '3',
            Self::ConnectError => '4',
        }
    }

    fn from_char(value: char) -> Result<Self, CodecError> {
        match value {
            '0' => Ok(Self::Connect),
            '1' => Ok(Self::Disconnect),
            '2' => Ok(Self::Event),
            '3' => Ok(Self::Ack),
            '4' => Ok(Self::ConnectError),
            '5' | '6' => Err(CodecError::BinaryUnsupported),
            other => Err(CodecError::UnknownSocketType(other)),
        }
    }
}

/// A Socket.IO packet carried inside an Engine.IO message.
#[derive(Clone, Debug, PartialEq)]
pub struct SocketPacket {
    pub kind: SocketPacketKind,
    pub namespace: String,
    pub ack_id: Option<u64>,
    pub data: Option<Value>,
}

impl SocketPacket {
    fn new(kind: SocketPacketKind, data: Option<Value>) -> Self {
        Self {
            kind,
            namespace: DEFAULT_NAMESPACE.to_owned(),
            ack_id: None,
            data,
        }
    }

    /// Namespace connect request, optionally carrying an auth payload.
    #[must_use]
    pub fn connect(auth: Option<Value>) -> Self {
        Self::new(SocketPacketKind::Connect, auth)
    }

    #[must_use]
    pub fn disconnect() -> Self {
        Self::new(SocketPacketKind::Disconnect, None)
    }

    /// Event packet: `[name, ...args]`.
    #[must_use]
    pub fn event(name: &str, args: Vec<Value>) -> Self {
        let mut items = Vec::with_capacity(args.len() + 1);
        items.push(Value::String(name.to_owned()));
        items.extend(args);
        Self::new(SocketPacketKind::Event, Some(Value::Array(items)))
    }

    /// Split an event packet into its name and argument list.
    #[must_use]
    pub fn event_parts(&self) -> Option<(&str, &[Value])> {
        if self.kind != SocketPacketKind::Event {
            return None;
        }
        let items = self.data.as_ref()?.as_array()?;
        let (name, args) = items.split_first()?;
        Some((name.as_str()?, args))
    }

    /// Socket id assigned by the server in a connect acknowledgement.
    #[must_use]
    pub fn sid(&self) -> Option<&str> {
        if self.kind != SocketPacketKind::Connect {
            return None;
        }
        self.data.as_ref()?.get("sid")?.as_str()
    }

    /// Human-readable reason carried by a `connect_error` packet.
    ///
    /// Servers send either `{"message": "..."}` or a bare string.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        if self.kind != SocketPacketKind::ConnectError {
            return None;
        }
        let data = self.data.as_ref()?;
        data.get("message")
            .and_then(Value::as_str)
            .or_else(|| data.as_str())
    }

    /// Encode as `<type>[<namespace>,][<ack id>][<json>]`.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut out = String::new();
        out.push(self.kind.as_char());
        if self.namespace != DEFAULT_NAMESPACE {
            out.push_str(&self.namespace);
            out.push(',');
        }
        if let Some(id) = self.ack_id {
            out.push_str(&id.to_string());
        }
        if let Some(data) = &self.data {
            out.push_str(&data.to_string());
        }
        out
    }

    /// Decode the body of an Engine.IO message.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] for unknown or binary packet types, invalid JSON,
    /// or event packets that do not start with a string name.
    pub fn decode(text: &str) -> Result<Self, CodecError> {
        let mut chars = text.chars();
        let kind = SocketPacketKind::from_char(chars.next().ok_or(CodecError::Empty)?)?;
        let mut rest = chars.as_str();

        let mut namespace = DEFAULT_NAMESPACE.to_owned();
        if rest.starts_with('/') {
            match rest.find(',') {
                Some(end) => {
                    namespace = rest[..end].to_owned();
                    rest = &rest[end + 1..];
                }
                None => {
                    namespace = rest.to_owned();
                    rest = "";
                }
            }
        }

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let ack_id = if digits > 0 { rest[..digits].parse::<u64>().ok() } else { None };
        rest = &rest[digits..];

        let data = if rest.is_empty() {
            None
        } else {
            Some(serde_json::from_str::<Value>(rest)?)
        };

        let packet = Self {
            kind,
            namespace,
            ack_id,
            data,
        };
        if kind == SocketPacketKind::Event && packet.event_parts().is_none() {
            return Err(CodecError::InvalidEvent);
        }
        Ok(packet)
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
