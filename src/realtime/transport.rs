//! Socket.IO client transport over a single websocket.
//!
//! LIFECYCLE
//! =========
//! 1. Open the websocket at `{url}{path}?EIO=4&transport=websocket`
//! 2. Engine.IO `open` → send namespace connect `40` → wait for `40{sid}`
//! 3. Pump: answer pings, surface events, send queued emits
//! 4. On loss, back off and start again at 1 unless reconnection is off,
//!    the client closed, or the server disconnected the namespace
//!
//! Callbacks: `Connect` after step 2, `Disconnect` when a connected session
//! ends, `ConnectError` for every failed attempt at steps 1-2.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use packets::{EnginePacket, OpenPayload, SocketPacket, SocketPacketKind};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::handle::StatusRecorder;
use super::{ConnectionError, TransportEvent};
use crate::config::RealtimeConfig;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(20);
/// Emits held while between connections; the oldest are dropped beyond this.
const PENDING_EMIT_CAPACITY: usize = 1024;

type PendingEmits = VecDeque<(String, Vec<Value>)>;

/// Requests from the handle to the worker.
#[derive(Debug)]
pub(crate) enum Command {
    Emit { name: String, args: Vec<Value> },
    Close,
}

/// Why a connected session ended.
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    /// `disconnect()` was called or every handle was dropped.
    ClientClosed,
    /// The server sent a namespace disconnect; no reconnection.
    ServerDisconnect,
    /// Transport-level loss; eligible for reconnection.
    Lost(&'static str),
}

impl SessionEnd {
    fn reason(&self) -> &'static str {
        match self {
            Self::ClientClosed => "io client disconnect",
            Self::ServerDisconnect => "io server disconnect",
            Self::Lost(reason) => *reason,
        }
    }
}

/// Build the Engine.IO websocket URL from a server address.
pub(crate) fn websocket_url(base: &str, path: &str) -> Result<String, ConnectionError> {
    let base = base.trim().trim_end_matches('/');
    let (scheme, rest) = if let Some(rest) = base.strip_prefix("http://") {
        ("ws", rest)
    } else if let Some(rest) = base.strip_prefix("https://") {
        ("wss", rest)
    } else if let Some(rest) = base.strip_prefix("ws://") {
        ("ws", rest)
    } else if let Some(rest) = base.strip_prefix("wss://") {
        ("wss", rest)
    } else {
        return Err(ConnectionError::InvalidUrl(base.to_owned()));
    };
    if rest.is_empty() {
        return Err(ConnectionError::InvalidUrl(base.to_owned()));
    }

    let path = path.trim_matches('/');
    Ok(format!("{scheme}://{rest}/{path}/?EIO=4&transport=websocket"))
}

/// Worker entry point; runs until closed, dropped, or out of retries.
pub(crate) async fn run(
    config: Arc<RealtimeConfig>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    recorder: StatusRecorder,
) {
    let url = match websocket_url(&config.url, &config.path) {
        Ok(url) => url,
        Err(e) => {
            recorder.apply(TransportEvent::ConnectError { message: e.to_string() });
            return;
        }
    };
    let policy = config.reconnect;
    let mut pending = PendingEmits::new();
    let mut attempt: u32 = 0;

    loop {
        tracing::debug!(%url, attempt, "realtime connecting");
        let connecting = tokio::time::timeout(HANDSHAKE_TIMEOUT, handshake(&url));
        tokio::pin!(connecting);

        let result = loop {
            tokio::select! {
                result = &mut connecting => {
                    break result.unwrap_or_else(|_| Err(ConnectionError::Handshake("timed out".to_owned())));
                }
                command = commands.recv() => match command {
                    Some(Command::Emit { name, args }) => enqueue(&mut pending, name, args, PENDING_EMIT_CAPACITY),
                    Some(Command::Close) | None => return,
                },
            }
        };

        match result {
            Ok((mut ws, open, socket_id)) => {
                recorder.apply(TransportEvent::Connect { socket_id });
                attempt = 0;
                let end = pump(&mut ws, &open, &mut commands, &mut pending, &recorder).await;
                recorder.apply(TransportEvent::Disconnect { reason: end.reason().to_owned() });
                if !matches!(end, SessionEnd::Lost(_)) {
                    return;
                }
            }
            Err(e) => {
                let refused = matches!(e, ConnectionError::Refused(_));
                recorder.apply(TransportEvent::ConnectError { message: e.to_string() });
                if refused {
                    return;
                }
            }
        }

        if !policy.enabled || policy.max_attempts.is_some_and(|max| attempt >= max) {
            tracing::debug!(attempt, "realtime reconnection stopped");
            return;
        }
        let delay = policy.backoff(attempt);
        attempt = attempt.saturating_add(1);
        if !collect_commands_during_delay(delay, &mut commands, &mut pending).await {
            return;
        }
    }
}

async fn handshake(url: &str) -> Result<(WsStream, OpenPayload, String), ConnectionError> {
    let (mut ws, _) = connect_async(url).await?;

    let open = match recv_packet(&mut ws).await? {
        EnginePacket::Open(open) => open,
        other => {
            return Err(ConnectionError::Handshake(format!("expected open packet, got {other:?}")));
        }
    };
    send_packet(&mut ws, &EnginePacket::socket(&SocketPacket::connect(None))).await?;

    loop {
        match recv_packet(&mut ws).await? {
            EnginePacket::Ping(probe) => send_packet(&mut ws, &EnginePacket::Pong(probe)).await?,
            EnginePacket::Message(body) => {
                let packet = SocketPacket::decode(&body)?;
                match packet.kind {
                    SocketPacketKind::Connect => {
                        let socket_id = packet.sid().unwrap_or(open.sid.as_str()).to_owned();
                        return Ok((ws, open, socket_id));
                    }
                    SocketPacketKind::ConnectError => {
                        let message = packet.error_message().unwrap_or("namespace connect rejected");
                        return Err(ConnectionError::Refused(message.to_owned()));
                    }
                    _ => tracing::debug!(?packet, "ignoring packet before namespace connect"),
                }
            }
            EnginePacket::Close => return Err(ConnectionError::Closed),
            _ => {}
        }
    }
}

async fn pump(
    ws: &mut WsStream,
    open: &OpenPayload,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    pending: &mut PendingEmits,
    recorder: &StatusRecorder,
) -> SessionEnd {
    while let Some((name, args)) = pending.pop_front() {
        let packet = EnginePacket::socket(&SocketPacket::event(&name, args.clone()));
        if let Err(e) = send_packet(ws, &packet).await {
            tracing::warn!(error = %e, event = %name, "failed to flush queued emit");
            pending.push_front((name, args));
            return SessionEnd::Lost("transport error");
        }
    }

    let heartbeat = Duration::from_millis(open.ping_interval.saturating_add(open.ping_timeout));
    let deadline = tokio::time::sleep(heartbeat);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            () = &mut deadline => return SessionEnd::Lost("ping timeout"),
            command = commands.recv() => match command {
                Some(Command::Emit { name, args }) => {
                    let packet = EnginePacket::socket(&SocketPacket::event(&name, args.clone()));
                    if let Err(e) = send_packet(ws, &packet).await {
                        tracing::warn!(error = %e, event = %name, "emit failed; queued for reconnect");
                        enqueue(pending, name, args, PENDING_EMIT_CAPACITY);
                        return SessionEnd::Lost("transport error");
                    }
                }
                Some(Command::Close) | None => {
                    let _ = send_packet(ws, &EnginePacket::socket(&SocketPacket::disconnect())).await;
                    let _ = send_packet(ws, &EnginePacket::Close).await;
                    let _ = ws.close(None).await;
                    return SessionEnd::ClientClosed;
                }
            },
            message = ws.next() => {
                let text = match message {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => return SessionEnd::Lost("transport close"),
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "realtime websocket error");
                        return SessionEnd::Lost("transport error");
                    }
                };
                let packet = match EnginePacket::decode(text.as_str()) {
                    Ok(packet) => packet,
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping undecodable engine packet");
                        continue;
                    }
                };
                match packet {
                    EnginePacket::Ping(probe) => {
                        deadline.as_mut().reset(Instant::now() + heartbeat);
                        if send_packet(ws, &EnginePacket::Pong(probe)).await.is_err() {
                            return SessionEnd::Lost("transport error");
                        }
                    }
                    EnginePacket::Message(body) => {
                        if let Some(end) = handle_socket_packet(&body, recorder) {
                            return end;
                        }
                    }
                    EnginePacket::Close => return SessionEnd::Lost("transport close"),
                    _ => {}
                }
            }
        }
    }
}

fn handle_socket_packet(body: &str, recorder: &StatusRecorder) -> Option<SessionEnd> {
    let packet = match SocketPacket::decode(body) {
        Ok(packet) => packet,
        Err(e) => {
            tracing::warn!(error = %e, "dropping undecodable socket packet");
            return None;
        }
    };
    match packet.kind {
        SocketPacketKind::Event => {
            if let Some((name, args)) = packet.event_parts() {
                recorder.apply(TransportEvent::Event {
                    name: name.to_owned(),
                    args: args.to_vec(),
                });
            }
            None
        }
        SocketPacketKind::Disconnect => Some(SessionEnd::ServerDisconnect),
        SocketPacketKind::Ack | SocketPacketKind::Connect | SocketPacketKind::ConnectError => {
            tracing::debug!(?packet, "ignoring socket packet");
            None
        }
    }
}

/// Wait out a reconnect delay while still queueing emits. Returns `false` if
/// the handle closed or was dropped meanwhile.
async fn collect_commands_during_delay(
    delay: Duration,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    pending: &mut PendingEmits,
) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            () = &mut sleep => return true,
            command = commands.recv() => match command {
                Some(Command::Emit { name, args }) => enqueue(pending, name, args, PENDING_EMIT_CAPACITY),
                Some(Command::Close) | None => return false,
            },
        }
    }
}

/// Queue an emit for the next connection, dropping the oldest past `capacity`.
fn enqueue(pending: &mut PendingEmits, name: String, args: Vec<Value>, capacity: usize) {
    if capacity == 0 {
        return;
    }
    while pending.len() >= capacity {
        if let Some((dropped, _)) = pending.pop_front() {
            tracing::warn!(event = %dropped, "pending emit queue full; dropping oldest");
        }
    }
    pending.push_back((name, args));
}

async fn recv_packet(ws: &mut WsStream) -> Result<EnginePacket, ConnectionError> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => return Ok(EnginePacket::decode(text.as_str())?),
            Some(Ok(Message::Close(_))) | None => return Err(ConnectionError::Closed),
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

async fn send_packet(ws: &mut WsStream, packet: &EnginePacket) -> Result<(), ConnectionError> {
    ws.send(Message::text(packet.encode())).await?;
    Ok(())
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;
