//! Scripted Socket.IO endpoint for transport tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const OPEN_PACKET: &str = r#"0{"sid":"eio-1","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;
/// Advertises a 100 ms heartbeat window that the server never honours.
const SHORT_HEARTBEAT_OPEN_PACKET: &str =
    r#"0{"sid":"eio-1","upgrades":[],"pingInterval":50,"pingTimeout":50,"maxPayload":1000000}"#;
const SOCKET_ID: &str = "sock-1";

/// What the server does once the client asks to join the default namespace.
#[derive(Clone, Debug)]
pub(crate) enum Script {
    /// Ack the connect, then push these raw packets.
    Accept(Vec<&'static str>),
    /// Answer with `44{"message": ...}`.
    Refuse(&'static str),
    /// Ack, then send a namespace disconnect after the first client packet.
    KickOnFirstPacket,
    /// Ack, then drop the socket without a close frame.
    DropAfterConnect,
    /// Drop the first connection right after the ack; accept later ones.
    DropFirstConnection,
    /// Ack with a short heartbeat window and never ping.
    SilentHeartbeat,
}

#[derive(Clone)]
struct ServerState {
    script: Script,
    received: mpsc::UnboundedSender<String>,
    connections: Arc<AtomicUsize>,
}

pub(crate) struct SocketServer {
    pub url: String,
    /// Every text packet the client sent after the namespace connect.
    pub received: mpsc::UnboundedReceiver<String>,
    connections: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl SocketServer {
    pub(crate) fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Drop for SocketServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn upgrade(ws: WebSocketUpgrade, State(state): State<ServerState>) -> Response {
    ws.on_upgrade(move |socket| serve(socket, state))
}

async fn send(socket: &mut WebSocket, text: &str) -> bool {
    socket.send(Message::Text(text.into())).await.is_ok()
}

async fn serve(mut socket: WebSocket, state: ServerState) {
    let index = state.connections.fetch_add(1, Ordering::SeqCst);
    let open = match state.script {
        Script::SilentHeartbeat => SHORT_HEARTBEAT_OPEN_PACKET,
        _ => OPEN_PACKET,
    };
    if !send(&mut socket, open).await {
        return;
    }

    loop {
        match socket.recv().await {
            Some(Ok(Message::Text(text))) if text.as_str() == "40" => break,
            Some(Ok(_)) => {}
            _ => return,
        }
    }

    let connect_ack = format!(r#"40{{"sid":"{SOCKET_ID}"}}"#);
    match &state.script {
        Script::Refuse(message) => {
            let _ = send(&mut socket, &format!(r#"44{{"message":"{message}"}}"#)).await;
            while let Some(Ok(_)) = socket.recv().await {}
            return;
        }
        Script::Accept(packets) => {
            if !send(&mut socket, &connect_ack).await {
                return;
            }
            for packet in packets {
                if !send(&mut socket, packet).await {
                    return;
                }
            }
        }
        Script::KickOnFirstPacket | Script::SilentHeartbeat => {
            if !send(&mut socket, &connect_ack).await {
                return;
            }
        }
        Script::DropAfterConnect => {
            let _ = send(&mut socket, &connect_ack).await;
            return;
        }
        Script::DropFirstConnection => {
            let sent = send(&mut socket, &connect_ack).await;
            if !sent || index == 0 {
                return;
            }
        }
    }

    while let Some(Ok(message)) = socket.recv().await {
        if let Message::Text(text) = message {
            let _ = state.received.send(text.as_str().to_owned());
            if matches!(state.script, Script::KickOnFirstPacket) {
                let _ = send(&mut socket, "41").await;
            }
        }
    }
}

pub(crate) async fn spawn_socket_server(script: Script) -> SocketServer {
    let (tx, rx) = mpsc::unbounded_channel();
    let connections = Arc::new(AtomicUsize::new(0));
    let state = ServerState {
        script,
        received: tx,
        connections: Arc::clone(&connections),
    };
    let app = Router::new().route("/socket.io/", get(upgrade)).with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("test listener should bind");
    let addr = listener.local_addr().expect("listener should have an address");
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    SocketServer {
        url: format!("http://{addr}"),
        received: rx,
        connections,
        handle,
    }
}
