//! Websocket front door.
//!
//! One persistent connection per miner, upgraded at `/ws`. The socket is
//! split: a writer task drains the client's outbound channel, while the
//! read loop feeds frames into the service and enforces the keepalive
//! policy. A `/metrics` route exposes the Prometheus registry.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use prometheus::{Encoder, TextEncoder};
use tokio::sync::mpsc;
use tokio::time::{interval, Instant};
use tracing::{debug, info, warn};

use crate::service::PowService;
use crate::NodeError;

/// The faucet's websocket server.
pub struct PowServer {
    port: u16,
    service: Arc<PowService>,
}

impl PowServer {
    pub fn new(port: u16, service: Arc<PowService>) -> Self {
        Self { port, service }
    }

    /// Start listening. Runs until the process shuts down.
    pub async fn run(&self) -> Result<(), NodeError> {
        let app = Router::new()
            .route("/ws", get(ws_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(self.service.clone());

        let addr = format!("0.0.0.0:{}", self.port);
        info!("faucet listening on {addr}");
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| NodeError::Server(e.to_string()))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| NodeError::Server(e.to_string()))?;
        Ok(())
    }
}

/// Upgrade an HTTP request to a websocket connection.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(service): State<Arc<PowService>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, service))
}

/// Prometheus text exposition of the service registry.
async fn metrics_handler(State(service): State<Arc<PowService>>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let families = service.metrics().registry.gather();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buf) {
        warn!(error = %e, "metrics encoding failed");
    }
    buf
}

/// Drive one connection to completion.
///
/// The flow:
/// 1. Split the socket; a writer task drains the outbound channel.
/// 2. Register the client with the service (which pushes the config blob).
/// 3. Read frames, feed them to the service, ping on an interval, and
///    drop the connection when it goes quiet past the ping timeout.
/// 4. On exit, unregister: the bound session is stamped idle, not closed.
async fn handle_socket(socket: WebSocket, service: Arc<PowService>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let ping_tx = tx.clone();
    let client = service.connect(tx);

    let ping_interval = Duration::from_secs(service.config().pow.ping_interval_secs);
    let ping_timeout = Duration::from_secs(service.config().pow.ping_timeout_secs);
    let mut keepalive = interval(ping_interval);
    keepalive.tick().await; // immediate first tick
    let mut last_activity = Instant::now();

    loop {
        tokio::select! {
            msg = ws_receiver.next() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        warn!(%client, error = %e, "websocket receive error");
                        break;
                    }
                    None => break,
                };
                last_activity = Instant::now();
                match msg {
                    Message::Text(text) => service.handle_frame(client, &text),
                    Message::Close(_) => {
                        debug!(%client, "client sent close frame");
                        break;
                    }
                    // axum answers pings itself; pongs only refresh activity
                    Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => {}
                }
            }
            _ = keepalive.tick() => {
                if last_activity.elapsed() > ping_timeout {
                    warn!(%client, "keepalive timeout, dropping connection");
                    break;
                }
                let _ = ping_tx.send(Message::Ping(Vec::new()));
            }
        }
    }

    service.disconnect(client);
    writer.abort();
    debug!(%client, "connection closed");
}
