//! Implements the core web server and WebSocket logic using axum.

use crate::model::DiagnosticSnapshot;
use axum::{
    Json, Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use log::{error, info, trace};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

/// The shared application state.
#[derive(Clone)]
pub(super) struct AppState {
    /// Sender for broadcasting diagnostic snapshots to all connected clients.
    pub(super) snapshot_tx: broadcast::Sender<DiagnosticSnapshot>,
    /// The most recent snapshot, served by `/api/snapshot`.
    pub(super) latest: Arc<RwLock<Option<DiagnosticSnapshot>>>,
}

impl AppState {
    pub(super) fn new(capacity: usize) -> Self {
        let (snapshot_tx, _) = broadcast::channel(capacity);
        Self {
            snapshot_tx,
            latest: Arc::new(RwLock::new(None)),
        }
    }

    /// Stores `snapshot` as the latest one and pushes it to every client.
    pub(super) async fn publish(&self, snapshot: DiagnosticSnapshot) {
        *self.latest.write().await = Some(snapshot.clone());
        // No subscribers is not an error.
        let _ = self.snapshot_tx.send(snapshot);
    }
}

pub(super) fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/api/snapshot", get(snapshot_handler))
        .route("/ws", get(websocket_handler))
        .with_state(state)
}

/// Binds to `addr` and serves until the server fails.
pub(super) async fn start_web_server(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind web server to {}: {}", addr, e);
        e
    })?;
    info!("Web monitor listening on http://{}", addr);
    axum::serve(listener, router(state)).await.map_err(|e| {
        error!("Web server encountered an error: {}", e);
        e
    })
}

/// Serves the embedded monitor page.
async fn root_handler() -> impl IntoResponse {
    Html(include_str!("web/monitor.html"))
}

/// Returns the latest snapshot, or 503 before the bridge published one.
pub(super) async fn snapshot_handler(State(state): State<AppState>) -> Response {
    match state.latest.read().await.clone() {
        Some(snapshot) => Json(snapshot).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "no snapshot yet").into_response(),
    }
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Pushes every broadcast snapshot to one client as JSON.
async fn handle_socket(mut socket: WebSocket, state: AppState) {
    info!("New WebSocket client connected.");
    let mut snapshot_rx = state.snapshot_tx.subscribe();

    // Start the client off with the current picture.
    let initial = state.latest.read().await.clone();
    if let Some(snapshot) = initial {
        if !send_snapshot(&mut socket, &snapshot).await {
            return;
        }
    }

    loop {
        tokio::select! {
            received = snapshot_rx.recv() => match received {
                Ok(snapshot) => {
                    trace!("Sending snapshot to WebSocket client.");
                    if !send_snapshot(&mut socket, &snapshot).await {
                        info!("WebSocket client disconnected (send error).");
                        break;
                    }
                }
                // A slow client skips snapshots instead of stalling the others.
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    trace!("WebSocket client lagged, {} snapshots skipped.", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            Some(Ok(msg)) = socket.recv() => {
                if let Message::Close(_) = msg {
                    info!("WebSocket client disconnected (received close message).");
                    break;
                }
            }
            else => {
                info!("WebSocket client disconnected (channel closed).");
                break;
            }
        }
    }
}

/// Returns false once the client is gone.
async fn send_snapshot(socket: &mut WebSocket, snapshot: &DiagnosticSnapshot) -> bool {
    match serde_json::to_string(snapshot) {
        Ok(json_payload) => socket
            .send(Message::Text(json_payload.into()))
            .await
            .is_ok(),
        Err(e) => {
            error!("Failed to serialize snapshot to JSON: {}", e);
            true
        }
    }
}
