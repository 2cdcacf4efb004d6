// crates/backplane-rs-monitor/src/lib.rs

mod model;
mod server;

pub use model::{DeviceInfo, DiagnosticSnapshot};

#[cfg(feature = "in-process")]
use crossbeam_channel::Receiver;
#[cfg(feature = "in-process")]
use log::info;
#[cfg(feature = "in-process")]
use std::net::SocketAddr;

/// Number of snapshots buffered per WebSocket client.
#[cfg(feature = "in-process")]
const SNAPSHOT_BUFFER: usize = 16;

/// Starts the web monitor in "in-process" mode.
///
/// This function is intended to be run in a dedicated, non-real-time thread
/// inside a tokio runtime. The bridge thread captures a `DiagnosticSnapshot`
/// after its cycles and `try_send`s it into a bounded crossbeam channel, so
/// it never blocks on the monitor.
///
/// * `receiver`: The channel to receive `DiagnosticSnapshot` updates from
///   the bridge thread.
/// * `addr`: Address to serve the monitor on.
///
/// Returns once the server stops, or with the bind error.
#[cfg(feature = "in-process")]
pub async fn start_in_process_monitor(
    receiver: Receiver<DiagnosticSnapshot>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let state = server::AppState::new(SNAPSHOT_BUFFER);
    spawn_forwarder(receiver, state.clone());
    server::start_web_server(addr, state).await?;
    Ok(())
}

/// Publishes every snapshot arriving on `receiver` into `state`.
///
/// Crossbeam's recv blocks, so it gets its own blocking thread feeding
/// the async side through a tokio channel. The returned task ends once
/// the bridge drops its sender.
#[cfg(feature = "in-process")]
fn spawn_forwarder(
    receiver: Receiver<DiagnosticSnapshot>,
    state: server::AppState,
) -> tokio::task::JoinHandle<()> {
    let (forward_tx, mut forward_rx) = tokio::sync::mpsc::channel(SNAPSHOT_BUFFER);
    tokio::task::spawn_blocking(move || {
        while let Ok(snapshot) = receiver.recv() {
            if forward_tx.blocking_send(snapshot).is_err() {
                break;
            }
        }
        info!("Snapshot channel closed, monitor forwarding stopped.");
    });

    tokio::spawn(async move {
        while let Some(snapshot) = forward_rx.recv().await {
            state.publish(snapshot).await;
        }
    })
}

#[cfg(all(test, feature = "in-process"))]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::StatusCode;

    fn snapshot(aggregate_errors: u16) -> DiagnosticSnapshot {
        DiagnosticSnapshot {
            bridge_state: "Running".into(),
            scan_state: "EndOfConfig".into(),
            status: 1,
            status_flags: vec!["running"],
            aggregate_errors,
            devices: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_bridge_snapshots_reach_http_api() {
        let state = server::AppState::new(SNAPSHOT_BUFFER);
        let mut ws_rx = state.snapshot_tx.subscribe();
        let (tx, rx) = crossbeam_channel::bounded(4);
        let forwarder = spawn_forwarder(rx, state.clone());

        let response = server::snapshot_handler(State(state.clone())).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        tx.try_send(snapshot(1)).unwrap();
        tx.try_send(snapshot(2)).unwrap();
        assert_eq!(ws_rx.recv().await.unwrap().aggregate_errors, 1);
        assert_eq!(ws_rx.recv().await.unwrap().aggregate_errors, 2);

        // Dropping the bridge side ends the forwarding task.
        drop(tx);
        forwarder.await.unwrap();

        assert_eq!(state.latest.read().await.as_ref().unwrap().aggregate_errors, 2);
        let response = server::snapshot_handler(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
