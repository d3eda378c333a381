//! RFB listener: accept loop and per-viewer task management.
//!
//! Each accepted connection runs in its own Tokio task, so one slow viewer
//! never blocks the others.  The loop wakes every 200 ms to check the
//! shared `running` flag, which `main.rs` clears on Ctrl+C.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{error, info, warn};

use super::session::run_session;
use crate::application::remote_display::RemoteDisplayServer;

/// How often the accept loop re-checks the `running` flag.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

/// Binds the RFB listener.
///
/// # Errors
///
/// Returns an error if the address is already in use or not permitted.
pub async fn bind_listener(addr: &str) -> anyhow::Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind RFB listener on {addr}"))?;
    info!("RFB server listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Accepts viewers on `listener` until `running` is set to `false`.
///
/// # Errors
///
/// Currently always `Ok`; accept errors are logged and the loop continues.
pub async fn serve(listener: TcpListener, display: Arc<RemoteDisplayServer>, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok((stream, peer))) => {
                info!("new viewer connection from {peer}");
                let display = Arc::clone(&display);
                tokio::spawn(async move {
                    handle_viewer(stream, peer, display).await;
                });
            }
            Ok(Err(e)) => error!("accept error: {e}"),
            Err(_) => {}
        }
    }
    Ok(())
}

async fn handle_viewer(stream: TcpStream, peer: SocketAddr, display: Arc<RemoteDisplayServer>) {
    if let Err(e) = stream.set_nodelay(true) {
        warn!("session {peer}: could not disable Nagle: {e}");
    }
    match run_session(stream, display).await {
        Ok(()) => info!("session {peer} closed normally"),
        Err(e) => warn!("session {peer} closed with error: {e:#}"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
