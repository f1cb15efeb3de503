//! WebSocket server: accept loop and per-session task management.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured host and port.
//! 2. Accepting incoming TCP connections and upgrading each one to a
//!    WebSocket session.
//! 3. Registering every session with the [`ClientSet`] so it receives
//!    `connected`, `disconnected` and controller output envelopes.
//! 4. Running two concurrent tasks per session:
//!    - **Queue → Client**: drains the session's outgoing queue into the
//!      WebSocket as text frames.
//!    - **Client → Controllers**: hands every text frame to the
//!      [`InboundRouter`].
//! 5. Stopping the accept loop when the `running` flag is cleared.
//!
//! # Why a queue per session?
//!
//! Broadcasts come from relay tasks.  If a relay wrote straight into every
//! socket, one slow browser would hold up controller output for everybody.
//! With a bounded queue per session, a broadcast only enqueues; each session
//! writes at its own pace and drops messages when it falls too far behind.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_async,
    tungstenite::{Error as WsError, Message as WsMessage},
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::{ClientSet, InboundRouter};
use crate::domain::BridgeConfig;

/// How long one `accept()` may wait before the shutdown flag is rechecked.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

/// Everything a session needs, shared by all sessions.
#[derive(Clone)]
pub struct SessionContext {
    pub clients: Arc<ClientSet>,
    pub router: InboundRouter,
    /// Capacity of each session's outgoing queue.
    pub queue_capacity: usize,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds the configured address and serves sessions until `running` is
/// cleared.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot be bound (e.g., the port is
/// already in use or the host name does not resolve).
pub async fn run_server(
    config: &BridgeConfig,
    ctx: SessionContext,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let bind_addr = config.ws_bind_addr();
    let listener = TcpListener::bind((config.ws_host.as_str(), config.ws_port))
        .await
        .with_context(|| format!("failed to bind WebSocket listener on {bind_addr}"))?;

    info!("WebSocket server listening on ws://{bind_addr}");
    serve(listener, ctx, running).await;
    Ok(())
}

/// Accept loop over an already bound listener.
///
/// Each accepted connection gets its own Tokio task so that one slow client
/// never blocks others.  Tests bind `127.0.0.1:0` themselves and call this
/// directly.
pub async fn serve(listener: TcpListener, ctx: SessionContext, running: Arc<AtomicBool>) {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // A short timeout on `accept()` lets the loop notice the shutdown
        // flag even when nobody is connecting.
        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    handle_session(stream, peer_addr, ctx).await;
                });
            }
            Ok(Err(e)) => {
                // Transient (e.g., too many open file descriptors).
                error!("accept error: {e}");
            }
            Err(_) => {}
        }
    }
}

// ── Per-session handler ───────────────────────────────────────────────────────

/// Wraps [`run_session`] and logs the outcome.
async fn handle_session(raw_stream: TcpStream, peer_addr: SocketAddr, ctx: SessionContext) {
    match run_session(raw_stream, peer_addr, ctx).await {
        Ok(()) => info!("client {peer_addr} disconnected"),
        Err(e) => warn!("client {peer_addr} dropped: {e:#}"),
    }
}

/// Runs the complete lifecycle of one WebSocket client.
///
/// # Errors
///
/// Returns an error if the WebSocket handshake fails.
async fn run_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    ctx: SessionContext,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(raw_stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    let client_id = Uuid::new_v4();
    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let (queue_tx, mut queue_rx) = mpsc::channel::<Arc<str>>(ctx.queue_capacity);

    ctx.clients.register(client_id, queue_tx).await;
    info!("client {peer_addr} connected ({client_id})");

    // ── Task A: queue → client ────────────────────────────────────────────────
    let mut writer_task = tokio::spawn(async move {
        while let Some(text) = queue_rx.recv().await {
            if let Err(e) = ws_tx.send(WsMessage::Text(text.to_string())).await {
                debug!("client {peer_addr}: send failed: {e}");
                break;
            }
        }
        // Best effort; the peer may already be gone.
        let _ = ws_tx.close().await;
    });

    // ── Task B: client → controllers ──────────────────────────────────────────
    let router = ctx.router.clone();
    let mut reader_task = tokio::spawn(async move {
        loop {
            let ws_msg = match ws_rx.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(WsError::ConnectionClosed | WsError::Protocol(_))) => {
                    debug!("client {peer_addr}: connection closed");
                    break;
                }
                Some(Err(e)) => {
                    warn!("client {peer_addr}: WebSocket error: {e}");
                    break;
                }
                None => break,
            };

            match ws_msg {
                WsMessage::Text(text) => {
                    // Awaited in order, so one client's messages reach a
                    // controller in the order they were sent.
                    router.route(&text).await;
                }
                WsMessage::Binary(_) => {
                    debug!("client {peer_addr}: binary frame ignored");
                }
                // tungstenite answers pings itself on the next write/flush.
                WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => {}
                WsMessage::Close(_) => {
                    debug!("client {peer_addr}: Close frame received");
                    break;
                }
            }
        }
    });

    // The session is over as soon as either side stops.
    tokio::select! {
        _ = &mut reader_task => writer_task.abort(),
        _ = &mut writer_task => reader_task.abort(),
    }

    ctx.clients.unregister(&client_id).await;
    Ok(())
}
