// src/sync/server.rs

//! Dashboard transport: one TCP listener serving both the bundled UI assets
//! and the `/ws` sync endpoint.
//!
//! Every connection is peeked first: a request line starting `GET /ws `
//! goes through the WebSocket handshake and becomes a sync session, anything
//! else is answered as a one-shot asset request. Sessions are independent —
//! a write failure drops that session only, and a slow session lags on the
//! broadcast channel and catches up with a fresh snapshot.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::settings::model::ConfigDocument;
use crate::sync::assets;
use crate::sync::hub::{ErrorNotice, Hub};

/// Serve the dashboard until the process exits.
pub async fn serve(hub: Arc<Hub>, addr: String) -> Result<()> {
    serve_with_ready(hub, addr, None).await
}

/// Serve the dashboard and report the bound address once listening (used by
/// tests binding port 0).
pub async fn serve_with_ready(
    hub: Arc<Hub>,
    addr: String,
    ready: Option<oneshot::Sender<SocketAddr>>,
) -> Result<()> {
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding dashboard listener on {addr}"))?;
    let local_addr = listener
        .local_addr()
        .context("determining dashboard listener address")?;

    if let Some(tx) = ready {
        let _ = tx.send(local_addr);
    }
    info!(addr = %local_addr, "dashboard listening (assets + /ws on one port)");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(err) => {
                warn!(error = %err, "accept error");
                continue;
            }
        };
        debug!(peer = %peer, "new dashboard connection");

        let hub = Arc::clone(&hub);
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, hub).await {
                debug!(peer = %peer, error = %err, "dashboard connection ended with error");
            }
        });
    }
}

async fn handle_connection(stream: TcpStream, hub: Arc<Hub>) -> Result<()> {
    // Peek the request line prefix to split WebSocket upgrades from plain
    // asset requests; both arrive on the same port.
    let mut peek_buf = [0u8; 8];
    let n = stream.peek(&mut peek_buf).await.unwrap_or(0);
    if n >= 8 && &peek_buf[..8] == b"GET /ws " {
        return run_session(stream, hub).await;
    }
    serve_asset(stream).await
}

/// Answer a single HTTP GET with a bundled asset (404 otherwise).
async fn serve_asset(mut stream: TcpStream) -> Result<()> {
    let mut req_buf = vec![0u8; 2048];
    let n = stream.read(&mut req_buf).await.unwrap_or(0);
    let request = String::from_utf8_lossy(&req_buf[..n]);

    let path = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/");

    let response = match assets::lookup(path) {
        Some(asset) => {
            let mut head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                asset.content_type,
                asset.body.len()
            )
            .into_bytes();
            head.extend_from_slice(asset.body);
            head
        }
        None => {
            debug!(path, "asset not found");
            b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec()
        }
    };

    stream.write_all(&response).await?;
    Ok(())
}

/// One sync session: snapshot on connect, snapshot on every state change,
/// inbound whole-document replacements routed to the orchestrator.
async fn run_session(stream: TcpStream, hub: Arc<Hub>) -> Result<()> {
    let ws = accept_async(stream).await.context("websocket handshake")?;
    let (mut sink, mut stream) = ws.split();

    // The connect-time snapshot: the client renders from this immediately.
    sink.send(Message::Text(hub.snapshot_json())).await?;

    let mut sync_rx = hub.subscribe();

    loop {
        tokio::select! {
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_edit(&hub, &text, &mut sink).await?;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        debug!(error = %err, "session receive error");
                        break;
                    }
                    _ => {}
                }
            }
            event = sync_rx.recv() => {
                use tokio::sync::broadcast::error::RecvError;
                match event {
                    Ok(()) => {}
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(skipped)) => {
                        // Snapshots are whole-state; the fresh one below
                        // already contains everything the skipped events
                        // pointed at.
                        debug!(skipped, "session lagged behind broadcasts");
                    }
                }
                if sink.send(Message::Text(hub.snapshot_json())).await.is_err() {
                    // Write failure unregisters this session only.
                    break;
                }
            }
        }
    }

    Ok(())
}

async fn handle_edit<S>(hub: &Hub, text: &str, sink: &mut S) -> Result<()>
where
    S: futures_util::Sink<Message> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    let outcome = match serde_json::from_str::<ConfigDocument>(text) {
        Ok(document) => hub.submit_edit(document).await,
        Err(err) => Err(crate::errors::DevloopError::Config(format!(
            "malformed configuration document: {err}"
        ))),
    };

    if let Err(err) = outcome {
        warn!(error = %err, "configuration edit rejected");
        sink.send(Message::Text(ErrorNotice::from_error(&err).to_json()))
            .await
            .context("sending error notice")?;
    }

    Ok(())
}
