//! Echo server with heartbeat.
//!
//! Accepts WebSocket upgrades on `/ws`, then for each client writes a
//! heartbeat every second and echoes every message back.
//!
//! Usage: `cargo run --example echo_server [ADDR]` (default `0.0.0.0:7777`)
//!
//! Try it with `websocat ws://127.0.0.1:7777/ws`.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use wsconn::handler::serve;
use wsconn::{Connection, Heartbeat, WsTransport};

// ============================================================================
// Configuration
// ============================================================================

const DEFAULT_ADDR: &str = "0.0.0.0:7777";
const WS_PATH: &str = "/ws";

/// Listener settings, passed explicitly to the accept loop.
#[derive(Debug, Clone)]
struct ServerConfig {
    addr: SocketAddr,
    heartbeat: Heartbeat,
}

impl ServerConfig {
    fn from_args() -> Result<Self> {
        let addr = std::env::args()
            .nth(1)
            .unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr
            .parse()
            .with_context(|| format!("invalid listen address: {addr}"))?;

        Ok(Self {
            addr,
            heartbeat: Heartbeat::default(),
        })
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,wsconn=debug")),
        )
        .init();

    let config = ServerConfig::from_args()?;
    let listener = TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    info!(addr = %listener.local_addr()?, path = WS_PATH, "Echo server listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let heartbeat = config.heartbeat.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, heartbeat).await {
                warn!(%peer, error = %e, "Client failed");
            }
        });
    }
}

// ============================================================================
// Per-client handling
// ============================================================================

async fn handle_client(stream: TcpStream, heartbeat: Heartbeat) -> Result<()> {
    // Any origin is accepted.
    let ws_stream = tokio_tungstenite::accept_hdr_async(stream, route)
        .await
        .context("WebSocket upgrade failed")?;

    let connection = Connection::new(WsTransport::new(ws_stream))?;
    debug!(conn_id = %connection.id(), "Client connected");

    serve(connection, heartbeat).await;
    Ok(())
}

fn route(request: &Request, response: Response) -> std::result::Result<Response, ErrorResponse> {
    if request.uri().path() == WS_PATH {
        return Ok(response);
    }

    let mut rejection = ErrorResponse::new(Some("not found".to_string()));
    *rejection.status_mut() = StatusCode::NOT_FOUND;
    Err(rejection)
}
