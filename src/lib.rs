//! wsconn - Thread-safe WebSocket connections.
//!
//! A WebSocket (or any message-oriented duplex socket) cannot be read and
//! written from several tasks at once, and can be torn down from several
//! directions at once: the peer hangs up, an I/O error occurs, or the
//! application closes it. This crate wraps such a socket in a [`Connection`]
//! that any number of tasks can use concurrently, with a single race-free
//! shutdown.
//!
//! # Architecture
//!
//! - **[`Connection`]**: the handle applications use. Cloneable, `Send + Sync`.
//! - **Inbound pump**: task reading the transport into a bounded queue.
//! - **Outbound pump**: task draining a bounded queue onto the transport.
//! - **Close signal**: fires once; every blocking operation races against it.
//!
//! Transport failures never reach callers directly. They close the
//! connection, and callers observe [`Error::ConnectionClosed`].
//!
//! # Quick Start
//!
//! ```no_run
//! use tokio::net::TcpListener;
//! use wsconn::{Connection, Result, WsTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let listener = TcpListener::bind("127.0.0.1:7777").await?;
//!     let (stream, _) = listener.accept().await?;
//!     let ws_stream = tokio_tungstenite::accept_async(stream).await?;
//!
//!     let conn = Connection::new(WsTransport::new(ws_stream))?;
//!     while let Ok(data) = conn.read_message().await {
//!         conn.write_message(data).await?;
//!     }
//!     conn.close().await;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`connection`] | [`Connection`] and its configuration |
//! | [`transport`] | [`Transport`] trait and built-in transports |
//! | [`handler`] | Heartbeat and echo handlers |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | [`ConnectionId`] |

// ============================================================================
// Modules
// ============================================================================

/// Thread-safe connection over a transport.
pub mod connection;

/// Error types and result aliases.
pub mod error;

/// Heartbeat and echo handlers built on [`Connection`].
pub mod handler;

/// Type-safe identifiers.
pub mod identifiers;

/// Message transports.
pub mod transport;

mod signal;

// ============================================================================
// Re-exports
// ============================================================================

// Connection types
pub use connection::{Connection, ConnectionConfig};

// Error types
pub use error::{Error, Result};

// Handler types
pub use handler::Heartbeat;

// Identifier types
pub use identifiers::ConnectionId;

// Transport types
pub use transport::{MemoryTransport, MessageKind, Transport, WsTransport};
