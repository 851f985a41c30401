//! Message transport layer.
//!
//! A [`Transport`] is one established, full-duplex, message-oriented socket.
//! It is not expected to tolerate concurrent use of the same direction:
//! [`Connection`](crate::Connection) guarantees that reads only ever come from
//! its inbound pump and writes only from its outbound pump.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   write_message   ┌─────────────────┐    ┌──────────────┐
//! │  Connection  │──► outbound ────► │  outbound pump  │──► │              │
//! │              │     queue         └─────────────────┘    │  Transport   │
//! │  (any task)  │                   ┌─────────────────┐    │              │
//! │              │◄── inbound ◄───── │  inbound pump   │◄── │              │
//! └──────────────┘     queue         └─────────────────┘    └──────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `websocket` | Adapter over a `tokio-tungstenite` WebSocket stream |
//! | `memory` | In-process linked transport pair |

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// In-process transport pair.
pub mod memory;

/// WebSocket transport over `tokio-tungstenite`.
pub mod websocket;

#[cfg(test)]
pub(crate) mod mock;

// ============================================================================
// Re-exports
// ============================================================================

pub use memory::MemoryTransport;
pub use websocket::WsTransport;

// ============================================================================
// MessageKind
// ============================================================================

/// Kind tag attached to every outgoing message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// UTF-8 text message.
    #[default]
    Text,
    /// Binary message.
    Binary,
}

// ============================================================================
// Transport
// ============================================================================

/// An established duplex connection exchanging discrete byte messages.
///
/// # Contract
///
/// - `read_message` blocks until one whole message is available.
/// - `write_message` sends one whole message.
/// - `close` is idempotent. It may be called any number of times, from any
///   task, including while a read or write is in flight, and must make that
///   in-flight operation fail promptly.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Reads one whole message.
    ///
    /// # Errors
    ///
    /// Returns an error on peer disconnect, I/O failure, or after `close`.
    async fn read_message(&self) -> Result<Vec<u8>>;

    /// Writes one whole message tagged with `kind`.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure or after `close`.
    async fn write_message(&self, kind: MessageKind, data: Vec<u8>) -> Result<()>;

    /// Closes the transport.
    ///
    /// # Errors
    ///
    /// Only the first call may report an error; later calls return `Ok`.
    async fn close(&self) -> Result<()>;
}

// ============================================================================
// Tests
// ============================================================================
