//! Thread-safe connection over a [`Transport`].
//!
//! A [`Connection`] hides a transport that cannot be used concurrently behind
//! two bounded queues and two background pumps. Callers only ever touch the
//! queues; the pumps are the only code that touches the transport.
//!
//! # Shutdown
//!
//! Teardown can start from the inbound pump (read error), the outbound pump
//! (write error), the application ([`Connection::close`]) or the last handle
//! being dropped. All paths meet in one close protocol:
//!
//! 1. Close the transport. Always issued; transports are idempotent.
//! 2. Fire the close signal under its lock, at most once.
//!
//! Every suspension point in the connection races against the close signal,
//! so nothing blocks past teardown.
//!
//! # Example
//!
//! ```ignore
//! use wsconn::{Connection, WsTransport};
//!
//! let conn = Connection::new(WsTransport::new(ws_stream))?;
//!
//! while let Ok(data) = conn.read_message().await {
//!     conn.write_message(data).await?;
//! }
//! conn.close().await;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{Error, Result, duration_ms};
use crate::identifiers::ConnectionId;
use crate::signal::CloseSignal;
use crate::transport::Transport;

// ============================================================================
// Submodules
// ============================================================================

/// Queue sizing and framing.
pub mod config;

mod pump;

pub use config::ConnectionConfig;

// ============================================================================
// Shared
// ============================================================================

/// State shared by every handle and both pumps.
struct Shared {
    /// Connection identifier for logs.
    id: ConnectionId,
    /// The transport; read only by the inbound pump, written only by the outbound pump.
    transport: Arc<dyn Transport>,
    /// Fires once when the connection is dead.
    signal: CloseSignal,
    /// Consumer side of the inbound queue, shared by concurrent readers.
    inbound: AsyncMutex<mpsc::Receiver<Vec<u8>>>,
    /// Producer side of the outbound queue.
    outbound: mpsc::Sender<Vec<u8>>,
    /// Settings the connection was created with.
    config: ConnectionConfig,
}

impl Shared {
    /// Runs the close protocol. Safe to call any number of times, concurrently.
    async fn close(&self) {
        if let Err(e) = self.transport.close().await {
            warn!(conn_id = %self.id, error = %e, "Transport close failed");
        }

        if self.signal.fire() {
            debug!(conn_id = %self.id, "Connection closed");
        }
    }
}

// ============================================================================
// HandleGuard
// ============================================================================

/// Fires the close signal when the last [`Connection`] handle is dropped.
///
/// The pumps then run their teardown, which closes the transport.
struct HandleGuard {
    shared: Arc<Shared>,
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        if self.shared.signal.fire() {
            debug!(conn_id = %self.shared.id, "Last handle dropped, shutting down");
        }
    }
}

// ============================================================================
// Connection
// ============================================================================

/// Thread-safe message connection.
///
/// # Thread Safety
///
/// `Connection` is `Send + Sync` and cheap to clone. Clones are handles to
/// the same connection; any number of tasks may read, write and close
/// concurrently.
///
/// # Ordering
///
/// Messages are read in the order the transport delivered them and written
/// in the order [`write_message`](Self::write_message) accepted them.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
    _guard: Arc<HandleGuard>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.shared.id)
            .field("closed", &self.shared.signal.is_fired())
            .field("config", &self.shared.config)
            .finish()
    }
}

// ============================================================================
// Connection - Constructor
// ============================================================================

impl Connection {
    /// Wraps an established transport with default settings.
    ///
    /// Starts both pumps and returns immediately.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if called outside a Tokio runtime.
    pub fn new(transport: impl Transport) -> Result<Self> {
        Self::with_config(transport, ConnectionConfig::default())
    }

    /// Wraps an established transport with custom settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid or if called
    /// outside a Tokio runtime.
    pub fn with_config(transport: impl Transport, config: ConnectionConfig) -> Result<Self> {
        config.validate()?;

        let runtime = Handle::try_current()
            .map_err(|_| Error::config("connection must be created inside a Tokio runtime"))?;

        let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_capacity);

        let shared = Arc::new(Shared {
            id: ConnectionId::generate(),
            transport: Arc::new(transport),
            signal: CloseSignal::new(),
            inbound: AsyncMutex::new(inbound_rx),
            outbound: outbound_tx,
            config,
        });

        runtime.spawn(pump::run_inbound(Arc::clone(&shared), inbound_tx));
        runtime.spawn(pump::run_outbound(Arc::clone(&shared), outbound_rx));

        debug!(
            conn_id = %shared.id,
            inbound_capacity = config.inbound_capacity,
            outbound_capacity = config.outbound_capacity,
            "Connection opened"
        );

        let guard = Arc::new(HandleGuard {
            shared: Arc::clone(&shared),
        });

        Ok(Self {
            shared,
            _guard: guard,
        })
    }
}

// ============================================================================
// Connection - Public API
// ============================================================================

impl Connection {
    /// Returns the connection identifier.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.shared.id
    }

    /// Returns the settings this connection was created with.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.shared.config
    }

    /// Returns `true` once the connection is closed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.signal.is_fired()
    }

    /// Waits until the connection is closed, for any reason.
    pub async fn closed(&self) {
        self.shared.signal.wait().await;
    }

    /// Reads the next message.
    ///
    /// Waits until a message is available or the connection closes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the connection is closed before
    /// or while waiting. No message is returned in that case.
    pub async fn read_message(&self) -> Result<Vec<u8>> {
        let shared = &self.shared;
        if shared.signal.is_fired() {
            return Err(Error::ConnectionClosed);
        }

        tokio::select! {
            biased;
            () = shared.signal.wait() => Err(Error::ConnectionClosed),
            message = async { shared.inbound.lock().await.recv().await } => {
                message.ok_or(Error::ConnectionClosed)
            }
        }
    }

    /// Queues a message for sending.
    ///
    /// Waits while the outbound queue is full. Success means the message is
    /// queued, not that it has reached the peer. Messages still queued when
    /// the connection closes are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the connection is closed before
    /// the message could be queued. The message is dropped.
    pub async fn write_message(&self, data: impl Into<Vec<u8>>) -> Result<()> {
        let shared = &self.shared;
        if shared.signal.is_fired() {
            return Err(Error::ConnectionClosed);
        }

        tokio::select! {
            biased;
            () = shared.signal.wait() => Err(Error::ConnectionClosed),
            queued = shared.outbound.send(data.into()) => {
                queued.map_err(|_| Error::ConnectionClosed)
            }
        }
    }

    /// Reads the next message, giving up after `read_timeout`.
    ///
    /// A timeout leaves the connection open.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the connection is closed
    /// - [`Error::Timeout`] if no message arrived in time
    pub async fn read_message_timeout(&self, read_timeout: Duration) -> Result<Vec<u8>> {
        timeout(read_timeout, self.read_message())
            .await
            .map_err(|_| Error::timeout("read_message", duration_ms(read_timeout)))?
    }

    /// Queues a message, giving up after `write_timeout`.
    ///
    /// A timeout drops the message and leaves the connection open.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the connection is closed
    /// - [`Error::Timeout`] if the outbound queue stayed full
    pub async fn write_message_timeout(
        &self,
        data: impl Into<Vec<u8>>,
        write_timeout: Duration,
    ) -> Result<()> {
        timeout(write_timeout, self.write_message(data))
            .await
            .map_err(|_| Error::timeout("write_message", duration_ms(write_timeout)))?
    }

    /// Closes the connection.
    ///
    /// Idempotent and safe to call concurrently. Closes the transport, then
    /// wakes every task blocked in a read or write.
    pub async fn close(&self) {
        self.shared.close().await;
    }
}

// ============================================================================
// Tests
// ============================================================================
