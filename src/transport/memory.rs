//! In-process transport pair.
//!
//! [`MemoryTransport::pair`] returns two linked ends: whatever one end writes,
//! the other end reads. Useful for tests, benchmarks and for wiring two
//! [`Connection`](crate::Connection)s together inside one process.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tracing::trace;

use crate::error::{Error, Result};
use crate::signal::CloseSignal;

use super::{MessageKind, Transport};

// ============================================================================
// MemoryTransport
// ============================================================================

/// One end of an in-process duplex link.
///
/// Closing an end stops its own reads and writes immediately. The peer keeps
/// reading whatever was already sent, then its reads fail.
#[derive(Debug)]
pub struct MemoryTransport {
    /// Messages written by the peer.
    incoming: AsyncMutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    /// Sender to the peer; taken on close so the peer sees end of stream.
    outgoing: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    /// Local shutdown.
    shutdown: CloseSignal,
}

impl MemoryTransport {
    /// Creates two linked transports.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();

        let a = Self::new(b_rx, a_tx);
        let b = Self::new(a_rx, b_tx);
        (a, b)
    }

    fn new(
        incoming: mpsc::UnboundedReceiver<Vec<u8>>,
        outgoing: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Self {
        Self {
            incoming: AsyncMutex::new(incoming),
            outgoing: Mutex::new(Some(outgoing)),
            shutdown: CloseSignal::new(),
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn read_message(&self) -> Result<Vec<u8>> {
        if self.shutdown.is_fired() {
            return Err(Error::transport("transport is closed"));
        }

        let mut incoming = self.incoming.lock().await;

        tokio::select! {
            biased;
            () = self.shutdown.wait() => Err(Error::transport("transport is closed")),
            message = incoming.recv() => {
                message.ok_or_else(|| Error::transport("peer closed"))
            }
        }
    }

    async fn write_message(&self, _kind: MessageKind, data: Vec<u8>) -> Result<()> {
        let outgoing = self.outgoing.lock().clone();
        let Some(outgoing) = outgoing else {
            return Err(Error::transport("transport is closed"));
        };

        trace!(len = data.len(), "Memory transport write");
        outgoing
            .send(data)
            .map_err(|_| Error::transport("peer closed"))
    }

    async fn close(&self) -> Result<()> {
        self.outgoing.lock().take();
        self.shutdown.fire();
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
