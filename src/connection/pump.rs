//! Inbound and outbound pumps.
//!
//! Each pump is a task that owns one direction of the transport:
//!
//! ```text
//! RUNNING ──► TransportError ──┐
//!    │                         ├──► teardown (Shared::close) ──► TERMINATED
//!    └────► ShuttingDown ──────┘
//! ```
//!
//! Both pumps end in the same teardown, so a failure in either direction
//! closes the whole connection and wakes every blocked caller.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::Error;

use super::Shared;

// ============================================================================
// Exit
// ============================================================================

/// Why a pump loop stopped.
#[derive(Debug)]
enum Exit {
    /// The close signal fired.
    ShuttingDown,
    /// The transport failed.
    TransportError(Error),
}

impl Exit {
    fn log(&self, shared: &Shared, pump: &'static str) {
        match self {
            Self::ShuttingDown => {
                debug!(conn_id = %shared.id, pump, "Pump stopping on close");
            }
            Self::TransportError(e) => {
                debug!(conn_id = %shared.id, pump, error = %e, "Pump stopping on transport error");
            }
        }
    }
}

// ============================================================================
// Inbound
// ============================================================================

/// Moves messages from the transport onto the inbound queue.
pub(super) async fn run_inbound(shared: Arc<Shared>, queue: mpsc::Sender<Vec<u8>>) {
    let exit = inbound_loop(&shared, &queue).await;
    exit.log(&shared, "inbound");
    shared.close().await;
}

async fn inbound_loop(shared: &Shared, queue: &mpsc::Sender<Vec<u8>>) -> Exit {
    loop {
        let data = tokio::select! {
            biased;
            () = shared.signal.wait() => return Exit::ShuttingDown,
            read = shared.transport.read_message() => match read {
                Ok(data) => data,
                Err(e) => return Exit::TransportError(e),
            },
        };

        trace!(conn_id = %shared.id, len = data.len(), "Message received");

        // A full queue must not outlive the connection.
        tokio::select! {
            biased;
            () = shared.signal.wait() => return Exit::ShuttingDown,
            queued = queue.send(data) => {
                if queued.is_err() {
                    return Exit::ShuttingDown;
                }
            }
        }
    }
}

// ============================================================================
// Outbound
// ============================================================================

/// Moves messages from the outbound queue onto the transport.
pub(super) async fn run_outbound(shared: Arc<Shared>, mut queue: mpsc::Receiver<Vec<u8>>) {
    let exit = outbound_loop(&shared, &mut queue).await;
    exit.log(&shared, "outbound");
    shared.close().await;
}

async fn outbound_loop(shared: &Shared, queue: &mut mpsc::Receiver<Vec<u8>>) -> Exit {
    let kind = shared.config.message_kind;

    loop {
        let data = tokio::select! {
            biased;
            () = shared.signal.wait() => return Exit::ShuttingDown,
            next = queue.recv() => match next {
                Some(data) => data,
                None => return Exit::ShuttingDown,
            },
        };

        let len = data.len();

        tokio::select! {
            biased;
            () = shared.signal.wait() => return Exit::ShuttingDown,
            written = shared.transport.write_message(kind, data) => {
                if let Err(e) = written {
                    return Exit::TransportError(e);
                }
            }
        }

        trace!(conn_id = %shared.id, len, "Message sent");
    }
}
