//! Application-level handlers built on [`Connection`].
//!
//! These are policies layered on the public connection API, not part of the
//! connection itself:
//!
//! - [`spawn_heartbeat`] writes a fixed payload on an interval
//! - [`echo`] writes every received message straight back
//! - [`serve`] runs both until the connection closes

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::connection::Connection;

// ============================================================================
// Constants
// ============================================================================

/// Default heartbeat payload.
pub const DEFAULT_HEARTBEAT_PAYLOAD: &[u8] = b"heartbeat";

/// Default heartbeat interval.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

// ============================================================================
// Heartbeat
// ============================================================================

/// Periodic keep-alive message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heartbeat {
    /// Bytes written on every tick.
    pub payload: Vec<u8>,
    /// Time between writes.
    pub interval: Duration,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self {
            payload: DEFAULT_HEARTBEAT_PAYLOAD.to_vec(),
            interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

impl Heartbeat {
    /// Sets the payload.
    #[inline]
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Sets the interval.
    #[inline]
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Spawns a task writing `heartbeat.payload` every `heartbeat.interval`.
///
/// The first write happens immediately. The task ends at the first failed
/// write, which only happens once the connection is closed.
pub fn spawn_heartbeat(connection: Connection, heartbeat: Heartbeat) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(heartbeat.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if connection.write_message(heartbeat.payload.clone()).await.is_err() {
                break;
            }
        }

        debug!(conn_id = %connection.id(), "Heartbeat stopped");
    })
}

// ============================================================================
// Echo
// ============================================================================

/// Echoes every message back until the connection fails, then closes it.
///
/// Returns the number of messages echoed.
pub async fn echo(connection: &Connection) -> u64 {
    let mut echoed = 0;

    while let Ok(data) = connection.read_message().await {
        if connection.write_message(data).await.is_err() {
            break;
        }
        echoed += 1;
    }

    connection.close().await;
    echoed
}

/// Runs a heartbeat alongside [`echo`] until the connection closes.
///
/// Returns the number of messages echoed.
pub async fn serve(connection: Connection, heartbeat: Heartbeat) -> u64 {
    let heartbeat = spawn_heartbeat(connection.clone(), heartbeat);
    let echoed = echo(&connection).await;

    // The heartbeat exits on its own once it sees the close.
    join_heartbeat(&connection, heartbeat).await;

    info!(conn_id = %connection.id(), echoed, "Session finished");
    echoed
}

/// Waits for a heartbeat task, logging a panic or cancellation.
///
/// Returns `true` if the task finished normally.
async fn join_heartbeat(connection: &Connection, heartbeat: JoinHandle<()>) -> bool {
    match heartbeat.await {
        Ok(()) => true,
        Err(e) => {
            warn!(conn_id = %connection.id(), error = %e, "Heartbeat task failed");
            false
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
