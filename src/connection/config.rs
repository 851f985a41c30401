//! Connection configuration.
//!
//! # Example
//!
//! ```ignore
//! use wsconn::{ConnectionConfig, MessageKind};
//!
//! let config = ConnectionConfig::new()
//!     .with_inbound_capacity(64)
//!     .with_outbound_capacity(256)
//!     .with_message_kind(MessageKind::Binary);
//! ```

// ============================================================================
// Imports
// ============================================================================

use crate::error::{Error, Result};
use crate::transport::MessageKind;

// ============================================================================
// Constants
// ============================================================================

/// Default capacity of the inbound queue.
pub const DEFAULT_INBOUND_CAPACITY: usize = 1000;

/// Default capacity of the outbound queue.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 1000;

// ============================================================================
// ConnectionConfig
// ============================================================================

/// Queue sizing and framing for a [`Connection`](crate::Connection).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Messages buffered between the inbound pump and readers.
    pub inbound_capacity: usize,

    /// Messages buffered between writers and the outbound pump.
    pub outbound_capacity: usize,

    /// Kind tag used for every outgoing message.
    pub message_kind: MessageKind,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ConnectionConfig {
    /// Creates a configuration with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            message_kind: MessageKind::Text,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ConnectionConfig {
    /// Sets the inbound queue capacity.
    #[inline]
    #[must_use]
    pub const fn with_inbound_capacity(mut self, capacity: usize) -> Self {
        self.inbound_capacity = capacity;
        self
    }

    /// Sets the outbound queue capacity.
    #[inline]
    #[must_use]
    pub const fn with_outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity;
        self
    }

    /// Sets the kind tag for outgoing messages.
    #[inline]
    #[must_use]
    pub const fn with_message_kind(mut self, kind: MessageKind) -> Self {
        self.message_kind = kind;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if either queue capacity is zero.
    pub fn validate(&self) -> Result<()> {
        if self.inbound_capacity == 0 {
            return Err(Error::config(
                "inbound capacity must be greater than zero",
            ));
        }
        if self.outbound_capacity == 0 {
            return Err(Error::config(
                "outbound capacity must be greater than zero",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
