//! # Error Types
//!
//! Error handling for the Classic/CPE protocol core.
//!
//! This module defines every failure the protocol engine can surface, from low-level
//! I/O errors on the transport to framing violations and map-load failures.
//!
//! ## Error Categories
//! - **Framing errors**: unknown opcode, incomplete frame, strict-mode frame mismatch,
//!   buffer underrun inside a handler
//! - **Allocation errors**: map volume too large to allocate
//! - **Load errors**: gzip header, inflate, and finalise dimension failures
//! - **Session errors**: server kick, closed connection, timeouts, configuration
//!
//! Malformed cosmetic field values are never errors; handlers clamp or substitute
//! defaults for those. Negotiation anomalies are tolerated by the additive counter.
//!
//! Every externally surfaced failure funnels into one "disconnect with reason" signal via
//! [`ProtocolError::disconnect_reason`].
//!
//! ## Example Usage
//! ```rust
//! use classic_protocol::error::{ProtocolError, Result};
//! use tracing::error;
//!
//! fn check_opcode(opcode: u8) -> Result<()> {
//!     if opcode > 44 {
//!         return Err(ProtocolError::UnknownOpcode(opcode));
//!     }
//!     Ok(())
//! }
//!
//! if let Err(e) = check_opcode(200) {
//!     error!(error = %e, fatal = e.is_fatal(), "Dispatch failed");
//! }
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Disconnect titles
    pub const TITLE_LOST_CONNECTION: &str = "&eLost connection to the server";
    pub const TITLE_DISCONNECTED: &str = "Disconnected!";

    /// Map transfer errors
    pub const ERR_MAP_ALLOCATION: &str = "Failed to allocate memory for map";
    pub const ERR_FINALISE_WITHOUT_MAP: &str = "Level finalise received with no map transfer";
    pub const ERR_BAD_GZIP_MAGIC: &str = "Map stream is not gzip (bad magic bytes)";
    pub const ERR_BAD_GZIP_METHOD: &str = "Map stream uses an unsupported gzip method";

    /// Connection errors
    pub const ERR_CONNECTION_CLOSED: &str = "Connection closed";
    pub const ERR_CONNECTION_TIMEOUT: &str = "Connection timed out";
}

/// ProtocolError is the primary error type for all protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Buffer underrun: needed {needed} bytes, {remaining} remaining")]
    BufferUnderrun { needed: usize, remaining: usize },

    #[error("Unknown packet opcode: {0}")]
    UnknownOpcode(u8),

    #[error("Incomplete frame for opcode {opcode}: expected {expected} bytes, got {actual}")]
    IncompleteFrame {
        opcode: u8,
        expected: usize,
        actual: usize,
    },

    #[error("Frame mismatch for opcode {opcode}: declared {declared} payload bytes, handler consumed {consumed}")]
    FrameMismatch {
        opcode: u8,
        declared: usize,
        consumed: usize,
    },

    #[error("Failed to allocate memory for map ({0} bytes)")]
    AllocationFailure(usize),

    #[error("Map volume {volume} does not match dimensions {width}x{height}x{length}")]
    MapVolumeMismatch {
        volume: usize,
        width: u16,
        height: u16,
        length: u16,
    },

    #[error("Map transfer error: {0}")]
    MapTransfer(String),

    #[error("Invalid gzip header: {0}")]
    InvalidGzipHeader(String),

    #[error("Decompression failed")]
    DecompressionFailure,

    #[error("Kicked by server: {0}")]
    Kicked(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Connection timed out")]
    ConnectionTimeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl ProtocolError {
    /// Whether this error must tear down the connection.
    ///
    /// An unknown opcode seen by the dispatcher leaves the session untouched, so the
    /// caller may log it and carry on. A transport that cannot locate the end of that
    /// frame treats it as fatal on its own.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ProtocolError::UnknownOpcode(_))
    }

    /// Short human-readable reason carried by the disconnect signal.
    pub fn disconnect_reason(&self) -> String {
        match self {
            ProtocolError::Kicked(reason) => reason.clone(),
            ProtocolError::AllocationFailure(_) => constants::ERR_MAP_ALLOCATION.to_string(),
            ProtocolError::ConnectionClosed => constants::ERR_CONNECTION_CLOSED.to_string(),
            ProtocolError::ConnectionTimeout => constants::ERR_CONNECTION_TIMEOUT.to_string(),
            other => other.to_string(),
        }
    }

    /// Title shown alongside [`disconnect_reason`](Self::disconnect_reason).
    pub fn disconnect_title(&self) -> &'static str {
        match self {
            ProtocolError::Kicked(_) => constants::TITLE_LOST_CONNECTION,
            _ => constants::TITLE_DISCONNECTED,
        }
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
