//! # Error Types for MAGPIE
//!
//! Unified error handling across all MAGPIE crates.
//!
//! The evolutionary core itself does not use these: corrupt DNA is
//! absorbed as skipped slots, failed loads return `false`, failed
//! crossovers return `None`. Errors here cover the boundaries - RPC,
//! persistence, task setup.

use thiserror::Error;

/// Main error type for MAGPIE operations
#[derive(Error, Debug)]
pub enum MagpieError {
    /// Wire protocol error (framing, unexpected response shape)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Error envelope received from the remote peer
    #[error("Remote error {status}: {message}")]
    Remote { status: i32, message: String },

    /// Persistence error (state file missing, corrupt, wrong version)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Task adapter error (unknown implementation name)
    #[error("Task error: {0}")]
    Task(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

/// Result type for MAGPIE operations
pub type MagpieResult<T> = Result<T, MagpieError>;

impl MagpieError {
    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a task error
    pub fn task(msg: impl Into<String>) -> Self {
        Self::Task(msg.into())
    }
}
