//! Domain error types
//!
//! Errors raised while building domain values from external input:
//! endpoint identities handed over by discovery and status integers read
//! off the wire.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Bus name is empty or malformed
    #[error("Invalid bus name: {0}")]
    InvalidBusName(String),

    /// Object path is empty or not absolute
    #[error("Invalid object path: {0}")]
    InvalidObjectPath(String),

    /// Integer received from a provider does not map to a known status
    #[error("Unknown provider status value: {0}")]
    UnknownStatus(i32),

    /// Unrecognised textual status name
    #[error("Invalid status name: {0}")]
    InvalidStatusName(String),
}
