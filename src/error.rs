//! # Error Types
//!
//! Error handling for the CoAP-over-TCP protocol stack.
//!
//! Three failure families exist, and all of them are fatal to the
//! connection they occur on:
//! - **Format errors**: malformed or truncated wire bytes (`Format`,
//!   `InvalidTokenLength`, `InvalidContentFormat`, `OversizedMessage`)
//! - **Protocol violations**: the capability handshake was skipped or a
//!   signaling expectation was not met (`ProtocolViolation`)
//! - **Transport errors**: underlying read/write failures (`Io`,
//!   `ConnectionClosed`, `Timeout`)
//!
//! Nothing is retried internally; recovery is always "close the
//! connection and let the caller reconnect." Application-level outcomes
//! such as 4.04 or 4.05 are ordinary response messages, never errors.

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
/// Static strings are borrowed, avoiding heap allocations for common error cases.
pub mod constants {
    /// Handshake errors
    pub const ERR_EXPECTED_CSM: &str =
        "expected capability/settings (7.01) as first message on connection";
    pub const ERR_MISSING_CAPABILITIES: &str =
        "capability/settings message carries no capability option";

    /// Signaling errors
    pub const ERR_EXPECTED_PONG: &str = "expected pong (7.03) in response to ping";

    /// Request/response correlation
    pub const ERR_TOKEN_MISMATCH: &str = "response token does not match request token";

    /// Wire format errors
    pub const ERR_TRUNCATED_OPTION: &str = "option header truncated";
    pub const ERR_CONTENT_FORMAT_TOO_LONG: &str = "content-format option longer than one byte";
    pub const ERR_UINT_TOO_LONG: &str = "numeric option value longer than four bytes";
}

/// Primary error type for all protocol operations.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed message: {0}")]
    Format(String),

    #[error("Invalid token length {0}: the wire format allows 0-8 bytes")]
    InvalidTokenLength(usize),

    #[error("Content format {0} does not fit in a single byte")]
    InvalidContentFormat(u16),

    #[error("Message too large: {0} bytes of options and payload")]
    OversizedMessage(usize),

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Operation timed out")]
    Timeout,

    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ProtocolError>;
