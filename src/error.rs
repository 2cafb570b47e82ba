//! # Error Types
//!
//! Error handling for the host server connection engine.
//!
//! Every fallible operation in the crate returns [`Result`], whose error side is
//! [`ProtocolError`]. The variants fall into four groups:
//!
//! - **Input errors**: bad constructor arguments, oversized user ids, invalid
//!   packet sizes. Raised synchronously, never retried.
//! - **Framing errors**: a reply shorter than the minimum length for its
//!   handshake step.
//! - **Return codes**: the host answered with a non-zero return code. Sign-on
//!   codes carry the host's human-readable message.
//! - **Transport errors**: socket connect/read/write failures, TLS failures and
//!   peers that close the connection mid-exchange.
//!
//! The engine never retries on its own; retry policy belongs to the caller.
//!
//! ## Example Usage
//! ```rust
//! use hostserver_protocol::error::{ProtocolError, Result};
//!
//! fn check(rc: u32) -> Result<()> {
//!     if rc != 0 {
//!         return Err(ProtocolError::return_code(rc));
//!     }
//!     Ok(())
//! }
//!
//! let err = check(0x0002_0001).unwrap_err();
//! assert_eq!(err.return_code_value(), Some(0x0002_0001));
//! ```

use std::fmt;
use std::io;
use thiserror::Error;

use crate::protocol::security_codes;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Connection errors
    pub const ERR_CONNECTION_CLOSED: &str = "Connection closed";
    pub const ERR_TIMEOUT: &str = "Operation timed out";

    /// Packet construction errors
    pub const ERR_INVALID_HEADER: &str = "Invalid packet header";

    /// Credential errors
    pub const ERR_USER_ID_EMPTY: &str = "A valid user ID is required";
    pub const ERR_PASSWORD_EMPTY: &str = "A valid password is required";
    pub const ERR_HOST_NAME_EMPTY: &str = "A valid host name is required";
    pub const ERR_USER_ID_TOO_LONG: &str = "User ID is longer than 10 characters";
    pub const ERR_PASSWORD_TOO_LONG: &str =
        "Password is longer than 10 characters, which the legacy password level cannot encrypt";

    /// Locator errors
    pub const ERR_UNKNOWN_SERVICE: &str = "Unknown service";

    /// Randomness
    pub const ERR_RANDOM_UNAVAILABLE: &str = "System random source unavailable";
}

/// Handshake step during which a framing error was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Port mapper lookup
    Locate,
    /// Sign-on seed exchange
    SignonSeedExchange,
    /// Sign-on info (credential submission)
    SignonInfo,
    /// Random seed exchange with the target service
    SeedExchange,
    /// Start server request
    StartServer,
    /// Per-service attribute exchange
    ExchangeAttributes,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Locate => "port lookup",
            Stage::SignonSeedExchange => "signon seed exchange",
            Stage::SignonInfo => "signon info",
            Stage::SeedExchange => "random seed exchange",
            Stage::StartServer => "start server",
            Stage::ExchangeAttributes => "exchange attributes",
        };
        f.write_str(name)
    }
}

// ProtocolError is the primary error type for all engine operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid packet size: {0} bytes")]
    InvalidSize(usize),

    #[error("Invalid {stage} response: expected at least {expected} bytes, got {actual}")]
    Framing {
        stage: Stage,
        expected: usize,
        actual: usize,
    },

    #[error("Host returned code {code:#010x}: {message}")]
    ReturnCode { code: u32, message: String },

    #[error("{stage} message is missing field {id:#06x}")]
    MissingField { stage: Stage, id: u16 },

    #[error("Unexpected reply id {0:#06x}")]
    UnexpectedReply(u16),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("TLS error: {0}")]
    TlsError(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout occurred")]
    Timeout,

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ProtocolError {
    /// Build a `ReturnCode` error whose message comes from the sign-on
    /// security code table ("Unknown error" for codes it does not list).
    pub fn return_code(code: u32) -> Self {
        ProtocolError::ReturnCode {
            code,
            message: security_codes::message_for(code).to_string(),
        }
    }

    /// The host return code, when this error carries one.
    pub fn return_code_value(&self) -> Option<u32> {
        match self {
            ProtocolError::ReturnCode { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// True for socket-level failures (connect, read, write, TLS, peer hang-up).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ProtocolError::Io(_)
                | ProtocolError::TransportError(_)
                | ProtocolError::TlsError(_)
                | ProtocolError::ConnectionClosed
                | ProtocolError::Timeout
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_code_maps_known_message() {
        let err = ProtocolError::return_code(0x0002_0001);
        assert_eq!(err.return_code_value(), Some(0x0002_0001));
        assert!(err.to_string().contains("Unknown user ID"));
    }

    #[test]
    fn test_return_code_unknown() {
        let err = ProtocolError::return_code(0xDEAD_BEEF);
        assert!(err.to_string().contains("Unknown error"));
    }

    #[test]
    fn test_transport_classification() {
        assert!(ProtocolError::ConnectionClosed.is_transport());
        assert!(ProtocolError::Io(io::Error::other("boom")).is_transport());
        assert!(!ProtocolError::InvalidSize(3).is_transport());
        assert!(!ProtocolError::return_code(1).is_transport());
    }

    #[test]
    fn test_framing_message_names_stage() {
        let err = ProtocolError::Framing {
            stage: Stage::StartServer,
            expected: 24,
            actual: 10,
        };
        let text = err.to_string();
        assert!(text.contains("start server"));
        assert!(text.contains("24"));
    }
}
