//! # Utility Modules
//!
//! Supporting utilities for ciphers, character conversion, logging, and timing.
//!
//! ## Components
//! - **Crypto**: DES and SHA-1 password substitution, random seeds
//! - **Ebcdic**: CCSID 37 conversion for user ids, passwords and host text
//! - **Environment**: Client CCSID and NLV from the process locale
//! - **Logging**: Structured logging configuration
//! - **Timeout**: Async timeout wrappers for socket establishment
//! - **Metrics**: Thread-safe observability counters
//!
//! ## Security
//! - Cryptographically secure RNG (getrandom)
//! - Memory zeroing for seeds and password material (zeroize crate)

pub mod crypto;
pub mod ebcdic;
pub mod environment;
pub mod logging;
pub mod metrics;
pub mod timeout;

pub use crypto::{PasswordLevel, Seed};
pub use metrics::{Metrics, MetricsSnapshot};
