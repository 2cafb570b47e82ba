//! # Protocol Layer
//!
//! Host server messages and the exchanges built from them.
//!
//! ## Components
//! - **Messages**: request and response templates for each exchange
//! - **Handshake**: sign-on, random seed exchange and start server
//! - **System**: per-host orchestration and the connection build
//! - **Security codes**: text for sign-on return codes

pub mod handshake;
pub mod messages;
pub mod security_codes;
pub mod system;

pub use handshake::SignonInfo;
pub use system::{HandshakeStage, HostSystem};
