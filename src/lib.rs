//! # hostserver-protocol
//!
//! Client connection and authentication engine for midrange host server
//! services.
//!
//! A [`HostSystem`] holds the credentials for one host. It signs on once,
//! locates each service through the port mapper and runs the random seed
//! exchange and start server handshake on every new socket. Connections are
//! cached by correlation id. A [`ServiceSession`] owns one correlation id and
//! runs the service's attribute exchange the first time it opens.
//!
//! ```no_run
//! use std::sync::Arc;
//! use hostserver_protocol::{HostConfig, HostSystem, ServiceSession, REMOTE_COMMAND};
//!
//! # async fn run() -> hostserver_protocol::Result<()> {
//! let system = Arc::new(HostSystem::new(HostConfig::new("myhost", "USER", "PASS"))?);
//! let mut session = ServiceSession::new(system.clone(), REMOTE_COMMAND);
//! let connection = session.open().await?;
//! println!("server job: {:?}", connection.job_name());
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use config::{ConnectionConfig, HostConfig, LoggingConfig};
pub use core::codec::HostCodec;
pub use core::packet::Packet;
pub use error::{ProtocolError, Result};
pub use protocol::{HandshakeStage, HostSystem, SignonInfo};
pub use service::{
    AttributeExchange, ServiceAttributes, ServiceDescriptor, ServiceSession, DATABASE, DATA_QUEUE,
    REMOTE_COMMAND, SIGNON,
};
pub use transport::connection::Connection;
pub use transport::port_mapper::{PortMapper, ServiceLocator};
