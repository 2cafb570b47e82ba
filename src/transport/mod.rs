//! # Transport Layer
//!
//! Sockets and what sits directly on them.
//!
//! ## Components
//! - **Stream**: type-erased plain or TLS byte stream
//! - **Channel**: framed request/response over one stream
//! - **Connection**: authenticated channel bound to a service and correlation id
//! - **Connection cache**: connections keyed by correlation id, one build per key
//! - **Port mapper**: default [`ServiceLocator`](port_mapper::ServiceLocator)
//! - **TLS**: `rustls` client configuration

pub mod channel;
pub mod connection;
pub mod connection_cache;
pub mod port_mapper;
pub mod stream;
pub mod tls;
