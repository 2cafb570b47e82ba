//! # Services
//!
//! Well-known host services and the per-client session on top of them.
//!
//! ## Components
//! - **Descriptor**: service name, id and default ports
//! - **Session**: correlation id, cached connection and attribute exchange

pub mod descriptor;
pub mod session;

pub use descriptor::{ServiceDescriptor, DATABASE, DATA_QUEUE, REMOTE_COMMAND, SIGNON};
pub use session::{AttributeExchange, ServiceAttributes, ServiceSession};
