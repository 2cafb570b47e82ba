//! Type-erased byte streams.
//!
//! Service sockets may be plain TCP or TLS, and tests hand in in-memory
//! duplex pipes. Everything above the locator works on [`BoxedStream`].

use tokio::io::{AsyncRead, AsyncWrite};

/// A bidirectional async byte stream usable behind a `Box`.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> AsyncStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Owned, type-erased socket
pub type BoxedStream = Box<dyn AsyncStream>;

/// Erase the concrete stream type.
pub fn boxed<S>(stream: S) -> BoxedStream
where
    S: AsyncStream + 'static,
{
    Box::new(stream)
}
