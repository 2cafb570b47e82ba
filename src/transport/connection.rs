//! An authenticated service connection.

use crate::core::packet::Packet;
use crate::error::Result;
use crate::protocol::messages::start_server::job_name_text;
use crate::service::descriptor::ServiceDescriptor;
use crate::transport::channel::Channel;
use bytes::BytesMut;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

/// A channel that completed the handshake for one service, shared through the
/// connection cache.
#[derive(Debug)]
pub struct Connection {
    channel: Mutex<Channel>,
    correlation_id: u32,
    service: ServiceDescriptor,
    job_id: Option<Vec<u8>>,
}

impl Connection {
    pub fn new(
        channel: Channel,
        service: ServiceDescriptor,
        correlation_id: u32,
        job_id: Option<Vec<u8>>,
    ) -> Self {
        Connection {
            channel: Mutex::new(channel),
            correlation_id,
            service,
            job_id,
        }
    }

    pub fn correlation_id(&self) -> u32 {
        self.correlation_id
    }

    pub fn service(&self) -> &ServiceDescriptor {
        &self.service
    }

    /// Raw job name value returned by start server
    pub fn job_id(&self) -> Option<&[u8]> {
        self.job_id.as_deref()
    }

    /// Server job as text, e.g. `123456/QUSER/QZRCSRVS`
    pub fn job_name(&self) -> Option<String> {
        self.job_id.as_deref().map(job_name_text)
    }

    /// Exclusive access to the channel for a multi-packet exchange.
    pub async fn channel(&self) -> MutexGuard<'_, Channel> {
        self.channel.lock().await
    }

    /// Write one packet.
    pub async fn send(&self, packet: Packet) -> Result<()> {
        self.channel.lock().await.send(packet).await
    }

    /// Write one packet and wait for the frame that answers it.
    pub async fn request(&self, packet: Packet) -> Result<BytesMut> {
        self.channel.lock().await.request(packet).await
    }

    /// Shut the socket down.
    pub async fn close(&self) -> Result<()> {
        debug!(service = self.service.name, correlation_id = self.correlation_id, "Closing connection");
        self.channel.lock().await.close().await
    }
}
