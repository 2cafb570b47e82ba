//! # Framed Channel
//!
//! A [`Channel`] wraps one socket in the [`HostCodec`] and offers the
//! "write a request, await the next frame" primitive every exchange is built
//! from. There is no pipelining: a channel carries one exchange at a time.

use crate::core::codec::HostCodec;
use crate::core::packet::Packet;
use crate::error::{ProtocolError, Result};
use crate::transport::stream::BoxedStream;
use crate::utils::metrics::Metrics;
use bytes::BytesMut;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio_util::codec::Framed;
use tracing::{debug, trace};

pub struct Channel {
    framed: Framed<BoxedStream, HostCodec>,
    peer: String,
    metrics: Arc<Metrics>,
}

impl Channel {
    pub fn new(
        stream: BoxedStream,
        peer: impl Into<String>,
        max_packet_size: usize,
        metrics: Arc<Metrics>,
    ) -> Self {
        Channel {
            framed: Framed::new(stream, HostCodec::new(max_packet_size)),
            peer: peer.into(),
            metrics,
        }
    }

    /// Address this channel talks to, for logging
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Write one packet and flush it.
    pub async fn send(&mut self, packet: Packet) -> Result<()> {
        let len = packet.len() as u64;
        self.framed.send(packet).await?;
        self.metrics.packet_sent(len);
        Ok(())
    }

    /// Wait for the next complete frame.
    pub async fn receive(&mut self) -> Result<BytesMut> {
        match self.framed.next().await {
            Some(Ok(frame)) => {
                self.metrics.packet_received(frame.len() as u64);
                Ok(frame)
            }
            Some(Err(e)) => Err(e),
            None => {
                debug!(peer = %self.peer, "Peer closed the connection");
                Err(ProtocolError::ConnectionClosed)
            }
        }
    }

    /// Send a request and return the frame that answers it.
    pub async fn request(&mut self, packet: Packet) -> Result<BytesMut> {
        trace!(peer = %self.peer, request = ?packet, "Request");
        self.send(packet).await?;
        self.receive().await
    }

    /// Flush and shut down the write side.
    pub async fn close(&mut self) -> Result<()> {
        SinkExt::<Packet>::close(&mut self.framed).await
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel").field("peer", &self.peer).finish()
    }
}
