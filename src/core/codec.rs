//! Length-prefixed framing for host server streams.
//!
//! Every packet starts with its own total length as a big-endian `u32`, so a
//! frame is complete once that many bytes are buffered. Frames are handed up
//! as raw bytes; callers check the minimum length for the exchange they are in
//! before wrapping a frame in a [`Packet`].

use crate::config::MAX_PACKET_SIZE;
use crate::core::packet::Packet;
use crate::error::{ProtocolError, Result};
use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

const LENGTH_PREFIX: usize = 4;

/// Frame codec for host server packets
#[derive(Debug, Clone, Copy)]
pub struct HostCodec {
    max_packet_size: usize,
}

impl HostCodec {
    pub fn new(max_packet_size: usize) -> Self {
        HostCodec { max_packet_size }
    }

    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }
}

impl Default for HostCodec {
    fn default() -> Self {
        HostCodec::new(MAX_PACKET_SIZE)
    }
}

impl Decoder for HostCodec {
    type Item = BytesMut;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.len() < LENGTH_PREFIX {
            return Ok(None);
        }

        let declared = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if declared < LENGTH_PREFIX {
            return Err(ProtocolError::InvalidSize(declared));
        }
        if declared > self.max_packet_size {
            return Err(ProtocolError::OversizedPacket(declared));
        }

        if src.len() < declared {
            src.reserve(declared - src.len());
            return Ok(None);
        }

        let frame = src.split_to(declared);
        trace!(len = declared, data = %hex::encode(&frame), "Frame received");
        Ok(Some(frame))
    }
}

impl Encoder<Packet> for HostCodec {
    type Error = ProtocolError;

    fn encode(&mut self, packet: Packet, dst: &mut BytesMut) -> Result<()> {
        if packet.len() > self.max_packet_size {
            return Err(ProtocolError::OversizedPacket(packet.len()));
        }
        trace!(len = packet.len(), data = %hex::encode(packet.as_bytes()), "Frame sent");
        dst.extend_from_slice(packet.as_bytes());
        Ok(())
    }
}
