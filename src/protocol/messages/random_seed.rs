//! Random seed exchange with a target service.
//!
//! Request (28 bytes, template 8): client attributes 1, client seed @20.
//! Response (32 bytes, template 8): return code u32 @20, server seed @24.

use super::{ensure_len, expect_reply, id, RC_OFFSET};
use crate::core::packet::Packet;
use crate::error::{Result, Stage};
use crate::utils::crypto::{Seed, SEED_LEN};

const REQUEST_LEN: usize = 28;
const REQUEST_TEMPLATE_LEN: u16 = 8;
const SEED_OFFSET: usize = 20;

/// Shortest acceptable response (header + return code)
pub const MIN_RESPONSE_LEN: usize = 24;
const RESPONSE_LEN: usize = 32;
const RESPONSE_TEMPLATE_LEN: u16 = 8;
const RESPONSE_SEED_OFFSET: usize = 24;

#[derive(Debug, Clone)]
pub struct RandomSeedExchangeRequest {
    pub service_id: u16,
    pub correlation_id: u32,
    pub client_seed: Seed,
}

impl RandomSeedExchangeRequest {
    pub fn encode(&self) -> Result<Packet> {
        let mut packet = Packet::request(
            REQUEST_LEN,
            REQUEST_TEMPLATE_LEN,
            self.service_id,
            id::RANDOM_SEED_EXCHANGE_REQUEST,
        )?;
        packet.set_client_attributes(1);
        packet.set_correlation_id(self.correlation_id);
        packet.write_bytes(self.client_seed.as_bytes(), SEED_OFFSET);
        Ok(packet)
    }

    pub fn decode(frame: &[u8]) -> Result<Self> {
        ensure_len(frame, REQUEST_LEN, Stage::SeedExchange)?;
        let packet = Packet::from_bytes(frame)?;
        expect_reply(&packet, id::RANDOM_SEED_EXCHANGE_REQUEST)?;
        Ok(RandomSeedExchangeRequest {
            service_id: packet.service_id(),
            correlation_id: packet.correlation_id(),
            client_seed: Seed::from_slice(&frame[SEED_OFFSET..SEED_OFFSET + SEED_LEN])?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RandomSeedExchangeResponse {
    pub rc: u32,
    /// Absent when the host rejected the exchange
    pub server_seed: Option<Seed>,
}

impl RandomSeedExchangeResponse {
    pub fn encode(&self, service_id: u16, correlation_id: u32) -> Result<Packet> {
        let mut packet = Packet::request(
            RESPONSE_LEN,
            RESPONSE_TEMPLATE_LEN,
            service_id,
            id::RANDOM_SEED_EXCHANGE_RESPONSE,
        )?;
        packet.set_correlation_id(correlation_id);
        packet.set_u32(self.rc, RC_OFFSET);
        if let Some(seed) = &self.server_seed {
            packet.write_bytes(seed.as_bytes(), RESPONSE_SEED_OFFSET);
        }
        Ok(packet)
    }

    pub fn decode(frame: &[u8]) -> Result<Self> {
        ensure_len(frame, MIN_RESPONSE_LEN, Stage::SeedExchange)?;
        let packet = Packet::from_bytes(frame)?;
        expect_reply(&packet, id::RANDOM_SEED_EXCHANGE_RESPONSE)?;
        let rc = packet.get_u32(RC_OFFSET);
        let server_seed = frame
            .get(RESPONSE_SEED_OFFSET..RESPONSE_SEED_OFFSET + SEED_LEN)
            .map(Seed::from_slice)
            .transpose()?;
        Ok(RandomSeedExchangeResponse { rc, server_seed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_layout() {
        let req = RandomSeedExchangeRequest {
            service_id: 0xE007,
            correlation_id: 42,
            client_seed: Seed::from([1, 2, 3, 4, 5, 6, 7, 8]),
        };
        let packet = req.encode().unwrap();
        let bytes = packet.as_bytes();
        assert_eq!(packet.length(), 28);
        assert_eq!(packet.template_length(), 8);
        assert_eq!(bytes[4], 1);
        assert_eq!(packet.request_response_id(), 0x7001);
        assert_eq!(&bytes[20..28], &[1, 2, 3, 4, 5, 6, 7, 8]);

        let back = RandomSeedExchangeRequest::decode(bytes).unwrap();
        assert_eq!(back.correlation_id, 42);
        assert_eq!(back.client_seed, req.client_seed);
    }

    #[test]
    fn test_short_response_is_framing_error() {
        let err = RandomSeedExchangeResponse::decode(&[0u8; 23]).unwrap_err();
        assert!(matches!(
            err,
            crate::error::ProtocolError::Framing { expected: 24, actual: 23, .. }
        ));
    }

    #[test]
    fn test_response_without_seed() {
        let mut frame = vec![0u8; 24];
        frame[3] = 24;
        frame[18..20].copy_from_slice(&id::RANDOM_SEED_EXCHANGE_RESPONSE.to_be_bytes());
        frame[23] = 5;
        let resp = RandomSeedExchangeResponse::decode(&frame).unwrap();
        assert_eq!(resp.rc, 5);
        assert!(resp.server_seed.is_none());
    }

    #[test]
    fn test_response_layout() {
        let resp = RandomSeedExchangeResponse {
            rc: 0,
            server_seed: Some(Seed::from([9; 8])),
        };
        let packet = resp.encode(0xE007, 3).unwrap();
        assert_eq!(packet.length(), 32);
        assert_eq!(packet.template_length(), 8);
        let back = RandomSeedExchangeResponse::decode(packet.as_bytes()).unwrap();
        assert_eq!(back.server_seed, resp.server_seed);
    }

    #[test]
    fn test_response_with_wrong_reply_id() {
        let mut packet = RandomSeedExchangeResponse {
            rc: 0,
            server_seed: Some(Seed::from([9; 8])),
        }
        .encode(0xE007, 3)
        .unwrap();
        packet.set_request_response_id(id::DATA_QUEUE_RETURN_CODE);
        assert!(matches!(
            RandomSeedExchangeResponse::decode(packet.as_bytes()),
            Err(crate::error::ProtocolError::UnexpectedReply(0x8002))
        ));
    }
}
