//! Remote command attribute exchange.
//!
//! Request (34 bytes, template 14): client CCSID u32 @20, NLV as four zoned
//! digits @24, client version u32 @28.
//!
//! Response (36 bytes): rc u16 @20, server CCSID u32 @22, data stream level
//! u16 @34. Hosts may send a shorter frame; missing values read as `None`.

use super::{ensure_len, expect_reply, id, RC_OFFSET};
use crate::core::packet::Packet;
use crate::error::{ProtocolError, Result, Stage};
use crate::service::descriptor::REMOTE_COMMAND;

const REQUEST_LEN: usize = 34;
const REQUEST_TEMPLATE_LEN: u16 = 14;
const NLV_OFFSET: usize = 24;
const NLV_LEN: usize = 4;
const ZONE: u8 = 0xF0;

/// Client version sent in the exchange
pub const CLIENT_VERSION: u32 = 1;

/// Shortest acceptable response
pub const MIN_RESPONSE_LEN: usize = 21;
const RESPONSE_LEN: usize = 36;
const CCSID_OFFSET: usize = 22;
const DS_LEVEL_OFFSET: usize = 34;

/// Return codes that still count as a successful exchange
const ACCEPTED_RC: [u16; 2] = [0, 0x100];

/// Data stream level from which the host speaks UTF-16 text
pub const UNICODE_DS_LEVEL: u16 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommandExchangeAttributesRequest {
    pub ccsid: u32,
    /// National language version, four decimal digits such as "2924"
    pub nlv: String,
    pub client_version: u32,
}

impl RemoteCommandExchangeAttributesRequest {
    pub fn new(ccsid: u32, nlv: impl Into<String>) -> Self {
        RemoteCommandExchangeAttributesRequest {
            ccsid,
            nlv: nlv.into(),
            client_version: CLIENT_VERSION,
        }
    }

    pub fn encode(&self) -> Result<Packet> {
        let digits: Vec<u8> = self
            .nlv
            .chars()
            .map(|c| c.to_digit(10).map(|d| d as u8 | ZONE))
            .collect::<Option<_>>()
            .filter(|d: &Vec<u8>| d.len() == NLV_LEN)
            .ok_or_else(|| ProtocolError::InvalidInput(format!("Invalid NLV: {:?}", self.nlv)))?;

        let mut packet = Packet::request(
            REQUEST_LEN,
            REQUEST_TEMPLATE_LEN,
            REMOTE_COMMAND.id,
            id::REMOTE_COMMAND_EXCHANGE_ATTRIBUTES_REQUEST,
        )?;
        packet.set_u32(self.ccsid, 20);
        packet.write_bytes(&digits, NLV_OFFSET);
        packet.set_u32(self.client_version, 28);
        Ok(packet)
    }

    pub fn decode(frame: &[u8]) -> Result<Self> {
        ensure_len(frame, REQUEST_LEN, Stage::ExchangeAttributes)?;
        let packet = Packet::from_bytes(frame)?;
        expect_reply(&packet, id::REMOTE_COMMAND_EXCHANGE_ATTRIBUTES_REQUEST)?;
        let nlv = frame[NLV_OFFSET..NLV_OFFSET + NLV_LEN]
            .iter()
            .map(|b| char::from(b'0' + (b & 0x0F) % 10))
            .collect();
        Ok(RemoteCommandExchangeAttributesRequest {
            ccsid: packet.get_u32(20),
            nlv,
            client_version: packet.get_u32(28),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteCommandExchangeAttributesResponse {
    pub rc: u16,
    pub ccsid: Option<u32>,
    pub ds_level: Option<u16>,
}

impl RemoteCommandExchangeAttributesResponse {
    pub fn encode(&self) -> Result<Packet> {
        let mut packet = Packet::request(
            RESPONSE_LEN,
            0,
            REMOTE_COMMAND.id,
            id::REMOTE_COMMAND_EXCHANGE_ATTRIBUTES_RESPONSE,
        )?;
        packet.set_u16(self.rc, RC_OFFSET);
        packet.set_u32(self.ccsid.unwrap_or(0), CCSID_OFFSET);
        packet.set_u16(self.ds_level.unwrap_or(0), DS_LEVEL_OFFSET);
        Ok(packet)
    }

    pub fn decode(frame: &[u8]) -> Result<Self> {
        ensure_len(frame, MIN_RESPONSE_LEN, Stage::ExchangeAttributes)?;
        expect_reply(
            &Packet::from_bytes(frame)?,
            id::REMOTE_COMMAND_EXCHANGE_ATTRIBUTES_RESPONSE,
        )?;
        let be_u16 = |at: usize| frame.get(at..at + 2).map(|b| u16::from_be_bytes([b[0], b[1]]));
        let be_u32 = |at: usize| {
            frame
                .get(at..at + 4)
                .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        };
        Ok(RemoteCommandExchangeAttributesResponse {
            // A 21-byte frame carries only the high byte of the return code.
            rc: be_u16(RC_OFFSET).unwrap_or_else(|| u16::from(frame[RC_OFFSET]) << 8),
            ccsid: be_u32(CCSID_OFFSET),
            ds_level: be_u16(DS_LEVEL_OFFSET),
        })
    }

    pub fn is_success(&self) -> bool {
        ACCEPTED_RC.contains(&self.rc)
    }

    /// Fail with `ReturnCode` unless the host accepted the exchange.
    pub fn check(&self) -> Result<()> {
        if self.is_success() {
            return Ok(());
        }
        Err(ProtocolError::ReturnCode {
            code: u32::from(self.rc),
            message: format!("Remote command server returned {:#06x}", self.rc),
        })
    }

    pub fn supports_unicode(&self) -> bool {
        self.ds_level.is_some_and(|level| level >= UNICODE_DS_LEVEL)
    }
}
