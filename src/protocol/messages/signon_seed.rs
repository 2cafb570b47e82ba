//! Sign-on seed exchange: the first message on a sign-on socket.
//!
//! Request (52 bytes, no template): client version, data stream level and
//! client seed fields.
//!
//! Response (94 bytes, template 4): return code @20, then server version,
//! server level, server seed, password level and job name fields.

use super::{ensure_len, expect_reply, field, field_u16, field_u32, id, write_job_name, RC_OFFSET};
use crate::core::packet::Packet;
use crate::error::{ProtocolError, Result, Stage};
use crate::service::descriptor::SIGNON;
use crate::utils::crypto::{PasswordLevel, Seed};

const REQUEST_LEN: usize = 52;

/// Client version sent in every sign-on exchange
pub const CLIENT_VERSION: u32 = 1;

/// Data stream level the client speaks
pub const CLIENT_DATA_STREAM_LEVEL: u16 = 5;

/// Shortest acceptable response (header + return code)
pub const MIN_RESPONSE_LEN: usize = 24;
const RESPONSE_LEN: usize = 94;

#[derive(Debug, Clone)]
pub struct SignonSeedExchangeRequest {
    pub client_version: u32,
    pub data_stream_level: u16,
    pub client_seed: Seed,
}

impl SignonSeedExchangeRequest {
    pub fn new(client_seed: Seed) -> Self {
        SignonSeedExchangeRequest {
            client_version: CLIENT_VERSION,
            data_stream_level: CLIENT_DATA_STREAM_LEVEL,
            client_seed,
        }
    }

    pub fn encode(&self) -> Result<Packet> {
        let mut packet = Packet::request(
            REQUEST_LEN,
            0,
            SIGNON.id,
            id::SIGNON_SEED_EXCHANGE_REQUEST,
        )?;
        packet.set_field(
            Some(&self.client_version.to_be_bytes()),
            field::CLIENT_VERSION,
            20,
            10,
        );
        packet.set_field(
            Some(&self.data_stream_level.to_be_bytes()),
            field::DATA_STREAM_LEVEL,
            30,
            8,
        );
        packet.set_field(Some(self.client_seed.as_bytes()), field::SEED, 38, 14);
        Ok(packet)
    }

    pub fn decode(frame: &[u8]) -> Result<Self> {
        ensure_len(frame, REQUEST_LEN, Stage::SignonSeedExchange)?;
        let packet = Packet::from_bytes(frame)?;
        expect_reply(&packet, id::SIGNON_SEED_EXCHANGE_REQUEST)?;
        let index = packet.field_index();
        let client_seed = index
            .get(&packet, field::SEED)
            .map(Seed::from_slice)
            .transpose()?
            .ok_or(ProtocolError::MissingField {
                stage: Stage::SignonSeedExchange,
                id: field::SEED,
            })?;
        Ok(SignonSeedExchangeRequest {
            client_version: field_u32(&packet, &index, field::CLIENT_VERSION).unwrap_or(0),
            data_stream_level: field_u16(&packet, &index, field::DATA_STREAM_LEVEL).unwrap_or(0),
            client_seed,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignonSeedExchangeResponse {
    pub rc: u32,
    pub server_version: Option<u32>,
    pub server_level: Option<u16>,
    pub server_seed: Option<Seed>,
    pub password_level: Option<PasswordLevel>,
    /// Raw job name value of the sign-on server job
    pub job_name: Option<Vec<u8>>,
}

impl SignonSeedExchangeResponse {
    pub fn encode(&self) -> Result<Packet> {
        let mut packet = Packet::request(
            RESPONSE_LEN,
            4,
            SIGNON.id,
            id::SIGNON_SEED_EXCHANGE_RESPONSE,
        )?;
        packet.set_u32(self.rc, RC_OFFSET);
        packet.set_field(
            Some(&self.server_version.unwrap_or(0).to_be_bytes()),
            field::CLIENT_VERSION,
            24,
            10,
        );
        packet.set_field(
            Some(&self.server_level.unwrap_or(0).to_be_bytes()),
            field::DATA_STREAM_LEVEL,
            34,
            8,
        );
        packet.set_field(
            self.server_seed.as_ref().map(|s| &s.as_bytes()[..]),
            field::SEED,
            42,
            14,
        );
        packet.set_field(
            Some(&[self.password_level.map_or(0, |level| level.0)]),
            field::PASSWORD_LEVEL,
            56,
            7,
        );
        write_job_name(&mut packet, self.job_name.as_deref(), 63);
        Ok(packet)
    }

    pub fn decode(frame: &[u8]) -> Result<Self> {
        ensure_len(frame, MIN_RESPONSE_LEN, Stage::SignonSeedExchange)?;
        let packet = Packet::from_bytes(frame)?;
        expect_reply(&packet, id::SIGNON_SEED_EXCHANGE_RESPONSE)?;
        let index = packet.field_index();
        Ok(SignonSeedExchangeResponse {
            rc: packet.get_u32(RC_OFFSET),
            server_version: field_u32(&packet, &index, field::CLIENT_VERSION),
            server_level: field_u16(&packet, &index, field::DATA_STREAM_LEVEL),
            server_seed: index
                .get(&packet, field::SEED)
                .map(Seed::from_slice)
                .transpose()?,
            password_level: index
                .get(&packet, field::PASSWORD_LEVEL)
                .and_then(|v| v.first().copied())
                .map(PasswordLevel),
            job_name: index.get(&packet, field::JOB_NAME).map(<[u8]>::to_vec),
        })
    }
}
