//! # Message Types
//!
//! One struct per host server message. Requests and responses both implement
//! `encode()` (struct to [`Packet`]) and `decode()` (wire bytes to struct), so
//! the same types drive the client handshake and the in-process test host.
//!
//! | message                            | request | response |
//! |------------------------------------|---------|----------|
//! | random seed exchange               | 0x7001  | 0xF001   |
//! | start server                       | 0x7002  | 0xF002   |
//! | sign-on seed exchange              | 0x7003  | 0xF003   |
//! | sign-on info                       | 0x7004  | 0xF004   |
//! | data queue exchange attributes     | 0x8000  | 0x8000 (0x8002 on error) |
//! | remote command exchange attributes | 0x1001  | 0x8001   |
//!
//! Decoders check the minimum frame length for their exchange and return
//! `Framing` below it. Field records are looked up through a [`FieldIndex`],
//! so a missing optional field decodes as `None` rather than failing.

pub mod data_queue;
pub mod random_seed;
pub mod remote_command;
pub mod signon_info;
pub mod signon_seed;
pub mod start_server;

use crate::core::packet::{FieldIndex, Packet};
use crate::error::{ProtocolError, Result, Stage};
use crate::utils::ebcdic;

pub use data_queue::{
    DataQueueExchangeAttributesRequest, DataQueueExchangeAttributesResponse,
    DataQueueReturnCodeResponse,
};
pub use random_seed::{RandomSeedExchangeRequest, RandomSeedExchangeResponse};
pub use remote_command::{
    RemoteCommandExchangeAttributesRequest, RemoteCommandExchangeAttributesResponse,
};
pub use signon_info::{SignonInfoRequest, SignonInfoResponse};
pub use signon_seed::{SignonSeedExchangeRequest, SignonSeedExchangeResponse};
pub use start_server::{StartServerRequest, StartServerResponse};

/// Request/response ids
pub mod id {
    pub const RANDOM_SEED_EXCHANGE_REQUEST: u16 = 0x7001;
    pub const RANDOM_SEED_EXCHANGE_RESPONSE: u16 = 0xF001;
    pub const START_SERVER_REQUEST: u16 = 0x7002;
    pub const START_SERVER_RESPONSE: u16 = 0xF002;
    pub const SIGNON_SEED_EXCHANGE_REQUEST: u16 = 0x7003;
    pub const SIGNON_SEED_EXCHANGE_RESPONSE: u16 = 0xF003;
    pub const SIGNON_INFO_REQUEST: u16 = 0x7004;
    pub const SIGNON_INFO_RESPONSE: u16 = 0xF004;
    pub const DATA_QUEUE_EXCHANGE_ATTRIBUTES: u16 = 0x8000;
    pub const DATA_QUEUE_RETURN_CODE: u16 = 0x8002;
    pub const REMOTE_COMMAND_EXCHANGE_ATTRIBUTES_REQUEST: u16 = 0x1001;
    pub const REMOTE_COMMAND_EXCHANGE_ATTRIBUTES_RESPONSE: u16 = 0x8001;
}

/// Field ids
pub mod field {
    pub const CLIENT_VERSION: u16 = 0x1101;
    pub const DATA_STREAM_LEVEL: u16 = 0x1102;
    pub const SEED: u16 = 0x1103;
    pub const USER_ID: u16 = 0x1104;
    pub const PASSWORD: u16 = 0x1105;
    pub const CURRENT_SIGNON_DATE: u16 = 0x1106;
    pub const LAST_SIGNON_DATE: u16 = 0x1107;
    pub const PASSWORD_EXPIRATION_DATE: u16 = 0x1108;
    pub const CLIENT_CCSID: u16 = 0x1113;
    pub const SERVER_CCSID: u16 = 0x1114;
    pub const PASSWORD_LEVEL: u16 = 0x1119;
    pub const JOB_NAME: u16 = 0x111F;
    pub const RETURN_ERROR_MESSAGES: u16 = 0x1128;
    pub const EXPIRATION_WARNING: u16 = 0x112C;
}

/// Declared length of a user id field (header + 10 EBCDIC bytes)
pub(crate) const USER_ID_FIELD_LEN: u32 = 16;

/// Width of a user id value
pub(crate) const USER_ID_WIDTH: usize = 10;

/// Declared length of a job name field (header + 25 bytes)
pub(crate) const JOB_NAME_FIELD_LEN: u32 = 0x1F;

/// Width of a job name value
pub(crate) const JOB_NAME_WIDTH: usize = 25;

/// Offset of the return code in every response template
pub(crate) const RC_OFFSET: usize = 20;

/// Fail with `Framing` when `frame` is shorter than `expected`.
pub(crate) fn ensure_len(frame: &[u8], expected: usize, stage: Stage) -> Result<()> {
    if frame.len() < expected {
        return Err(ProtocolError::Framing {
            stage,
            expected,
            actual: frame.len(),
        });
    }
    Ok(())
}

/// Fail with `UnexpectedReply` when the packet carries a different reply id.
pub(crate) fn expect_reply(packet: &Packet, expected: u16) -> Result<()> {
    let actual = packet.request_response_id();
    if actual != expected {
        return Err(ProtocolError::UnexpectedReply(actual));
    }
    Ok(())
}

pub(crate) fn field_u32(packet: &Packet, index: &FieldIndex, id: u16) -> Option<u32> {
    index
        .get(packet, id)
        .filter(|v| v.len() >= 4)
        .map(|v| u32::from_be_bytes([v[0], v[1], v[2], v[3]]))
}

pub(crate) fn field_u16(packet: &Packet, index: &FieldIndex, id: u16) -> Option<u16> {
    index
        .get(packet, id)
        .filter(|v| v.len() >= 2)
        .map(|v| u16::from_be_bytes([v[0], v[1]]))
}

/// CCSID 37 text of a field, up to its first blank.
pub(crate) fn field_text(packet: &Packet, index: &FieldIndex, id: u16) -> Option<String> {
    index.get(packet, id).map(|v| {
        let len = ebcdic::effective_len(v);
        ebcdic::decode(&v[..len])
    })
}

/// Write a user id field at `offset`.
pub(crate) fn write_user_id(packet: &mut Packet, user_id: &str, offset: usize) -> Result<()> {
    let encoded = ebcdic::encode_padded(user_id, USER_ID_WIDTH)?;
    packet.set_field(Some(&encoded), field::USER_ID, offset, USER_ID_FIELD_LEN);
    Ok(())
}

/// Write a job name field at `offset`, truncating to the field width.
pub(crate) fn write_job_name(packet: &mut Packet, job_name: Option<&[u8]>, offset: usize) {
    let value = job_name.map(|v| &v[..v.len().min(JOB_NAME_WIDTH)]);
    packet.set_field(value, field::JOB_NAME, offset, JOB_NAME_FIELD_LEN);
}
