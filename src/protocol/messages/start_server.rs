//! Start server: authenticate a raw service socket.
//!
//! Request (44 + credential bytes, template 2): client attributes 2 (ask for
//! job info), auth type 1 (password) @20, send reply 1 @21, password field @22,
//! user id field after it.
//!
//! Response (template 4): return code @20, user id field, job name field.

use super::{
    ensure_len, expect_reply, field, field_text, id, write_job_name, write_user_id, RC_OFFSET,
};
use crate::core::packet::{Packet, FIELD_HEADER_LEN};
use crate::error::{ProtocolError, Result, Stage};
use crate::utils::ebcdic;
use zeroize::Zeroizing;

const REQUEST_BASE_LEN: usize = 44;
const REQUEST_TEMPLATE_LEN: u16 = 2;
const AUTH_TYPE_PASSWORD: u8 = 1;
const PASSWORD_OFFSET: usize = 22;

/// Shortest acceptable response (header + return code)
pub const MIN_RESPONSE_LEN: usize = 24;
const RESPONSE_LEN: usize = 71;
const RESPONSE_USER_ID_OFFSET: usize = 24;
const RESPONSE_JOB_NAME_OFFSET: usize = 40;

#[derive(Clone)]
pub struct StartServerRequest {
    pub service_id: u16,
    pub correlation_id: u32,
    pub user_id: String,
    /// Encrypted password (8 or 20 bytes)
    pub credential: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for StartServerRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartServerRequest")
            .field("service_id", &format_args!("{:#06x}", self.service_id))
            .field("correlation_id", &self.correlation_id)
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

impl StartServerRequest {
    pub fn encode(&self) -> Result<Packet> {
        let pw_len = self.credential.len();
        let mut packet = Packet::request(
            REQUEST_BASE_LEN + pw_len,
            REQUEST_TEMPLATE_LEN,
            self.service_id,
            id::START_SERVER_REQUEST,
        )?;
        packet.set_client_attributes(2);
        packet.set_correlation_id(self.correlation_id);
        packet.set_u8(AUTH_TYPE_PASSWORD, 20);
        packet.set_u8(1, 21);
        packet.set_field(
            Some(self.credential.as_slice()),
            field::PASSWORD,
            PASSWORD_OFFSET,
            (pw_len + FIELD_HEADER_LEN) as u32,
        );
        write_user_id(&mut packet, &self.user_id, PASSWORD_OFFSET + FIELD_HEADER_LEN + pw_len)?;
        Ok(packet)
    }

    pub fn decode(frame: &[u8]) -> Result<Self> {
        ensure_len(frame, REQUEST_BASE_LEN, Stage::StartServer)?;
        let packet = Packet::from_bytes(frame)?;
        expect_reply(&packet, id::START_SERVER_REQUEST)?;
        let index = packet.field_index();
        let credential = index
            .get(&packet, field::PASSWORD)
            .map(|v| Zeroizing::new(v.to_vec()))
            .ok_or(ProtocolError::MissingField {
                stage: Stage::StartServer,
                id: field::PASSWORD,
            })?;
        let user_id = field_text(&packet, &index, field::USER_ID).ok_or(
            ProtocolError::MissingField {
                stage: Stage::StartServer,
                id: field::USER_ID,
            },
        )?;
        Ok(StartServerRequest {
            service_id: packet.service_id(),
            correlation_id: packet.correlation_id(),
            user_id,
            credential,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartServerResponse {
    pub rc: u32,
    pub user_id: Option<String>,
    /// Raw job name value (4-byte CCSID followed by CCSID 37 text)
    pub job_name: Option<Vec<u8>>,
}

impl StartServerResponse {
    pub fn encode(&self, service_id: u16, correlation_id: u32) -> Result<Packet> {
        let mut packet = Packet::request(RESPONSE_LEN, 4, service_id, id::START_SERVER_RESPONSE)?;
        packet.set_correlation_id(correlation_id);
        packet.set_u32(self.rc, RC_OFFSET);
        match &self.user_id {
            Some(user) => write_user_id(&mut packet, user, RESPONSE_USER_ID_OFFSET)?,
            None => packet.set_field(
                None,
                field::USER_ID,
                RESPONSE_USER_ID_OFFSET,
                super::USER_ID_FIELD_LEN,
            ),
        }
        write_job_name(&mut packet, self.job_name.as_deref(), RESPONSE_JOB_NAME_OFFSET);
        Ok(packet)
    }

    pub fn decode(frame: &[u8]) -> Result<Self> {
        ensure_len(frame, MIN_RESPONSE_LEN, Stage::StartServer)?;
        let packet = Packet::from_bytes(frame)?;
        expect_reply(&packet, id::START_SERVER_RESPONSE)?;
        let index = packet.field_index();
        Ok(StartServerResponse {
            rc: packet.get_u32(RC_OFFSET),
            user_id: field_text(&packet, &index, field::USER_ID),
            job_name: index.get(&packet, field::JOB_NAME).map(<[u8]>::to_vec),
        })
    }
}

/// Text of a job name value: skips the leading CCSID and trailing blanks.
pub fn job_name_text(value: &[u8]) -> String {
    if value.len() <= 4 {
        return String::new();
    }
    ebcdic::decode_trimmed(&value[4..])
}
