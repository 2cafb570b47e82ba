//! Sign-on info: authenticate on the sign-on socket and learn account state.
//!
//! Request (template 1): authentication scheme @20, client CCSID @21,
//! password field @31, user id field after it, and for server level 5 and up
//! a "return error messages" field.
//!
//! Response (147 bytes, template 4): return code @20, sign-on and expiration
//! dates, expiration warning, server CCSID and the echoed user id. The host
//! also sends fields the client ignores; the test host writes them empty so
//! the layout matches.

use super::{ensure_len, expect_reply, field, field_text, field_u32, id, write_user_id, RC_OFFSET};
use crate::core::packet::{Packet, FIELD_HEADER_LEN};
use crate::error::{ProtocolError, Result, Stage};
use crate::service::descriptor::SIGNON;
use chrono::NaiveDateTime;
use zeroize::Zeroizing;

const REQUEST_BASE_LEN: usize = 37;
const REQUEST_TEMPLATE_LEN: u16 = 1;
const AUTH_SCHEME_ENCRYPTED: u8 = 1;
const CLIENT_CCSID_OFFSET: usize = 21;
const PASSWORD_OFFSET: usize = 31;
const USER_ID_FIELD_SIZE: usize = 16;
const RETURN_ERROR_MESSAGES_LEN: usize = 7;

/// Client CCSID announced to the host (UTF-16)
pub const CLIENT_CCSID: u32 = 1200;

/// First server level that accepts the "return error messages" field
pub const RETURN_ERROR_MESSAGES_LEVEL: u16 = 5;

/// Shortest acceptable response (header + return code)
pub const MIN_RESPONSE_LEN: usize = 24;
const RESPONSE_LEN: usize = 147;

/// Fields the host sends that carry nothing the client uses: (id, offset, declared length)
const UNUSED_RESPONSE_FIELDS: [(u16, usize, u32); 5] = [
    (0x1109, 52, 8),
    (0x110A, 60, 8),
    (0x110E, 68, 7),
    (0x110B, 85, 14),
    (0x112A, 109, 8),
];

#[derive(Clone)]
pub struct SignonInfoRequest {
    pub user_id: String,
    /// Encrypted password (8 or 20 bytes)
    pub credential: Zeroizing<Vec<u8>>,
    /// Server level from the seed exchange; decides the trailing field
    pub server_level: u16,
}

impl std::fmt::Debug for SignonInfoRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignonInfoRequest")
            .field("user_id", &self.user_id)
            .field("server_level", &self.server_level)
            .finish_non_exhaustive()
    }
}

impl SignonInfoRequest {
    fn wants_error_messages(&self) -> bool {
        self.server_level >= RETURN_ERROR_MESSAGES_LEVEL
    }

    pub fn encode(&self) -> Result<Packet> {
        let pw_len = self.credential.len();
        let mut size = REQUEST_BASE_LEN + pw_len + USER_ID_FIELD_SIZE;
        if self.wants_error_messages() {
            size += RETURN_ERROR_MESSAGES_LEN;
        }
        let mut packet = Packet::request(
            size,
            REQUEST_TEMPLATE_LEN,
            SIGNON.id,
            id::SIGNON_INFO_REQUEST,
        )?;
        packet.set_u8(AUTH_SCHEME_ENCRYPTED, 20);
        packet.set_field(
            Some(&CLIENT_CCSID.to_be_bytes()),
            field::CLIENT_CCSID,
            CLIENT_CCSID_OFFSET,
            10,
        );
        packet.set_field(
            Some(self.credential.as_slice()),
            field::PASSWORD,
            PASSWORD_OFFSET,
            (pw_len + FIELD_HEADER_LEN) as u32,
        );
        let user_offset = REQUEST_BASE_LEN + pw_len;
        write_user_id(&mut packet, &self.user_id, user_offset)?;
        if self.wants_error_messages() {
            packet.set_field(
                Some(&[1]),
                field::RETURN_ERROR_MESSAGES,
                user_offset + USER_ID_FIELD_SIZE,
                RETURN_ERROR_MESSAGES_LEN as u32,
            );
        }
        Ok(packet)
    }

    /// Decode a request. The server level is reconstructed from the presence
    /// of the trailing field (5 when present, 0 otherwise).
    pub fn decode(frame: &[u8]) -> Result<Self> {
        ensure_len(frame, REQUEST_BASE_LEN, Stage::SignonInfo)?;
        let packet = Packet::from_bytes(frame)?;
        expect_reply(&packet, id::SIGNON_INFO_REQUEST)?;
        let index = packet.field_index();
        let credential = index
            .get(&packet, field::PASSWORD)
            .map(|v| Zeroizing::new(v.to_vec()))
            .ok_or(ProtocolError::MissingField {
                stage: Stage::SignonInfo,
                id: field::PASSWORD,
            })?;
        let user_id = field_text(&packet, &index, field::USER_ID).ok_or(
            ProtocolError::MissingField {
                stage: Stage::SignonInfo,
                id: field::USER_ID,
            },
        )?;
        let server_level = if index.contains(field::RETURN_ERROR_MESSAGES) {
            RETURN_ERROR_MESSAGES_LEVEL
        } else {
            0
        };
        Ok(SignonInfoRequest {
            user_id,
            credential,
            server_level,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignonInfoResponse {
    pub rc: u32,
    pub current_signon_date: Option<NaiveDateTime>,
    pub last_signon_date: Option<NaiveDateTime>,
    pub password_expiration_date: Option<NaiveDateTime>,
    /// Days before expiry at which the host starts warning
    pub expiration_warning: Option<u32>,
    pub server_ccsid: Option<u32>,
    pub user_id: Option<String>,
}

impl SignonInfoResponse {
    pub fn encode(&self) -> Result<Packet> {
        let mut packet = Packet::request(RESPONSE_LEN, 4, SIGNON.id, id::SIGNON_INFO_RESPONSE)?;
        packet.set_u32(self.rc, RC_OFFSET);
        packet.set_date(self.current_signon_date.as_ref(), field::CURRENT_SIGNON_DATE, 24);
        packet.set_date(self.last_signon_date.as_ref(), field::LAST_SIGNON_DATE, 38);
        for (field_id, offset, declared) in UNUSED_RESPONSE_FIELDS {
            packet.set_field(None, field_id, offset, declared);
        }
        packet.set_field(
            Some(&self.expiration_warning.unwrap_or(0).to_be_bytes()),
            field::EXPIRATION_WARNING,
            75,
            10,
        );
        packet.set_field(
            Some(&self.server_ccsid.unwrap_or(0).to_be_bytes()),
            field::SERVER_CCSID,
            99,
            10,
        );
        packet.set_date(
            self.password_expiration_date.as_ref(),
            field::PASSWORD_EXPIRATION_DATE,
            117,
        );
        match &self.user_id {
            Some(user) => write_user_id(&mut packet, user, 131)?,
            None => packet.set_field(None, field::USER_ID, 131, super::USER_ID_FIELD_LEN),
        }
        Ok(packet)
    }

    pub fn decode(frame: &[u8]) -> Result<Self> {
        ensure_len(frame, MIN_RESPONSE_LEN, Stage::SignonInfo)?;
        let packet = Packet::from_bytes(frame)?;
        expect_reply(&packet, id::SIGNON_INFO_RESPONSE)?;
        let index = packet.field_index();
        let date = |id| index.get(&packet, id).and_then(crate::core::packet::decode_date);
        Ok(SignonInfoResponse {
            rc: packet.get_u32(RC_OFFSET),
            current_signon_date: date(field::CURRENT_SIGNON_DATE),
            last_signon_date: date(field::LAST_SIGNON_DATE),
            password_expiration_date: date(field::PASSWORD_EXPIRATION_DATE),
            expiration_warning: field_u32(&packet, &index, field::EXPIRATION_WARNING),
            server_ccsid: field_u32(&packet, &index, field::SERVER_CCSID),
            user_id: field_text(&packet, &index, field::USER_ID),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn request(level: u16) -> SignonInfoRequest {
        SignonInfoRequest {
            user_id: "USER".into(),
            credential: Zeroizing::new(vec![0x11; 20]),
            server_level: level,
        }
    }

    #[test]
    fn test_request_layout_with_error_messages() {
        let packet = request(10).encode().unwrap();
        assert_eq!(packet.len(), 37 + 20 + 16 + 7);
        assert_eq!(packet.template_length(), 1);
        assert_eq!(packet.get_u8(20), 1);
        assert_eq!(packet.get_u16(25), 0x1113);
        assert_eq!(packet.get_u32(27), 1200);
        assert_eq!(packet.get_u32(31), 26);
        assert_eq!(packet.get_u16(35), 0x1105);
        assert_eq!(packet.get_u16(57 + 4), 0x1104);
        assert_eq!(packet.get_u16(73 + 4), 0x1128);
        assert_eq!(packet.get_u8(73 + 6), 1);

        let back = SignonInfoRequest::decode(packet.as_bytes()).unwrap();
        assert_eq!(back.user_id, "USER");
        assert_eq!(back.credential.len(), 20);
        assert_eq!(back.server_level, 5);
    }

    #[test]
    fn test_old_server_level_omits_trailing_field() {
        let packet = request(4).encode().unwrap();
        assert_eq!(packet.len(), 37 + 20 + 16);
        assert!(packet.get_field(0x1128).is_none());
    }

    #[test]
    fn test_response_layout_and_round_trip() {
        let now = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 30, 5)
            .unwrap();
        let resp = SignonInfoResponse {
            rc: 0,
            current_signon_date: Some(now),
            last_signon_date: Some(now),
            password_expiration_date: Some(now + chrono::Duration::days(60)),
            expiration_warning: Some(7),
            server_ccsid: Some(37),
            user_id: Some("USER".into()),
        };
        let packet = resp.encode().unwrap();
        assert_eq!(packet.len(), 147);
        assert_eq!(packet.get_u16(79), 0x112C);
        assert_eq!(packet.get_u16(103), 0x1114);
        assert_eq!(packet.get_u16(135), 0x1104);

        let back = SignonInfoResponse::decode(packet.as_bytes()).unwrap();
        assert_eq!(back, resp);
    }

    #[test]
    fn test_failed_response_keeps_layout() {
        let resp = SignonInfoResponse {
            rc: 0x0002_0001,
            ..Default::default()
        };
        let back = SignonInfoResponse::decode(resp.encode().unwrap().as_bytes()).unwrap();
        assert_eq!(back.rc, 0x0002_0001);
        assert_eq!(back.current_signon_date, None);
        assert_eq!(back.server_ccsid, Some(0));
    }
}
