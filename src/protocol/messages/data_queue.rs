//! Data queue attribute exchange.
//!
//! Request (26 bytes, template 6): client version u32 @20.
//! The host answers with an empty 0x8000 reply on success, or with a return
//! code reply (0x8002): rc u16 @20 and an optional CCSID 37 message
//! (length u32 @22 including a 6-byte header, text from @28).

use super::{ensure_len, expect_reply, id, RC_OFFSET};
use crate::core::packet::{Packet, FIELD_HEADER_LEN};
use crate::error::{ProtocolError, Result, Stage};
use crate::service::descriptor::DATA_QUEUE;
use crate::utils::ebcdic;

const REQUEST_LEN: usize = 26;
const REQUEST_TEMPLATE_LEN: u16 = 6;

/// Client version sent in the exchange
pub const CLIENT_VERSION: u32 = 1;

/// Shortest acceptable reply of either kind
pub const MIN_RESPONSE_LEN: usize = 22;
const MESSAGE_LENGTH_OFFSET: usize = 22;
const MESSAGE_OFFSET: usize = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataQueueExchangeAttributesRequest {
    pub client_version: u32,
}

impl Default for DataQueueExchangeAttributesRequest {
    fn default() -> Self {
        DataQueueExchangeAttributesRequest {
            client_version: CLIENT_VERSION,
        }
    }
}

impl DataQueueExchangeAttributesRequest {
    pub fn encode(&self) -> Result<Packet> {
        let mut packet = Packet::request(
            REQUEST_LEN,
            REQUEST_TEMPLATE_LEN,
            DATA_QUEUE.id,
            id::DATA_QUEUE_EXCHANGE_ATTRIBUTES,
        )?;
        packet.set_u32(self.client_version, 20);
        Ok(packet)
    }

    pub fn decode(frame: &[u8]) -> Result<Self> {
        ensure_len(frame, REQUEST_LEN, Stage::ExchangeAttributes)?;
        let packet = Packet::from_bytes(frame)?;
        expect_reply(&packet, id::DATA_QUEUE_EXCHANGE_ATTRIBUTES)?;
        Ok(DataQueueExchangeAttributesRequest {
            client_version: packet.get_u32(20),
        })
    }
}

/// Successful attribute exchange reply. It carries no data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataQueueExchangeAttributesResponse;

impl DataQueueExchangeAttributesResponse {
    pub fn encode(&self) -> Result<Packet> {
        Packet::request(
            MIN_RESPONSE_LEN,
            0,
            DATA_QUEUE.id,
            id::DATA_QUEUE_EXCHANGE_ATTRIBUTES,
        )
    }

    /// Decode the host's answer to the exchange.
    ///
    /// A return code reply becomes `ReturnCode`; any other reply id is
    /// `UnexpectedReply`.
    pub fn decode(frame: &[u8]) -> Result<Self> {
        ensure_len(frame, MIN_RESPONSE_LEN, Stage::ExchangeAttributes)?;
        let packet = Packet::from_bytes(frame)?;
        match packet.request_response_id() {
            id::DATA_QUEUE_EXCHANGE_ATTRIBUTES => Ok(DataQueueExchangeAttributesResponse),
            id::DATA_QUEUE_RETURN_CODE => {
                Err(DataQueueReturnCodeResponse::from_packet(&packet).into_error())
            }
            other => Err(ProtocolError::UnexpectedReply(other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataQueueReturnCodeResponse {
    pub rc: u16,
    pub message: Option<String>,
}

impl DataQueueReturnCodeResponse {
    pub fn encode(&self) -> Result<Packet> {
        let text = match &self.message {
            Some(message) => Some(ebcdic::encode(message)?),
            None => None,
        };
        let size = match &text {
            Some(text) => MESSAGE_OFFSET + text.len(),
            None => MIN_RESPONSE_LEN,
        };
        let mut packet = Packet::request(size, 0, DATA_QUEUE.id, id::DATA_QUEUE_RETURN_CODE)?;
        packet.set_u16(self.rc, RC_OFFSET);
        if let Some(text) = text {
            packet.set_u32((text.len() + FIELD_HEADER_LEN) as u32, MESSAGE_LENGTH_OFFSET);
            packet.write_bytes(&text, MESSAGE_OFFSET);
        }
        Ok(packet)
    }

    pub fn decode(frame: &[u8]) -> Result<Self> {
        ensure_len(frame, MIN_RESPONSE_LEN, Stage::ExchangeAttributes)?;
        let packet = Packet::from_bytes(frame)?;
        expect_reply(&packet, id::DATA_QUEUE_RETURN_CODE)?;
        Ok(Self::from_packet(&packet))
    }

    fn from_packet(packet: &Packet) -> Self {
        let bytes = packet.as_bytes();
        let message = if bytes.len() >= MESSAGE_OFFSET {
            let declared = packet.get_u32(MESSAGE_LENGTH_OFFSET) as usize;
            let end = MESSAGE_OFFSET + declared.saturating_sub(FIELD_HEADER_LEN);
            // A declared length past the frame is clipped to what arrived.
            let text = &bytes[MESSAGE_OFFSET..end.min(bytes.len())];
            Some(ebcdic::decode_trimmed(text))
        } else {
            None
        };
        DataQueueReturnCodeResponse {
            rc: packet.get_u16(RC_OFFSET),
            message,
        }
    }

    /// The error this reply stands for.
    pub fn into_error(self) -> ProtocolError {
        let message = self
            .message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("Data queue server returned {:#06x}", self.rc));
        ProtocolError::ReturnCode {
            code: u32::from(self.rc),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_layout() {
        let packet = DataQueueExchangeAttributesRequest::default().encode().unwrap();
        assert_eq!(packet.len(), 26);
        assert_eq!(packet.service_id(), 0xE007);
        assert_eq!(packet.template_length(), 6);
        assert_eq!(packet.request_response_id(), 0x8000);
        assert_eq!(packet.get_u32(20), 1);
    }

    #[test]
    fn test_ok_reply() {
        let frame = DataQueueExchangeAttributesResponse.encode().unwrap();
        assert_eq!(frame.len(), 22);
        assert!(DataQueueExchangeAttributesResponse::decode(frame.as_bytes()).is_ok());
    }

    #[test]
    fn test_return_code_reply_with_message() {
        let reply = DataQueueReturnCodeResponse {
            rc: 0xF001,
            message: Some("Queue not found".into()),
        };
        let frame = reply.encode().unwrap();
        assert_eq!(frame.len(), 28 + 15);

        let back = DataQueueReturnCodeResponse::decode(frame.as_bytes()).unwrap();
        assert_eq!(back, reply);

        let err = DataQueueExchangeAttributesResponse::decode(frame.as_bytes()).unwrap_err();
        assert_eq!(err.return_code_value(), Some(0xF001));
        assert!(err.to_string().contains("Queue not found"));
    }

    #[test]
    fn test_return_code_reply_without_message() {
        let reply = DataQueueReturnCodeResponse {
            rc: 0x0100,
            message: None,
        };
        let err = DataQueueExchangeAttributesResponse::decode(reply.encode().unwrap().as_bytes())
            .unwrap_err();
        assert_eq!(err.return_code_value(), Some(0x0100));
    }

    #[test]
    fn test_other_reply_and_short_frame() {
        let other = Packet::request(22, 0, 0xE007, 0x8123).unwrap();
        assert!(matches!(
            DataQueueExchangeAttributesResponse::decode(other.as_bytes()),
            Err(ProtocolError::UnexpectedReply(0x8123))
        ));
        assert!(matches!(
            DataQueueExchangeAttributesResponse::decode(&[0u8; 21]),
            Err(ProtocolError::Framing { expected: 22, actual: 21, .. })
        ));
    }
}
