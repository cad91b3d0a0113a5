//! ECP message codec (encode/decode)
//!
//! Both directions are bounds-checked: encoding refuses payloads the 16-bit
//! length field cannot declare, and decoding refuses frames whose declared
//! payload length exceeds the bytes actually received. Length fields taken
//! from the wire are never trusted as copy bounds.

use bytes::Bytes;

use super::{Error, HEADER_SIZE, MAX_PAYLOAD, Message, Result};

/// Encode a message to bytes
///
/// # Format
///
/// ```text
/// [CODE (1 byte)] [PAYLOAD LENGTH (2 bytes, big-endian)] [PAYLOAD]
/// ```
pub fn encode(message: &Message) -> Result<Vec<u8>> {
    let payload = message.payload();

    if payload.len() > MAX_PAYLOAD {
        return Err(Error::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }

    let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
    bytes.push(message.code());
    bytes.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    bytes.extend_from_slice(payload);

    Ok(bytes)
}

/// Decode a message from bytes
///
/// Trailing bytes beyond the declared payload length are ignored; a declared
/// length longer than the received buffer is rejected rather than over-read.
///
/// # Errors
///
/// Returns an error if:
/// - Buffer is shorter than the header
/// - Declared payload length exceeds the received bytes
pub fn decode(bytes: &[u8]) -> Result<Message> {
    if bytes.len() < HEADER_SIZE {
        return Err(Error::ResponseTooShort {
            needed: HEADER_SIZE,
            got: bytes.len(),
        });
    }

    let code = bytes[0];
    let declared = usize::from(u16::from_be_bytes([bytes[1], bytes[2]]));
    let received = bytes.len() - HEADER_SIZE;

    if declared > received {
        return Err(Error::TruncatedPayload { declared, received });
    }

    let payload = Bytes::copy_from_slice(&bytes[HEADER_SIZE..HEADER_SIZE + declared]);

    Ok(Message::from_parts(code, payload))
}
