use fip_types::{EncodeError, Reader, Writer};

use crate::constants::{FIP_MAX_PAYLOAD, FIP_MSG_SIZE};
use crate::message::Message;

/// Encodes `msg` into `buf`: zeroes it, reserves the 4-byte length prefix,
/// writes `message_type` + the variant body, then back-patches the prefix.
///
/// Returns the total number of bytes written (`L + 4`), always `<=
/// FIP_MSG_SIZE`. This is the "Encoder contract" from `spec.md` §4.3.
pub fn encode_frame(msg: &Message, buf: &mut [u8; FIP_MSG_SIZE]) -> Result<usize, EncodeError> {
    buf.fill(0);
    let mut w = Writer::new(buf);
    w.write_u32_le(0)?;
    msg.encode(&mut w)?;
    let total = w.position();
    let payload_len = total - 4;
    if payload_len == 0 || payload_len > FIP_MAX_PAYLOAD {
        return Err(EncodeError::BufferTooSmall);
    }
    buf[0..4].copy_from_slice(&(payload_len as u32).to_le_bytes());
    Ok(total)
}

/// Decodes a message from a raw payload (the `L` bytes after the length
/// prefix has already been validated and stripped off by the transport
/// layer). Never fails: any structural problem degrades to
/// [`Message::Unknown`] per the "Decoder contract" in `spec.md` §4.3.
pub fn decode_frame(payload: &[u8]) -> Message {
    let mut r = Reader::new(payload);
    let type_tag = match r.read_u8() {
        Ok(t) => t,
        Err(_) => return Message::Unknown,
    };
    Message::decode(type_tag, &mut r)
}
