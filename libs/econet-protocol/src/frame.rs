//! ecoNET frame codec
//!
//! Byte layout of one frame:
//!
//! ```text
//! 0x68 | len (LE16) | dest (LE16) | src (LE16) | func | payload | CRC (BE16) | 0x16
//! ```
//!
//! `len` counts dest + src + func + payload, the CRC covers len through payload.

use bytes::{BufMut, BytesMut};

use crate::constants::{
    FRAME_OVERHEAD, HEADER_LEN, MAX_PAYLOAD_LEN, RESPONSE_FLAG, START_BYTE, STOP_BYTE,
};
use crate::crc::crc16;
use crate::error::{ProtocolError, Result};

/// One protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub dest: u16,
    pub src: u16,
    pub func: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(dest: u16, src: u16, func: u8, payload: Vec<u8>) -> Self {
        Self {
            dest,
            src,
            func,
            payload,
        }
    }

    /// Function code a device answers `func` with
    pub fn response_function(func: u8) -> u8 {
        func | RESPONSE_FLAG
    }

    /// True when this frame answers a request sent with `request_func`
    pub fn is_response_to(&self, request_func: u8) -> bool {
        self.func == Self::response_function(request_func)
    }

    /// Serialize to wire bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode(self.dest, self.src, self.func, &self.payload)
    }

    /// Value of the length field for this frame
    pub fn length_field(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }
}

/// Build the wire representation of a frame
pub fn encode(dest: u16, src: u16, func: u8, payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::encode(format!(
            "payload of {} bytes exceeds the {} byte limit",
            payload.len(),
            MAX_PAYLOAD_LEN
        )));
    }
    let length = (HEADER_LEN + payload.len()) as u16;

    let mut buf = BytesMut::with_capacity(payload.len() + HEADER_LEN + FRAME_OVERHEAD);
    buf.put_u8(START_BYTE);
    buf.put_u16_le(length);
    buf.put_u16_le(dest);
    buf.put_u16_le(src);
    buf.put_u8(func);
    buf.put_slice(payload);

    let crc = crc16(&buf[1..]);
    buf.put_u16(crc);
    buf.put_u8(STOP_BYTE);

    Ok(buf.to_vec())
}

/// Split a frame body (dest, src, func, payload) into fields
///
/// Structural only: CRC and delimiters are checked by the reassembler.
pub fn decode(body: &[u8]) -> Result<Frame> {
    if body.len() < HEADER_LEN {
        return Err(ProtocolError::decode(format!(
            "frame body needs {} bytes, got {}",
            HEADER_LEN,
            body.len()
        )));
    }

    Ok(Frame {
        dest: u16::from_le_bytes([body[0], body[1]]),
        src: u16::from_le_bytes([body[2], body[3]]),
        func: body[4],
        payload: body[HEADER_LEN..].to_vec(),
    })
}
