//! Low-level NDN TLV primitives.
//!
//! Every field in an NDN packet is a Type-Length-Value triple. Types here
//! are a single octet; lengths use the shortest of three encodings, where
//! the first octet either carries the value directly or is a 253/254
//! marker announcing a wider 16- or 32-bit big-endian field.

use crate::error::Error;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// NDN TLV packet types
pub const TLV_INTEREST: u8 = 0x05;
pub const TLV_DATA: u8 = 0x06;
pub const TLV_NAME: u8 = 0x07;
pub const TLV_COMPONENT: u8 = 0x08;
pub const TLV_NONCE: u8 = 0x0A;
pub const TLV_INTEREST_LIFETIME: u8 = 0x0C;
pub const TLV_MUST_BE_FRESH: u8 = 0x12;
pub const TLV_CAN_BE_PREFIX: u8 = 0x21;
pub const TLV_HOP_LIMIT: u8 = 0x22;
pub const TLV_META_INFO: u8 = 0x14;
pub const TLV_CONTENT: u8 = 0x15;
pub const TLV_SIGNATURE_INFO: u8 = 0x16;
pub const TLV_SIGNATURE_VALUE: u8 = 0x17;
pub const TLV_CONTENT_TYPE: u8 = 0x18;
pub const TLV_FRESHNESS_PERIOD: u8 = 0x19;
pub const TLV_SIGNATURE_TYPE: u8 = 0x1B;
pub const TLV_KEY_LOCATOR: u8 = 0x1C;

/// NFD management TLV types (ControlResponse)
pub const TLV_CONTROL_RESPONSE: u8 = 0x65;
pub const TLV_STATUS_CODE: u8 = 0x66;
pub const TLV_STATUS_TEXT: u8 = 0x67;

/// Writes a type octet. Multi-byte TLV types never appear in the packets
/// this router handles, so one byte is all that gets emitted.
pub fn encode_tlv_type(tlv_type: u8, buf: &mut BytesMut) {
    buf.put_u8(tlv_type);
}

/// Writes a length field using the narrowest encoding that fits: a bare
/// octet below 253, otherwise a 253 or 254 marker followed by the 16- or
/// 32-bit value.
pub fn encode_tlv_length(length: usize, buf: &mut BytesMut) {
    if length < 253 {
        buf.put_u8(length as u8);
    } else if length <= 65535 {
        buf.put_u8(253);
        buf.put_u16(length as u16);
    } else {
        buf.put_u8(254);
        buf.put_u32(length as u32);
    }
}

/// Reads a type octet.
pub fn decode_tlv_type(buf: &mut impl Buf) -> Result<u8, Error> {
    if !buf.has_remaining() {
        return Err(Error::Tlv("type field missing".into()));
    }
    Ok(buf.get_u8())
}

/// Reads a length field, widening through the 253/254 markers as needed.
pub fn decode_tlv_length(buf: &mut impl Buf) -> Result<usize, Error> {
    if !buf.has_remaining() {
        return Err(Error::Tlv("length field missing".into()));
    }

    let first_byte = buf.get_u8();

    match first_byte {
        // The octet is the length itself.
        0..=252 => Ok(first_byte as usize),

        // 16-bit length follows.
        253 => {
            if buf.remaining() < 2 {
                return Err(Error::Tlv(
                    "length marker 253 with fewer than 2 bytes behind it".into(),
                ));
            }
            Ok(buf.get_u16() as usize)
        }

        // 32-bit length follows.
        254 => {
            if buf.remaining() < 4 {
                return Err(Error::Tlv(
                    "length marker 254 with fewer than 4 bytes behind it".into(),
                ));
            }
            Ok(buf.get_u32() as usize)
        }

        // Marker 255 would mean an 8-byte length; nothing this router
        // carries comes close, so treat it as garbage.
        255 => Err(Error::Tlv("8-byte TLV lengths are not handled".into())),
    }
}

/// Encodes a non-negative integer using the shortest of 1, 2, 4 or 8 bytes.
pub fn encode_nonneg_int(value: u64, buf: &mut BytesMut) {
    if value <= u8::MAX as u64 {
        buf.put_u8(value as u8);
    } else if value <= u16::MAX as u64 {
        buf.put_u16(value as u16);
    } else if value <= u32::MAX as u64 {
        buf.put_u32(value as u32);
    } else {
        buf.put_u64(value);
    }
}

/// Decodes a non-negative integer from a 1, 2, 4 or 8 byte big-endian value.
pub fn decode_nonneg_int(bytes: &[u8]) -> Result<u64, Error> {
    match bytes.len() {
        1 => Ok(bytes[0] as u64),
        2 => Ok(u16::from_be_bytes([bytes[0], bytes[1]]) as u64),
        4 => Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64),
        8 => Ok(u64::from_be_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ])),
        n => Err(Error::Tlv(format!(
            "a non-negative integer cannot be {} bytes wide",
            n
        ))),
    }
}

/// One decoded TLV: its type octet and the raw value bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct TlvElement {
    pub tlv_type: u8,
    pub value: Bytes,
}

impl TlvElement {
    /// Pairs a type with its value bytes.
    pub fn new(tlv_type: u8, value: impl Into<Bytes>) -> Self {
        Self {
            tlv_type,
            value: value.into(),
        }
    }

    /// Size of this element once encoded, header included.
    pub fn len(&self) -> usize {
        let value_len = self.value.len();
        1 + tlv_length_size(value_len) + value_len
    }

    /// Returns true if the element carries an empty value.
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Appends the element, header first, to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        encode_tlv_type(self.tlv_type, buf);
        encode_tlv_length(self.value.len(), buf);
        buf.extend_from_slice(&self.value);
    }

    /// Reads one element off the front of `buf`.
    pub fn decode(buf: &mut impl Buf) -> Result<Self, Error> {
        if buf.remaining() < 2 {
            return Err(Error::Tlv("truncated TLV header".into()));
        }

        let tlv_type = decode_tlv_type(buf)?;
        let length = decode_tlv_length(buf)?;

        if buf.remaining() < length {
            return Err(Error::Tlv(format!(
                "value announced as {} bytes with only {} left in the buffer",
                length,
                buf.remaining()
            )));
        }

        let value = buf.copy_to_bytes(length);

        Ok(Self { tlv_type, value })
    }
}

/// How many bytes the length field itself will occupy.
pub(crate) fn tlv_length_size(length: usize) -> usize {
    if length < 253 {
        1
    } else if length <= 65535 {
        3
    } else {
        5
    }
}
