//! Tagged-field codec
//!
//! Messages are a version byte followed by protobuf-style fields. A tag byte
//! is `(field_number << 3) | wire_type`, where wire type 0 is a LEB128 varint
//! and wire type 2 is a varint length followed by that many bytes.

use bytes::{Buf, BufMut};

use crate::errors::{ProtocolError, Result};

/// Wire type for varint fields
pub const WIRE_TYPE_VARINT: u8 = 0;

/// Wire type for length-delimited fields
pub const WIRE_TYPE_LENGTH_DELIMITED: u8 = 2;

/// Longest accepted varint (enough for `u32` values)
pub const MAX_VARINT_LENGTH: usize = 5;

/// Number of bytes `value` occupies as a varint.
pub fn varint_length(mut value: u64) -> usize {
    let mut length = 1;
    while value >= 0x80 {
        value >>= 7;
        length += 1;
    }
    length
}

/// Append `value` as a LEB128 varint.
pub fn put_varint(dst: &mut impl BufMut, mut value: u64) {
    while value >= 0x80 {
        dst.put_u8((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    dst.put_u8(value as u8);
}

/// Append a varint field.
pub fn put_varint_field(dst: &mut impl BufMut, tag: u8, value: u64) {
    debug_assert_eq!(tag & 0x07, WIRE_TYPE_VARINT);
    dst.put_u8(tag);
    put_varint(dst, value);
}

/// Append a length-delimited field.
pub fn put_bytes_field(dst: &mut impl BufMut, tag: u8, bytes: &[u8]) {
    debug_assert_eq!(tag & 0x07, WIRE_TYPE_LENGTH_DELIMITED);
    dst.put_u8(tag);
    put_varint(dst, bytes.len() as u64);
    dst.put_slice(bytes);
}

/// Cursor over an encoded message body.
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    /// Start reading at the beginning of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// True once every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        !self.buf.has_remaining()
    }

    /// Read one byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        if !self.buf.has_remaining() {
            return Err(ProtocolError::Truncated { expected: 1, actual: 0 });
        }
        Ok(self.buf.get_u8())
    }

    /// Read a LEB128 varint that fits in a `u32`.
    pub fn read_varint(&mut self) -> Result<u32> {
        let mut value: u64 = 0;
        for i in 0..MAX_VARINT_LENGTH {
            let byte = self.read_u8()?;
            value |= u64::from(byte & 0x7F) << (7 * i);
            if byte & 0x80 == 0 {
                return u32::try_from(value).map_err(|_| ProtocolError::InvalidVarint);
            }
        }
        Err(ProtocolError::InvalidVarint)
    }

    /// Read exactly `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.buf.len() < len {
            return Err(ProtocolError::Truncated { expected: len, actual: self.buf.len() });
        }
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    /// Read a varint length followed by that many bytes.
    pub fn read_length_delimited(&mut self) -> Result<&'a [u8]> {
        let len = self.read_varint()? as usize;
        self.read_bytes(len)
    }

    /// Read a length-delimited field that must be exactly `N` bytes.
    pub fn read_fixed<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N]> {
        let bytes = self.read_length_delimited()?;
        bytes.try_into().map_err(|_| ProtocolError::InvalidFieldLength {
            field,
            expected: N,
            actual: bytes.len(),
        })
    }

    /// Skip the value of a field whose tag has already been read.
    pub fn skip_field(&mut self, tag: u8) -> Result<()> {
        match tag & 0x07 {
            WIRE_TYPE_VARINT => self.read_varint().map(|_| ()),
            WIRE_TYPE_LENGTH_DELIMITED => self.read_length_delimited().map(|_| ()),
            _ => Err(ProtocolError::UnknownWireType(tag)),
        }
    }
}
