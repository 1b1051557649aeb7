//! Minimal tolerant reader for the protobuf wire format.
//!
//! # Responsibility
//! - Iterate `(field number, value)` pairs of one length-delimited message.
//! - Let callers skip field numbers they do not recognize.
//!
//! # Invariants
//! - Unknown field numbers are the caller's business; only structural
//!   damage (truncation, bad varints, group wire types) is an error.
//!
//! The blob schema is reverse-engineered and versioned by someone else, so
//! no codegen: the reader exposes raw fields and the decoder matches them
//! against a configurable layout.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// One decoded field value, borrowing from the message buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireValue<'a> {
    Varint(u64),
    Fixed64(u64),
    Bytes(&'a [u8]),
    Fixed32(u32),
}

impl<'a> WireValue<'a> {
    /// Varint payload, when this field carries one.
    pub fn as_varint(&self) -> Option<u64> {
        match self {
            Self::Varint(v) => Some(*v),
            _ => None,
        }
    }

    /// Length-delimited payload, when this field carries one.
    pub fn as_bytes(&self) -> Option<&'a [u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Length-delimited payload decoded as UTF-8, lossily.
    pub fn as_lossy_str(&self) -> Option<String> {
        self.as_bytes()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum WireError {
    /// The buffer ended inside a tag, varint, or payload.
    Truncated,
    /// A varint ran past the 64-bit limit.
    VarintOverflow,
    /// Deprecated group wire types or reserved values.
    UnsupportedWireType(u8),
}

impl Display for WireError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Truncated => write!(f, "message truncated"),
            Self::VarintOverflow => write!(f, "varint exceeds 64 bits"),
            Self::UnsupportedWireType(wt) => write!(f, "unsupported wire type {wt}"),
        }
    }
}

impl Error for WireError {}

/// Forward-only field iterator over one message buffer.
pub struct MessageReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> MessageReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Reads the next field, or `None` at a clean end of buffer.
    pub fn next_field(&mut self) -> Result<Option<(u32, WireValue<'a>)>, WireError> {
        if self.pos >= self.buf.len() {
            return Ok(None);
        }
        let tag = self.read_varint()?;
        let field = (tag >> 3) as u32;
        let wire_type = (tag & 0x7) as u8;
        let value = match wire_type {
            0 => WireValue::Varint(self.read_varint()?),
            1 => WireValue::Fixed64(u64::from_le_bytes(
                self.read_exact(8)?.try_into().expect("8-byte slice"),
            )),
            2 => {
                let len = self.read_varint()? as usize;
                WireValue::Bytes(self.read_exact(len)?)
            }
            5 => WireValue::Fixed32(u32::from_le_bytes(
                self.read_exact(4)?.try_into().expect("4-byte slice"),
            )),
            other => return Err(WireError::UnsupportedWireType(other)),
        };
        Ok(Some((field, value)))
    }

    /// Returns the first length-delimited payload of `field`, if any.
    pub fn find_bytes(buf: &'a [u8], field: u32) -> Result<Option<&'a [u8]>, WireError> {
        let mut reader = Self::new(buf);
        while let Some((number, value)) = reader.next_field()? {
            if number == field {
                if let Some(bytes) = value.as_bytes() {
                    return Ok(Some(bytes));
                }
            }
        }
        Ok(None)
    }

    fn read_varint(&mut self) -> Result<u64, WireError> {
        let mut value: u64 = 0;
        let mut shift = 0u32;
        loop {
            let byte = *self.buf.get(self.pos).ok_or(WireError::Truncated)?;
            self.pos += 1;
            if shift >= 64 {
                return Err(WireError::VarintOverflow);
            }
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    fn read_exact(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        let end = self.pos.checked_add(len).ok_or(WireError::Truncated)?;
        if end > self.buf.len() {
            return Err(WireError::Truncated);
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}

#[cfg(test)]
mod tests {
    use super::{MessageReader, WireError, WireValue};

    #[test]
    fn reads_varint_and_bytes_fields() {
        // field 1 varint 300, field 2 bytes "hi"
        let buf = [0x08, 0xac, 0x02, 0x12, 0x02, b'h', b'i'];
        let mut reader = MessageReader::new(&buf);
        assert_eq!(
            reader.next_field().unwrap(),
            Some((1, WireValue::Varint(300)))
        );
        let (field, value) = reader.next_field().unwrap().unwrap();
        assert_eq!(field, 2);
        assert_eq!(value.as_lossy_str().as_deref(), Some("hi"));
        assert_eq!(reader.next_field().unwrap(), None);
    }

    #[test]
    fn truncated_payload_is_an_error() {
        // field 1 bytes claiming 5 bytes, only 1 present
        let buf = [0x0a, 0x05, b'x'];
        let mut reader = MessageReader::new(&buf);
        assert_eq!(reader.next_field().unwrap_err(), WireError::Truncated);
    }

    #[test]
    fn group_wire_types_are_rejected() {
        let buf = [0x0b];
        let mut reader = MessageReader::new(&buf);
        assert_eq!(
            reader.next_field().unwrap_err(),
            WireError::UnsupportedWireType(3)
        );
    }

    #[test]
    fn find_bytes_skips_other_fields() {
        // field 1 varint 1, field 3 bytes "ok"
        let buf = [0x08, 0x01, 0x1a, 0x02, b'o', b'k'];
        let found = MessageReader::find_bytes(&buf, 3).unwrap().unwrap();
        assert_eq!(found, b"ok");
        assert_eq!(MessageReader::find_bytes(&buf, 7).unwrap(), None);
    }
}
