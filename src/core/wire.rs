//! Big-endian primitive codec over a byte cursor.
//!
//! Every multi-byte integer on the Classic wire is network order. Readers fail with
//! [`ProtocolError::BufferUnderrun`] when a field is wider than what is left of the frame;
//! the dispatcher hands handlers complete frames, so an underrun always means a framing bug.

use crate::core::string::{FixedString, STRING_SIZE};
use crate::error::{ProtocolError, Result};
use bytes::{BufMut, Bytes, BytesMut};

/// Read cursor scoped to exactly one frame payload.
#[derive(Debug)]
pub struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes consumed so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    #[inline]
    fn take(&mut self, width: usize) -> Result<&'a [u8]> {
        if self.remaining() < width {
            return Err(ProtocolError::BufferUnderrun {
                needed: width,
                remaining: self.remaining(),
            });
        }
        let field = &self.data[self.pos..self.pos + width];
        self.pos += width;
        Ok(field)
    }

    #[inline]
    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.take_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    /// Borrow the next `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take(len)
    }

    /// Skip `len` bytes that are present on the wire but carry nothing.
    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }

    /// Read one 64-byte string field.
    pub fn read_string(&mut self) -> Result<FixedString> {
        let raw: [u8; STRING_SIZE] = self.take_array()?;
        Ok(FixedString::from_wire(&raw))
    }
}

/// Append-only writer used to build outgoing frames.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buf.put_u8(value);
        self
    }

    pub fn write_i8(&mut self, value: i8) -> &mut Self {
        self.buf.put_i8(value);
        self
    }

    pub fn write_u16(&mut self, value: u16) -> &mut Self {
        self.buf.put_u16(value);
        self
    }

    pub fn write_i16(&mut self, value: i16) -> &mut Self {
        self.buf.put_i16(value);
        self
    }

    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.buf.put_u32(value);
        self
    }

    pub fn write_i32(&mut self, value: i32) -> &mut Self {
        self.buf.put_i32(value);
        self
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> &mut Self {
        self.buf.put_slice(data);
        self
    }

    /// Write one 64-byte string field, escaping `&` and space-padding.
    pub fn write_string(&mut self, value: &str) -> &mut Self {
        self.buf.put_slice(&FixedString::encode(value));
        self
    }

    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_big_endian_layout() {
        let mut w = WireWriter::new();
        w.write_u16(0x0102).write_i32(-2).write_u8(7);
        let bytes = w.freeze();
        assert_eq!(&bytes[..], &[0x01, 0x02, 0xFF, 0xFF, 0xFF, 0xFE, 0x07]);

        let mut r = WireReader::new(&bytes);
        assert_eq!(r.read_u16().unwrap(), 0x0102);
        assert_eq!(r.read_i32().unwrap(), -2);
        assert_eq!(r.read_u8().unwrap(), 7);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_underrun_reports_widths() {
        let data = [0u8; 3];
        let mut r = WireReader::new(&data);
        match r.read_u32() {
            Err(ProtocolError::BufferUnderrun { needed, remaining }) => {
                assert_eq!(needed, 4);
                assert_eq!(remaining, 3);
            }
            other => panic!("Expected underrun, got {other:?}"),
        }
        // A failed read must not advance the cursor
        assert_eq!(r.position(), 0);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_signed_narrow_reads() {
        let data = [0x80, 0xFF, 0x7F];
        let mut r = WireReader::new(&data);
        assert_eq!(r.read_i8().unwrap(), -128);
        assert_eq!(r.read_i8().unwrap(), -1);
        assert_eq!(r.read_i8().unwrap(), 127);
    }
}
