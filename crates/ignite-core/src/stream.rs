//! `Stream` — a growable byte buffer with a read/write cursor.
//!
//! Knows only position arithmetic and endianness; nothing here understands
//! the tagged value system built on top of it in `codec`. All multi-byte
//! primitives are little-endian except where a caller explicitly asks for
//! big-endian (used only by UUID encoding, per the wire contract).

use crate::error::CodecError;

/// A byte buffer paired with a read cursor. Writes always append; reads
/// advance `pos` and fail with `Truncated` rather than panicking when they
/// would cross the end of the buffer.
#[derive(Debug, Default, Clone)]
pub struct Stream {
    buf: Vec<u8>,
    pos: usize,
}

impl Stream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
            pos: 0,
        }
    }

    /// Wrap an already-received frame body for decoding. Position starts at 0.
    pub fn from_vec(buf: Vec<u8>) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    // ---- writes (always append to the end of the buffer) ----

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_i8(&mut self, v: i8) {
        self.buf.push(v as u8);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buf.push(if v { 1 } else { 0 });
    }

    pub fn write_i16_le(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u16_le(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_i32_le(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_i64_le(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_f32_le(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_f64_le(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    // ---- reads (advance pos, fail rather than panic) ----

    fn take(&mut self, n: usize) -> Result<&[u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::Truncated {
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn peek_u8(&self) -> Result<u8, CodecError> {
        if self.remaining() < 1 {
            return Err(CodecError::Truncated {
                needed: 1,
                available: 0,
            });
        }
        Ok(self.buf[self.pos])
    }

    pub fn read_i8(&mut self) -> Result<i8, CodecError> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn read_bool(&mut self) -> Result<bool, CodecError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_i16_le(&mut self) -> Result<i16, CodecError> {
        let b = self.take(2)?;
        Ok(i16::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn read_u16_le(&mut self) -> Result<u16, CodecError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn read_i32_le(&mut self) -> Result<i32, CodecError> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn read_i64_le(&mut self) -> Result<i64, CodecError> {
        let b = self.take(8)?;
        Ok(i64::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn read_f32_le(&mut self) -> Result<f32, CodecError> {
        let b = self.take(4)?;
        Ok(f32::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn read_f64_le(&mut self) -> Result<f64, CodecError> {
        let b = self.take(8)?;
        Ok(f64::from_le_bytes(b.try_into().unwrap()))
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, CodecError> {
        Ok(self.take(n)?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let mut s = Stream::new();
        s.write_u8(0xab);
        s.write_i32_le(-12345);
        s.write_i64_le(i64::MIN);
        s.write_bytes(b"hello");

        let mut r = Stream::from_vec(s.into_vec());
        assert_eq!(r.read_u8().unwrap(), 0xab);
        assert_eq!(r.read_i32_le().unwrap(), -12345);
        assert_eq!(r.read_i64_le().unwrap(), i64::MIN);
        assert_eq!(r.read_bytes(5).unwrap(), b"hello");
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn read_past_end_is_truncated() {
        let mut r = Stream::from_vec(vec![1, 2]);
        assert!(r.read_i32_le().is_err());
    }

    #[test]
    fn peek_does_not_advance() {
        let mut r = Stream::from_vec(vec![0x42]);
        assert_eq!(r.peek_u8().unwrap(), 0x42);
        assert_eq!(r.position(), 0);
        assert_eq!(r.read_u8().unwrap(), 0x42);
        assert_eq!(r.position(), 1);
    }
}
