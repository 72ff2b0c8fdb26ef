//! Little-endian byte writer and reader with MSB-first bit packing.
//!
//! Bits accumulate into a pending byte that is flushed on [`WireWriter::flush_bits`]
//! or automatically before the next whole-byte write. The reader mirrors that:
//! any whole-byte read discards what is left of a partially read bit byte.

use crate::error::DecodeError;
use crate::types::ObjectGuid;
use bytes::{Buf, BufMut, Bytes, BytesMut};

#[derive(Debug, Default)]
pub struct WireWriter {
    buf: BytesMut,
    pending: u8,
    pending_bits: u8,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Bytes written so far, not counting pending bits.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty() && self.pending_bits == 0
    }

    pub fn put_bit(&mut self, bit: bool) {
        if bit {
            self.pending |= 1 << (7 - self.pending_bits);
        }
        self.pending_bits += 1;
        if self.pending_bits == 8 {
            self.flush_bits();
        }
    }

    /// Writes the low `count` bits of `value`, most significant first.
    pub fn put_bits(&mut self, value: u32, count: u8) {
        for shift in (0..count).rev() {
            self.put_bit(value >> shift & 1 != 0);
        }
    }

    pub fn flush_bits(&mut self) {
        if self.pending_bits == 0 {
            return;
        }
        self.buf.put_u8(self.pending);
        self.pending = 0;
        self.pending_bits = 0;
    }

    pub fn put_u8(&mut self, value: u8) {
        self.flush_bits();
        self.buf.put_u8(value);
    }

    pub fn put_i8(&mut self, value: i8) {
        self.flush_bits();
        self.buf.put_i8(value);
    }

    pub fn put_u16(&mut self, value: u16) {
        self.flush_bits();
        self.buf.put_u16_le(value);
    }

    pub fn put_u32(&mut self, value: u32) {
        self.flush_bits();
        self.buf.put_u32_le(value);
    }

    pub fn put_u64(&mut self, value: u64) {
        self.flush_bits();
        self.buf.put_u64_le(value);
    }

    pub fn put_i64(&mut self, value: i64) {
        self.flush_bits();
        self.buf.put_i64_le(value);
    }

    pub fn put_f32(&mut self, value: f32) {
        self.flush_bits();
        self.buf.put_f32_le(value);
    }

    pub fn put_slice(&mut self, bytes: &[u8]) {
        self.flush_bits();
        self.buf.put_slice(bytes);
    }

    /// One mask byte followed by the non-zero bytes of the GUID, low byte first.
    pub fn put_packed_guid(&mut self, guid: ObjectGuid) {
        self.flush_bits();
        let raw = guid.raw().to_le_bytes();
        let mut mask = 0u8;
        for (index, byte) in raw.iter().enumerate() {
            if *byte != 0 {
                mask |= 1 << index;
            }
        }
        self.buf.put_u8(mask);
        for byte in raw.iter().filter(|byte| **byte != 0) {
            self.buf.put_u8(*byte);
        }
    }

    pub fn into_bytes(mut self) -> Bytes {
        self.flush_bits();
        self.buf.freeze()
    }
}

#[derive(Debug, Clone)]
pub struct WireReader {
    buf: Bytes,
    current: u8,
    bits_left: u8,
}

impl WireReader {
    pub fn new(buf: Bytes) -> Self {
        Self {
            buf,
            current: 0,
            bits_left: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn is_empty(&self) -> bool {
        !self.buf.has_remaining()
    }

    fn need(&mut self, bytes: usize, what: &'static str) -> Result<(), DecodeError> {
        self.bits_left = 0;
        if self.buf.remaining() < bytes {
            return Err(DecodeError::Truncated(what));
        }
        Ok(())
    }

    pub fn bit(&mut self) -> Result<bool, DecodeError> {
        if self.bits_left == 0 {
            if !self.buf.has_remaining() {
                return Err(DecodeError::Truncated("bit"));
            }
            self.current = self.buf.get_u8();
            self.bits_left = 8;
        }
        self.bits_left -= 1;
        Ok(self.current >> self.bits_left & 1 != 0)
    }

    pub fn bits(&mut self, count: u8) -> Result<u32, DecodeError> {
        let mut value = 0u32;
        for _ in 0..count {
            value = value << 1 | self.bit()? as u32;
        }
        Ok(value)
    }

    pub fn u8(&mut self, what: &'static str) -> Result<u8, DecodeError> {
        self.need(1, what)?;
        Ok(self.buf.get_u8())
    }

    pub fn i8(&mut self, what: &'static str) -> Result<i8, DecodeError> {
        self.need(1, what)?;
        Ok(self.buf.get_i8())
    }

    pub fn u16(&mut self, what: &'static str) -> Result<u16, DecodeError> {
        self.need(2, what)?;
        Ok(self.buf.get_u16_le())
    }

    pub fn u32(&mut self, what: &'static str) -> Result<u32, DecodeError> {
        self.need(4, what)?;
        Ok(self.buf.get_u32_le())
    }

    pub fn u64(&mut self, what: &'static str) -> Result<u64, DecodeError> {
        self.need(8, what)?;
        Ok(self.buf.get_u64_le())
    }

    pub fn i64(&mut self, what: &'static str) -> Result<i64, DecodeError> {
        self.need(8, what)?;
        Ok(self.buf.get_i64_le())
    }

    pub fn f32(&mut self, what: &'static str) -> Result<f32, DecodeError> {
        self.need(4, what)?;
        Ok(self.buf.get_f32_le())
    }

    pub fn bytes(&mut self, len: usize, what: &'static str) -> Result<Bytes, DecodeError> {
        self.need(len, what)?;
        Ok(self.buf.split_to(len))
    }

    pub fn packed_guid(&mut self, what: &'static str) -> Result<ObjectGuid, DecodeError> {
        let mask = self.u8(what)?;
        let mut raw = [0u8; 8];
        for (index, byte) in raw.iter_mut().enumerate() {
            if mask & 1 << index != 0 {
                *byte = self.u8(what)?;
            }
        }
        Ok(ObjectGuid(u64::from_le_bytes(raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HighGuid;

    #[test]
    fn packed_guid_skips_zero_bytes() {
        let guid = ObjectGuid::create(HighGuid::Creature, 0, 0x0102);
        let mut writer = WireWriter::new();
        writer.put_packed_guid(guid);
        let bytes = writer.into_bytes();
        let non_zero = guid.raw().to_le_bytes().iter().filter(|b| **b != 0).count();
        assert_eq!(bytes.len(), 1 + non_zero);

        let mut reader = WireReader::new(bytes);
        assert_eq!(reader.packed_guid("guid").unwrap(), guid);
        assert!(reader.is_empty());
    }

    #[test]
    fn bits_pack_msb_first_and_flush_before_bytes() {
        let mut writer = WireWriter::new();
        writer.put_bit(true);
        writer.put_bits(0b01, 2);
        writer.put_u8(0xFF);
        let bytes = writer.into_bytes();
        assert_eq!(&bytes[..], &[0b1010_0000, 0xFF]);

        let mut reader = WireReader::new(bytes);
        assert!(reader.bit().unwrap());
        assert_eq!(reader.bits(2).unwrap(), 0b01);
        assert_eq!(reader.u8("byte").unwrap(), 0xFF);
    }

    #[test]
    fn truncated_input_names_the_missing_part() {
        let mut reader = WireReader::new(Bytes::from_static(&[1, 2]));
        assert_eq!(reader.u32("slot value"), Err(DecodeError::Truncated("slot value")));
    }
}
