use crate::error::{Error, Result};
use crate::varint;

/// Little-endian cursor over a borrowed payload.
///
/// Positions are absolute offsets into the slice the reader was built
/// from, which keeps error offsets meaningful when a reader is pointed at
/// a blob in the middle of a larger payload.
pub struct LittleEndianReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> LittleEndianReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn at(bytes: &'a [u8], pos: usize) -> Self {
        Self { bytes, pos }
    }

    pub fn read_u8(&mut self, context: &'static str) -> Result<u8> {
        let byte = self.read_bytes(1, context)?;
        Ok(byte[0])
    }

    pub fn read_u32(&mut self, context: &'static str) -> Result<u32> {
        let bytes = self.read_array::<4>(context)?;
        Ok(u32::from_le_bytes(bytes))
    }

    pub fn read_f32(&mut self, context: &'static str) -> Result<f32> {
        let bytes = self.read_array::<4>(context)?;
        Ok(f32::from_le_bytes(bytes))
    }

    pub fn read_array<const N: usize>(&mut self, context: &'static str) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N, context)?);
        Ok(out)
    }

    pub fn read_bytes(&mut self, n: usize, context: &'static str) -> Result<&'a [u8]> {
        let available = self.remaining();
        if n > available {
            return Err(Error::TruncatedInput {
                offset: self.pos,
                needed: n,
                available,
                context,
            });
        }
        let out = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let (value, next) = varint::read_length_prefixed_string(self.bytes, self.pos)?;
        self.pos = next;
        Ok(value)
    }

    /// Reads a u32 LE count followed by that many length-prefixed strings.
    pub fn read_string_table(&mut self, context: &'static str) -> Result<Vec<String>> {
        let count_offset = self.pos;
        let count = self.read_u32(context)? as usize;

        // Every entry costs at least one length byte, so a count larger than
        // the rest of the buffer can only be garbage.
        if count > self.remaining() {
            return Err(Error::Malformed {
                offset: count_offset,
                context,
                message: format!(
                    "entry count {count} exceeds the {} remaining byte(s)",
                    self.remaining()
                ),
            });
        }

        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.read_string()?);
        }
        Ok(out)
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }
}
