//! Bit packing for packet headers.
//!
//! Bits are written MSB first. A byte following `0xFF` only carries seven
//! bits, its top bit stays zero so no marker code can appear in a header.

use crate::error::EbcotError;

pub struct J2kBitReader<'a> {
    data: &'a [u8],
    pos: usize,
    bit_buffer: u32,
    bits_left: u8,
}

impl<'a> J2kBitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            bit_buffer: 0,
            bits_left: 0,
        }
    }

    fn byte_in(&mut self) -> Result<(), EbcotError> {
        self.bit_buffer = (self.bit_buffer << 8) & 0xFFFF;
        self.bits_left = if self.bit_buffer == 0xFF00 { 7 } else { 8 };
        let b = *self
            .data
            .get(self.pos)
            .ok_or(EbcotError::TruncatedPacketHeader)?;
        self.pos += 1;
        self.bit_buffer |= b as u32;
        Ok(())
    }

    pub fn read_bit(&mut self) -> Result<u8, EbcotError> {
        if self.bits_left == 0 {
            self.byte_in()?;
        }
        self.bits_left -= 1;
        Ok(((self.bit_buffer >> self.bits_left) & 1) as u8)
    }

    pub fn read_bits(&mut self, count: u32) -> Result<u32, EbcotError> {
        let mut bits = 0u32;
        for _ in 0..count {
            bits = (bits << 1) | self.read_bit()? as u32;
        }
        Ok(bits)
    }

    /// Skips the padding of the current byte, and the stuffed byte after a
    /// final `0xFF`.
    pub fn align(&mut self) -> Result<(), EbcotError> {
        self.bits_left = 0;
        if self.bit_buffer & 0xFF == 0xFF {
            self.byte_in()?;
            self.bits_left = 0;
        }
        Ok(())
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }
}

pub struct J2kBitWriter {
    data: Vec<u8>,
    bit_buffer: u32,
    bits_free: u8,
}

impl Default for J2kBitWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl J2kBitWriter {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            bit_buffer: 0,
            bits_free: 8,
        }
    }

    // The pending byte lives in the low half of the buffer; shifting it up
    // commits it.
    fn byte_out(&mut self) {
        self.bit_buffer = (self.bit_buffer << 8) & 0xFFFF;
        self.bits_free = if self.bit_buffer == 0xFF00 { 7 } else { 8 };
        self.data.push((self.bit_buffer >> 8) as u8);
    }

    pub fn write_bit(&mut self, bit: u8) {
        if self.bits_free == 0 {
            self.byte_out();
        }
        self.bits_free -= 1;
        self.bit_buffer |= ((bit & 1) as u32) << self.bits_free;
    }

    /// Writes the `count` low bits of `value`, MSB first.
    pub fn write_bits(&mut self, value: u32, count: u32) {
        for i in (0..count).rev() {
            self.write_bit(((value >> i) & 1) as u8);
        }
    }

    /// Pads the last byte with zeros; a header never ends on `0xFF`.
    pub fn finish(mut self) -> Vec<u8> {
        self.bits_free = 0;
        self.byte_out();
        if self.bits_free == 7 {
            self.bits_free = 0;
            self.byte_out();
        }
        self.data
    }
}
