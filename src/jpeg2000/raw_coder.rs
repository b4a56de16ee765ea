//! Raw (bypass) bit reader for lazy-mode segments.
//!
//! Raw segments carry significance and refinement bits without arithmetic
//! coding. A byte following `0xFF` holds only seven bits. Reading past the end
//! of the segment yields the bits of synthesized `0xFF` bytes.

pub struct RawDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    c: u32,
    ct: u32,
}

impl<'a> RawDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            c: 0,
            ct: 0,
        }
    }

    #[inline]
    pub fn decode(&mut self) -> u32 {
        if self.ct == 0 {
            let byte = self.data.get(self.pos).copied().unwrap_or(0xFF) as u32;
            if self.c == 0xFF {
                if byte > 0x8F {
                    self.c = 0xFF;
                    self.ct = 8;
                } else {
                    self.c = byte;
                    self.pos += 1;
                    self.ct = 7;
                }
            } else {
                self.c = byte;
                if self.pos < self.data.len() {
                    self.pos += 1;
                }
                self.ct = 8;
            }
        }
        self.ct -= 1;
        (self.c >> self.ct) & 1
    }

    pub fn position(&self) -> usize {
        self.pos
    }
}
