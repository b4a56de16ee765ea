//! MQ Arithmetic Coder (ISO/IEC 15444-1 Annex C)
//!
//! The encoder follows the software conventions of Annex C: the byte cursor
//! starts on a sentinel position in front of the output, carries are
//! propagated into the previously emitted byte, and a byte following `0xFF`
//! only carries seven bits. The raw (bypass) packer used by the lazy mode
//! shares the encoder's output buffer so that MQ and raw segments of one
//! code-block form a single byte string.

use log::trace;

use crate::constants::{
    CONTEXT_COUNT, RUN_LENGTH_INITIAL_STATE, UNIFORM_INITIAL_STATE, ZERO_CODING_INITIAL_STATE,
};
use crate::error::EbcotError;
use crate::jpeg2000::context::Context;

#[derive(Clone, Copy)]
struct MqContextState {
    qe: u16,
    nmps: u8,
    nlps: u8,
    switch: bool,
}

macro_rules! s {
    ($qe:expr, $nmps:expr, $nlps:expr, $sw:expr) => {
        MqContextState {
            qe: $qe,
            nmps: $nmps,
            nlps: $nlps,
            switch: $sw != 0,
        }
    };
}

// Standard Table C-2 (Qe, NMPS, NLPS, SWITCH)
#[rustfmt::skip]
const MQ_TABLE: [MqContextState; 47] = [
    s!(0x5601, 1, 1, 1),   s!(0x3401, 2, 6, 0),   s!(0x1801, 3, 9, 0),   s!(0x0AC1, 4, 12, 0),
    s!(0x0521, 5, 29, 0),  s!(0x0221, 38, 33, 0), s!(0x5601, 7, 6, 1),   s!(0x5401, 8, 14, 0),
    s!(0x4801, 9, 14, 0),  s!(0x3801, 10, 14, 0), s!(0x3001, 11, 17, 0), s!(0x2401, 12, 18, 0),
    s!(0x1C01, 13, 20, 0), s!(0x1601, 29, 21, 0), s!(0x5601, 15, 14, 1), s!(0x5401, 16, 14, 0),
    s!(0x5101, 17, 15, 0), s!(0x4801, 18, 16, 0), s!(0x3801, 19, 17, 0), s!(0x3401, 20, 18, 0),
    s!(0x3001, 21, 19, 0), s!(0x2801, 22, 19, 0), s!(0x2401, 23, 20, 0), s!(0x2201, 24, 21, 0),
    s!(0x1C01, 25, 22, 0), s!(0x1801, 26, 23, 0), s!(0x1601, 27, 24, 0), s!(0x1401, 28, 25, 0),
    s!(0x1201, 29, 26, 0), s!(0x1101, 30, 27, 0), s!(0x0AC1, 31, 28, 0), s!(0x09C1, 32, 29, 0),
    s!(0x08A1, 33, 30, 0), s!(0x0521, 34, 31, 0), s!(0x0441, 35, 32, 0), s!(0x02A1, 36, 33, 0),
    s!(0x0221, 37, 34, 0), s!(0x0141, 38, 35, 0), s!(0x0111, 39, 36, 0), s!(0x0085, 40, 37, 0),
    s!(0x0049, 41, 38, 0), s!(0x0025, 42, 39, 0), s!(0x0015, 43, 40, 0), s!(0x0009, 44, 41, 0),
    s!(0x0005, 45, 42, 0), s!(0x0001, 45, 43, 0), s!(0x5601, 46, 46, 0),
];

/// One row of the expanded table: entry `2 * state + mps`.
#[derive(Clone, Copy)]
struct Transition {
    qe: u32,
    mps: u8,
    next_mps: u8,
    next_lps: u8,
}

const TRANSITIONS: [Transition; 94] = expand_table();

const fn expand_table() -> [Transition; 94] {
    let mut table = [Transition {
        qe: 0,
        mps: 0,
        next_mps: 0,
        next_lps: 0,
    }; 94];
    let mut state = 0;
    while state < 47 {
        let row = MQ_TABLE[state];
        let mut mps = 0;
        while mps < 2 {
            let lps_mps = if row.switch { 1 - mps } else { mps };
            table[2 * state + mps as usize] = Transition {
                qe: row.qe as u32,
                mps,
                next_mps: 2 * row.nmps + mps,
                next_lps: 2 * row.nlps + lps_mps,
            };
            mps += 1;
        }
        state += 1;
    }
    table
}

/// Per-context probability states of one coding session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContextStates([u8; CONTEXT_COUNT]);

impl Default for ContextStates {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextStates {
    /// All contexts in their initial states (ITU-T T.800 table D.7).
    pub fn new() -> Self {
        let mut states = Self([0; CONTEXT_COUNT]);
        states.reset();
        states
    }

    pub fn reset(&mut self) {
        self.0 = [0; CONTEXT_COUNT];
        self.set(Context::UNIFORM, UNIFORM_INITIAL_STATE, 0);
        self.set(Context::RUN_LENGTH, RUN_LENGTH_INITIAL_STATE, 0);
        self.set(Context::zero_coding(0), ZERO_CODING_INITIAL_STATE, 0);
    }

    pub fn set(&mut self, cx: Context, state: u8, mps: u8) {
        self.0[cx.index()] = 2 * state.min(46) + (mps & 1);
    }

    /// `(state, mps)` of a context.
    pub fn get(&self, cx: Context) -> (u8, u8) {
        let entry = self.0[cx.index()];
        (entry >> 1, entry & 1)
    }

    #[inline]
    fn transition(&self, cx: Context) -> Transition {
        TRANSITIONS[self.0[cx.index()] as usize]
    }

    #[inline]
    fn advance(&mut self, cx: Context, next: u8) {
        self.0[cx.index()] = next;
    }
}

/// Result of pushing one byte out of the code register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteOut {
    /// The previously emitted byte after carry propagation.
    pub previous: u8,
    /// The newly emitted byte.
    pub emitted: u8,
    /// Code register with the emitted bits removed.
    pub c: u32,
    /// Number of shifts until the next byte is due.
    pub ct: u32,
}

/// The BYTEOUT procedure of Annex C (figure C.8), including carry propagation.
///
/// A byte following `0xFF` only receives seven bits so that no marker code in
/// the range `0xFF90..=0xFFFF` can appear in the output.
pub fn carry_out(previous: u8, c: u32) -> ByteOut {
    if previous == 0xFF {
        return ByteOut {
            previous,
            emitted: (c >> 20) as u8,
            c: c & 0xFFFFF,
            ct: 7,
        };
    }
    if c & 0x800_0000 == 0 {
        return ByteOut {
            previous,
            emitted: (c >> 19) as u8,
            c: c & 0x7FFFF,
            ct: 8,
        };
    }
    let previous = previous + 1;
    if previous == 0xFF {
        let c = c & 0x7FF_FFFF;
        ByteOut {
            previous,
            emitted: (c >> 20) as u8,
            c: c & 0xFFFFF,
            ct: 7,
        }
    } else {
        ByteOut {
            previous,
            emitted: (c >> 19) as u8,
            c: c & 0x7FFFF,
            ct: 8,
        }
    }
}

// The raw packer uses a counter above 8 to remember that no bit was written yet.
const BYPASS_CT_INIT: u32 = 0xDEAD_BEEF;

/// MQ encoder for one code-block session.
pub struct MqEncoder {
    contexts: ContextStates,
    a: u32,
    c: u32,
    ct: u32,
    // buf[0] is the sentinel in front of the output.
    buf: Vec<u8>,
    bp: usize,
}

impl Default for MqEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MqEncoder {
    pub fn new() -> Self {
        Self {
            contexts: ContextStates::new(),
            a: 0x8000,
            c: 0,
            ct: 12,
            buf: vec![0],
            bp: 0,
        }
    }

    /// Creates an encoder whose output buffer can grow to `capacity` bytes
    /// without reallocating.
    pub fn with_capacity(capacity: usize) -> Result<Self, EbcotError> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(capacity.saturating_add(2))?;
        buf.push(0);
        Ok(Self {
            buf,
            ..Self::new()
        })
    }

    pub fn contexts(&self) -> &ContextStates {
        &self.contexts
    }

    pub fn contexts_mut(&mut self) -> &mut ContextStates {
        &mut self.contexts
    }

    /// Restores every context to its initial state (RESET mode switch).
    pub fn reset_contexts(&mut self) {
        self.contexts.reset();
    }

    /// Number of bytes committed since initialisation.
    pub fn num_bytes(&self) -> usize {
        self.bp.saturating_sub(1)
    }

    /// Bytes past `num_bytes()` a decoder needs to reproduce every symbol
    /// coded so far when the codeword is cut here and padded with `0xFF`:
    /// the byte still open to a carry, then enough bytes to reach bit 0 of
    /// the code register.
    pub fn truncation_extra_bytes(&self) -> usize {
        if self.ct >= 4 { 4 } else { 5 }
    }

    /// Committed bytes so far.
    pub fn bytes(&self) -> &[u8] {
        let end = self.bp.min(self.buf.len());
        if end <= 1 { &[] } else { &self.buf[1..end] }
    }

    /// Consumes the encoder and returns the committed bytes.
    pub fn finish(mut self) -> Vec<u8> {
        let end = self.bp.min(self.buf.len());
        self.buf.truncate(end.max(1));
        self.buf.remove(0);
        self.buf
    }

    #[inline]
    fn byte_at(&self, index: usize) -> u8 {
        self.buf.get(index).copied().unwrap_or(0)
    }

    #[inline]
    fn put(&mut self, index: usize, value: u8) {
        if index < self.buf.len() {
            self.buf[index] = value;
        } else {
            self.buf.resize(index, 0);
            self.buf.push(value);
        }
    }

    fn byte_out(&mut self) {
        let out = carry_out(self.byte_at(self.bp), self.c);
        if out.previous != self.byte_at(self.bp) {
            trace!("mq carry into byte {} -> {:02x}", self.bp, out.previous);
            self.put(self.bp, out.previous);
        }
        self.bp += 1;
        self.put(self.bp, out.emitted);
        self.c = out.c;
        self.ct = out.ct;
    }

    #[inline]
    fn renormalize(&mut self) {
        loop {
            self.a <<= 1;
            self.c <<= 1;
            self.ct -= 1;
            if self.ct == 0 {
                self.byte_out();
            }
            if self.a & 0x8000 != 0 {
                break;
            }
        }
    }

    /// Encodes decision `d` (0 or 1) in context `cx`.
    #[inline]
    pub fn encode(&mut self, cx: Context, d: u32) {
        let t = self.contexts.transition(cx);
        self.a -= t.qe;
        if d == t.mps as u32 {
            if self.a & 0x8000 == 0 {
                if self.a < t.qe {
                    self.a = t.qe;
                } else {
                    self.c += t.qe;
                }
                self.contexts.advance(cx, t.next_mps);
                self.renormalize();
            } else {
                self.c += t.qe;
            }
        } else {
            if self.a < t.qe {
                self.c += t.qe;
            } else {
                self.a = t.qe;
            }
            self.contexts.advance(cx, t.next_lps);
            self.renormalize();
        }
    }

    /// Terminates the codeword (figure C.11) and leaves the cursor past the
    /// last byte, dropping a trailing `0xFF`.
    pub fn flush(&mut self) {
        let tempc = self.c + self.a;
        self.c |= 0xFFFF;
        if self.c >= tempc {
            self.c -= 0x8000;
        }
        self.c <<= self.ct;
        self.byte_out();
        self.c <<= self.ct;
        self.byte_out();
        if self.byte_at(self.bp) != 0xFF {
            self.bp += 1;
        }
        trace!("mq flush, {} bytes", self.num_bytes());
    }

    /// Predictable (error-resilient) termination.
    pub fn erterm(&mut self) {
        let mut k = 11 - self.ct as i32 + 1;
        while k > 0 {
            self.c <<= self.ct;
            self.ct = 0;
            self.byte_out();
            k -= self.ct as i32;
        }
        if self.byte_at(self.bp) != 0xFF {
            self.byte_out();
        }
        trace!("mq erterm, {} bytes", self.num_bytes());
    }

    /// Re-initialises the registers after a terminated pass. Contexts and the
    /// bytes already produced are kept.
    pub fn restart(&mut self) {
        self.a = 0x8000;
        self.c = 0;
        self.ct = 12;
        self.bp = self.bp.saturating_sub(1);
        if self.byte_at(self.bp) == 0xFF {
            self.ct = 13;
        }
    }

    /// Encodes the segmentation symbol `1010` in the uniform context.
    pub fn segmentation_symbol(&mut self) {
        for i in 1..5u32 {
            self.encode(Context::UNIFORM, i % 2);
        }
    }

    /// Switches to raw bit packing after a terminated pass.
    pub fn bypass_init(&mut self) {
        self.c = 0;
        self.ct = BYPASS_CT_INIT;
    }

    /// Packs one raw bit.
    pub fn bypass_encode(&mut self, d: u32) {
        if self.ct == BYPASS_CT_INIT {
            self.ct = 8;
        }
        self.ct -= 1;
        self.c += d << self.ct;
        if self.ct == 0 {
            self.put(self.bp, self.c as u8);
            self.ct = 8;
            if self.byte_at(self.bp) == 0xFF {
                self.ct = 7;
            }
            self.bp += 1;
            self.c = 0;
        }
    }

    /// Bytes a non-terminated raw pass still owes to its rate.
    pub fn bypass_extra_bytes(&self, erterm: bool) -> usize {
        let previous = self.byte_at(self.bp.saturating_sub(1));
        if self.ct < 7 || (self.ct == 7 && (erterm || previous != 0xFF)) {
            1
        } else {
            0
        }
    }

    /// Terminates a raw segment.
    pub fn bypass_flush(&mut self, erterm: bool) {
        let previous = self.byte_at(self.bp.saturating_sub(1));
        if self.ct < 7 || (self.ct == 7 && (erterm || previous != 0xFF)) {
            // Fill the remaining low bits with 0, 1, 0, ...
            let mut bit = 0;
            while self.ct > 0 {
                self.ct -= 1;
                self.c += bit << self.ct;
                bit = 1 - bit;
            }
            self.put(self.bp, self.c as u8);
            self.bp += 1;
        } else if self.ct == 7 && previous == 0xFF {
            self.bp -= 1;
        } else if self.ct == 8
            && !erterm
            && self.bp >= 3
            && previous == 0x7F
            && self.byte_at(self.bp - 2) == 0xFF
        {
            // 0xFF 0x7F at the end reads back as the synthesized padding.
            self.bp -= 2;
        }
        trace!("raw flush, {} bytes", self.num_bytes());
    }
}

/// MQ decoder over one codeword segment.
pub struct MqDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    a: u32,
    c: u32,
    ct: u32,
    contexts: ContextStates,
}

impl<'a> MqDecoder<'a> {
    /// INITDEC (figure C.20). Contexts are carried in from the previous
    /// segment of the same code-block.
    pub fn new(data: &'a [u8], contexts: ContextStates) -> Self {
        let first = data.first().copied().unwrap_or(0xFF) as u32;
        let mut decoder = Self {
            data,
            pos: 0,
            a: 0x8000,
            c: first << 16,
            ct: 0,
            contexts,
        };
        decoder.byte_in();
        decoder.c <<= 7;
        decoder.ct -= 7;
        decoder.a = 0x8000;
        decoder
    }

    pub fn contexts_mut(&mut self) -> &mut ContextStates {
        &mut self.contexts
    }

    pub fn into_contexts(self) -> ContextStates {
        self.contexts
    }

    /// BYTEIN (figure C.19). Past the end of the segment `0xFF` bytes are
    /// synthesized forever.
    fn byte_in(&mut self) {
        if self.pos >= self.data.len() {
            self.c = self.c.wrapping_add(0xFF00);
            self.ct = 8;
            return;
        }
        let next = self.data.get(self.pos + 1).copied().unwrap_or(0xFF) as u32;
        if self.data[self.pos] == 0xFF {
            if next > 0x8F {
                self.c = self.c.wrapping_add(0xFF00);
                self.ct = 8;
            } else {
                self.pos += 1;
                self.c = self.c.wrapping_add(next << 9);
                self.ct = 7;
            }
        } else {
            self.pos += 1;
            self.c = self.c.wrapping_add(next << 8);
            self.ct = 8;
        }
    }

    #[inline]
    fn renormalize(&mut self) {
        loop {
            if self.ct == 0 {
                self.byte_in();
            }
            self.a <<= 1;
            self.c <<= 1;
            self.ct -= 1;
            if self.a >= 0x8000 {
                break;
            }
        }
    }

    /// Decodes one decision in context `cx`.
    #[inline]
    pub fn decode(&mut self, cx: Context) -> u32 {
        let t = self.contexts.transition(cx);
        self.a -= t.qe;
        let d;
        if (self.c >> 16) < t.qe {
            // LPS exchange
            if self.a < t.qe {
                self.a = t.qe;
                d = t.mps;
                self.contexts.advance(cx, t.next_mps);
            } else {
                self.a = t.qe;
                d = 1 - t.mps;
                self.contexts.advance(cx, t.next_lps);
            }
            self.renormalize();
        } else {
            self.c -= t.qe << 16;
            if self.a & 0x8000 == 0 {
                // MPS exchange
                if self.a < t.qe {
                    d = 1 - t.mps;
                    self.contexts.advance(cx, t.next_lps);
                } else {
                    d = t.mps;
                    self.contexts.advance(cx, t.next_mps);
                }
                self.renormalize();
            } else {
                d = t.mps;
            }
        }
        d as u32
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }
}
