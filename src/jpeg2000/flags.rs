//! Per-coefficient state words for Tier-1 coding.
//!
//! Each word records the significance of the eight neighbours, the signs of
//! the four direct neighbours, and the coefficient's own significance, sign,
//! refinement and visited markers. Words live in a grid with a one-sample
//! border so that neighbour updates never need edge checks.

use crate::error::EbcotError;

// Neighbour significance, low byte. The diagonal bits come first so that
// `(bits >> 4)` lines the direct neighbours up with their sign bits.
pub(crate) const SIG_NE: u16 = 0x0001;
pub(crate) const SIG_SE: u16 = 0x0002;
pub(crate) const SIG_SW: u16 = 0x0004;
pub(crate) const SIG_NW: u16 = 0x0008;
pub(crate) const SIG_N: u16 = 0x0010;
pub(crate) const SIG_E: u16 = 0x0020;
pub(crate) const SIG_S: u16 = 0x0040;
pub(crate) const SIG_W: u16 = 0x0080;
pub(crate) const SIG_NEIGHBOURS: u16 = 0x00FF;

// Neighbour signs (set when the neighbour is negative).
pub(crate) const SGN_N: u16 = 0x0100;
pub(crate) const SGN_E: u16 = 0x0200;
pub(crate) const SGN_S: u16 = 0x0400;
pub(crate) const SGN_W: u16 = 0x0800;

const SIG: u16 = 0x1000;
const REFINE: u16 = 0x2000;
const VISIT: u16 = 0x4000;
const NEG: u16 = 0x8000;

// Bits that refer to the row below; hidden under the vertically causal switch.
const SOUTH: u16 = SIG_S | SIG_SE | SIG_SW | SGN_S;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FlagWord(u16);

impl FlagWord {
    pub const EMPTY: FlagWord = FlagWord(0);

    #[inline]
    pub fn is_significant(self) -> bool {
        self.0 & SIG != 0
    }

    /// Sign of the coefficient itself; meaningful once significant.
    #[inline]
    pub fn is_negative(self) -> bool {
        self.0 & NEG != 0
    }

    #[inline]
    pub fn is_visited(self) -> bool {
        self.0 & VISIT != 0
    }

    #[inline]
    pub fn is_refined(self) -> bool {
        self.0 & REFINE != 0
    }

    #[inline]
    pub fn has_significant_neighbour(self) -> bool {
        self.0 & SIG_NEIGHBOURS != 0
    }

    /// Significance of the eight neighbours, one bit each.
    #[inline]
    pub fn neighbour_significance(self) -> u8 {
        (self.0 & SIG_NEIGHBOURS) as u8
    }

    /// Significance and sign of the four direct neighbours: N, E, S, W
    /// significance in bits 0..4, their signs in bits 4..8.
    #[inline]
    pub fn sign_neighbourhood(self) -> u8 {
        (self.0 >> 4) as u8
    }

    /// Significant, or already coded during the current bit-plane.
    #[inline]
    pub fn is_significant_or_visited(self) -> bool {
        self.0 & (SIG | VISIT) != 0
    }

    /// Significant since an earlier pass and not coded in this bit-plane.
    #[inline]
    pub fn needs_refinement(self) -> bool {
        self.0 & (SIG | VISIT) == SIG
    }

    /// Candidate for run-length aggregation in the cleanup pass.
    #[inline]
    pub fn is_idle(self) -> bool {
        self.0 & (SIG | VISIT | SIG_NEIGHBOURS) == 0
    }

    /// The word as seen by the last row of a stripe under the vertically
    /// causal switch.
    #[inline]
    pub fn vertically_causal(self) -> FlagWord {
        FlagWord(self.0 & !SOUTH)
    }

    #[cfg(test)]
    fn bits(self) -> u16 {
        self.0
    }
}

pub struct FlagGrid {
    flags: Vec<FlagWord>,
    stride: usize,
}

impl FlagGrid {
    pub fn new(width: usize, height: usize) -> Result<Self, EbcotError> {
        let stride = width + 2;
        let len = stride * (height + 2);
        let mut flags = Vec::new();
        flags.try_reserve_exact(len)?;
        flags.resize(len, FlagWord::EMPTY);
        Ok(Self { flags, stride })
    }

    /// Grid index of coefficient `(x, y)`.
    #[inline]
    pub fn index(&self, x: usize, y: usize) -> usize {
        (y + 1) * self.stride + x + 1
    }

    #[inline]
    pub fn get(&self, index: usize) -> FlagWord {
        self.flags[index]
    }

    #[inline]
    pub fn at(&self, x: usize, y: usize) -> FlagWord {
        self.flags[self.index(x, y)]
    }

    /// Marks a coefficient significant and publishes its significance and
    /// sign to the eight neighbours.
    #[inline]
    pub fn mark_significant(&mut self, index: usize, negative: bool) {
        let s = self.stride;
        let f = &mut self.flags;
        f[index].0 |= SIG | if negative { NEG } else { 0 };

        let north = index - s;
        let south = index + s;
        f[north - 1].0 |= SIG_SE;
        f[north].0 |= SIG_S | if negative { SGN_S } else { 0 };
        f[north + 1].0 |= SIG_SW;
        f[index - 1].0 |= SIG_E | if negative { SGN_E } else { 0 };
        f[index + 1].0 |= SIG_W | if negative { SGN_W } else { 0 };
        f[south - 1].0 |= SIG_NE;
        f[south].0 |= SIG_N | if negative { SGN_N } else { 0 };
        f[south + 1].0 |= SIG_NW;
    }

    #[inline]
    pub fn set_visited(&mut self, index: usize) {
        self.flags[index].0 |= VISIT;
    }

    #[inline]
    pub fn clear_visited(&mut self, index: usize) {
        self.flags[index].0 &= !VISIT;
    }

    #[inline]
    pub fn set_refined(&mut self, index: usize) {
        self.flags[index].0 |= REFINE;
    }


    pub fn try_clone(&self) -> Result<Self, EbcotError> {
        let mut flags = Vec::new();
        flags.try_reserve_exact(self.flags.len())?;
        flags.extend_from_slice(&self.flags);
        Ok(Self {
            flags,
            stride: self.stride,
        })
    }

    pub fn copy_from(&mut self, other: &FlagGrid) {
        self.flags.copy_from_slice(&other.flags);
    }
}
