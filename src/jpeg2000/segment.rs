//! Coding pass sequence and codeword segmentation of a code-block.
//!
//! Passes run cleanup on the most significant plane, then significance,
//! refinement and cleanup on every lower plane. The mode switches decide
//! which passes are raw coded and where codeword segments end.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::coding_parameters::CodeBlockStyle;
use crate::constants::{BYPASS_MQ_BIT_PLANES, maximum_passes};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum PassKind {
    Significance = 0,
    Refinement = 1,
    Cleanup = 2,
}

/// Rate and distortion bookkeeping of one coding pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassRecord {
    pub bit_plane: u8,
    pub kind: PassKind,
    /// Bytes needed to decode every pass up to and including this one.
    pub rate: usize,
    /// Cumulative weighted distortion reduction.
    pub distortion: f64,
    /// Bytes added by this pass.
    pub length: usize,
    /// The pass ends a codeword segment.
    pub terminated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassPosition {
    pub bit_plane: u8,
    pub kind: PassKind,
}

/// Pass layout of a code-block with a given number of coded bit-planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassSchedule {
    num_bit_planes: u8,
    style: CodeBlockStyle,
}

impl PassSchedule {
    pub fn new(num_bit_planes: u8, style: CodeBlockStyle) -> Self {
        Self {
            num_bit_planes,
            style,
        }
    }

    pub fn num_bit_planes(&self) -> u8 {
        self.num_bit_planes
    }

    pub fn style(&self) -> CodeBlockStyle {
        self.style
    }

    pub fn total_passes(&self) -> usize {
        maximum_passes(self.num_bit_planes)
    }

    /// Bit-plane and kind of pass `index`; `index` must be below
    /// `total_passes()`.
    pub fn position(&self, index: usize) -> PassPosition {
        if index == 0 {
            return PassPosition {
                bit_plane: self.num_bit_planes.saturating_sub(1),
                kind: PassKind::Cleanup,
            };
        }
        let j = index - 1;
        let bit_plane = (self.num_bit_planes as usize).saturating_sub(2 + j / 3) as u8;
        let kind = match j % 3 {
            0 => PassKind::Significance,
            1 => PassKind::Refinement,
            _ => PassKind::Cleanup,
        };
        PassPosition { bit_plane, kind }
    }

    /// Whether a pass bypasses the arithmetic coder.
    pub fn is_raw(&self, position: PassPosition) -> bool {
        self.style.bypass
            && (position.bit_plane as i32) < self.num_bit_planes as i32 - BYPASS_MQ_BIT_PLANES
            && position.kind != PassKind::Cleanup
    }

    /// Whether pass `index` ends a codeword segment.
    pub fn is_terminated(&self, index: usize) -> bool {
        if index + 1 >= self.total_passes() || self.style.terminate_all {
            return true;
        }
        if !self.style.bypass {
            return false;
        }
        let position = self.position(index);
        let plane = position.bit_plane as i32;
        let boundary = self.num_bit_planes as i32 - BYPASS_MQ_BIT_PLANES;
        (plane == boundary && position.kind == PassKind::Cleanup)
            || (plane < boundary && position.kind != PassKind::Significance)
    }

    /// One past the last pass of the segment containing pass `index`.
    pub fn segment_end(&self, index: usize) -> usize {
        let total = self.total_passes();
        let mut i = index;
        while i < total {
            if self.is_terminated(i) {
                return i + 1;
            }
            i += 1;
        }
        total
    }
}

/// Maximum pass counts of successive codeword segments as a packet decoder
/// sees them before the block's bit-plane count matters.
#[derive(Debug, Clone, Copy)]
pub struct SegmentLimits {
    style: CodeBlockStyle,
    previous: Option<usize>,
}

impl SegmentLimits {
    pub fn new(style: CodeBlockStyle) -> Self {
        Self {
            style,
            previous: None,
        }
    }
}

impl Iterator for SegmentLimits {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let limit = if self.style.terminate_all {
            1
        } else if self.style.bypass {
            match self.previous {
                None => 10,
                Some(1) | Some(10) => 2,
                Some(_) => 1,
            }
        } else {
            usize::MAX
        };
        self.previous = Some(limit);
        Some(limit)
    }
}
