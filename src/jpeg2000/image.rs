//! Code-block data structures shared by the Tier-1 and Tier-2 coders.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::constants::{MAXIMUM_BIT_PLANES, MAXIMUM_CODE_BLOCK_DIMENSION};
use crate::error::EbcotError;
use crate::jpeg2000::quantization::dequantize_scalar;
use crate::jpeg2000::segment::PassRecord;

/// Orientation of a wavelet subband.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, TryFromPrimitive, IntoPrimitive,
)]
#[repr(u8)]
pub enum SubbandOrientation {
    #[default]
    /// Low-Low (base image)
    LL = 0,
    /// High-Low (horizontal high-pass)
    HL = 1,
    /// Low-High (vertical high-pass)
    LH = 2,
    /// High-High (diagonal details)
    HH = 3,
}

/// Code-block rectangle in subband coordinates, `x1`/`y1` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CodeBlockGeometry {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl CodeBlockGeometry {
    pub fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Geometry of a `width` x `height` block at the subband origin.
    pub fn with_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn width(&self) -> usize {
        self.x1.saturating_sub(self.x0) as usize
    }

    pub fn height(&self) -> usize {
        self.y1.saturating_sub(self.y0) as usize
    }

    pub fn area(&self) -> usize {
        self.width() * self.height()
    }

    pub fn validate(&self) -> Result<(), EbcotError> {
        let w = self.width();
        let h = self.height();
        if self.x1 <= self.x0 || w > MAXIMUM_CODE_BLOCK_DIMENSION {
            return Err(EbcotError::InvalidArgumentWidth);
        }
        if self.y1 <= self.y0 || h > MAXIMUM_CODE_BLOCK_DIMENSION {
            return Err(EbcotError::InvalidArgumentHeight);
        }
        Ok(())
    }
}

/// Quantized coefficients handed over by the wavelet transform.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleData {
    /// Integer coefficients of the reversible path.
    Reversible(Vec<i32>),
    /// Real coefficients of the irreversible path with their quantizer step.
    Irreversible { samples: Vec<f32>, step_size: f32 },
}

impl SampleData {
    pub fn len(&self) -> usize {
        match self {
            SampleData::Reversible(v) => v.len(),
            SampleData::Irreversible { samples, .. } => samples.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn step_size(&self) -> f32 {
        match self {
            SampleData::Reversible(_) => 1.0,
            SampleData::Irreversible { step_size, .. } => *step_size,
        }
    }
}

/// One code-block ready for Tier-1 encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlock {
    pub geometry: CodeBlockGeometry,
    pub orientation: SubbandOrientation,
    pub samples: SampleData,
    /// Bit-planes implied by the quantizer for this subband.
    pub max_bit_planes: u8,
    /// Synthesis norm of the subband, used to weight distortion.
    pub distortion_weight: f64,
}

impl CodeBlock {
    pub fn new(
        geometry: CodeBlockGeometry,
        orientation: SubbandOrientation,
        samples: SampleData,
        max_bit_planes: u8,
    ) -> Result<Self, EbcotError> {
        geometry.validate()?;
        if samples.len() != geometry.area() {
            return Err(EbcotError::InvalidArgumentSampleCount);
        }
        if max_bit_planes > MAXIMUM_BIT_PLANES {
            return Err(EbcotError::InvalidArgumentBitPlanes);
        }
        if let SampleData::Irreversible { step_size, .. } = samples {
            if !(step_size.is_finite() && step_size > 0.0) {
                return Err(EbcotError::InvalidArgumentStepSize);
            }
        }
        Ok(Self {
            geometry,
            orientation,
            samples,
            max_bit_planes,
            distortion_weight: 1.0,
        })
    }

    pub fn reversible(
        geometry: CodeBlockGeometry,
        orientation: SubbandOrientation,
        samples: Vec<i32>,
        max_bit_planes: u8,
    ) -> Result<Self, EbcotError> {
        Self::new(geometry, orientation, SampleData::Reversible(samples), max_bit_planes)
    }

    pub fn irreversible(
        geometry: CodeBlockGeometry,
        orientation: SubbandOrientation,
        samples: Vec<f32>,
        step_size: f32,
        max_bit_planes: u8,
    ) -> Result<Self, EbcotError> {
        Self::new(
            geometry,
            orientation,
            SampleData::Irreversible { samples, step_size },
            max_bit_planes,
        )
    }

    /// Copies a reversible code-block out of a row-major subband.
    pub fn from_subband(
        subband: &[i32],
        stride: usize,
        geometry: CodeBlockGeometry,
        orientation: SubbandOrientation,
        max_bit_planes: u8,
    ) -> Result<Self, EbcotError> {
        geometry.validate()?;
        let (w, h) = (geometry.width(), geometry.height());
        let (x0, y0) = (geometry.x0 as usize, geometry.y0 as usize);
        let last = (y0 + h - 1) * stride + x0 + w;
        if x0 + w > stride || last > subband.len() {
            return Err(EbcotError::InvalidArgumentSampleCount);
        }
        let mut samples = Vec::new();
        samples.try_reserve_exact(w * h)?;
        for y in 0..h {
            let start = (y0 + y) * stride + x0;
            samples.extend_from_slice(&subband[start..start + w]);
        }
        Self::reversible(geometry, orientation, samples, max_bit_planes)
    }

    pub fn with_distortion_weight(mut self, weight: f64) -> Self {
        self.distortion_weight = weight;
        self
    }

    pub fn width(&self) -> usize {
        self.geometry.width()
    }

    pub fn height(&self) -> usize {
        self.geometry.height()
    }
}

/// Tier-1 output of one code-block.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedCodeBlock {
    pub geometry: CodeBlockGeometry,
    pub orientation: SubbandOrientation,
    /// Bit-planes actually coded.
    pub num_bit_planes: u8,
    /// Leading all-zero bit-planes relative to the subband maximum.
    pub zero_bit_planes: u8,
    pub data: Vec<u8>,
    pub passes: Vec<PassRecord>,
}

impl EncodedCodeBlock {
    /// Bytes needed to carry the first `passes` passes.
    pub fn rate_at(&self, passes: usize) -> usize {
        if passes == 0 {
            0
        } else {
            self.passes[passes.min(self.passes.len()) - 1].rate
        }
    }

    pub fn distortion_at(&self, passes: usize) -> f64 {
        if passes == 0 {
            0.0
        } else {
            self.passes[passes.min(self.passes.len()) - 1].distortion
        }
    }
}

/// Outcome of decoding one code-block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// Every supplied pass was decoded.
    Complete,
    /// Decoding stopped early; the coefficients reflect the passes decoded
    /// before the fault.
    Incomplete { error: EbcotError },
}

/// Reconstructed coefficients of one code-block.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBlock {
    pub geometry: CodeBlockGeometry,
    pub coefficients: Vec<i32>,
    pub significance: Vec<bool>,
    pub passes_decoded: usize,
    pub status: DecodeStatus,
}

impl DecodedBlock {
    pub fn width(&self) -> usize {
        self.geometry.width()
    }

    pub fn height(&self) -> usize {
        self.geometry.height()
    }

    fn offset(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.width() && y < self.height()).then(|| y * self.width() + x)
    }

    /// `None` outside the block.
    pub fn coefficient(&self, x: usize, y: usize) -> Option<i32> {
        self.offset(x, y).and_then(|i| self.coefficients.get(i).copied())
    }

    pub fn is_significant(&self, x: usize, y: usize) -> Option<bool> {
        self.offset(x, y).and_then(|i| self.significance.get(i).copied())
    }

    pub fn is_complete(&self) -> bool {
        self.status == DecodeStatus::Complete
    }

    /// Reconstructs irreversible coefficients with the quantizer step.
    pub fn dequantize(&self, step_size: f32) -> Vec<f32> {
        self.coefficients
            .iter()
            .map(|&q| dequantize_scalar(q, step_size))
            .collect()
    }

    /// Writes the block back into a row-major subband.
    pub fn scatter_into(&self, subband: &mut [i32], stride: usize) -> Result<(), EbcotError> {
        let (w, h) = (self.width(), self.height());
        let (x0, y0) = (self.geometry.x0 as usize, self.geometry.y0 as usize);
        if w == 0 || h == 0 {
            return Ok(());
        }
        let last = (y0 + h - 1) * stride + x0 + w;
        if x0 + w > stride || last > subband.len() {
            return Err(EbcotError::InvalidArgumentSampleCount);
        }
        for y in 0..h {
            let start = (y0 + y) * stride + x0;
            subband[start..start + w].copy_from_slice(&self.coefficients[y * w..(y + 1) * w]);
        }
        Ok(())
    }
}
