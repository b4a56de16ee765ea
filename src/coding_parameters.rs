use crate::constants::DEFAULT_BISECTION_ITERATIONS;
use crate::error::EbcotError;

/// Code-block coding style: the mode switches of the SPcod/SPcoc
/// code-block style byte (ISO/IEC 15444-1, table A.19).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CodeBlockStyle {
    /// Selective arithmetic coding bypass (lazy mode).
    pub bypass: bool,
    /// Reset context probabilities after every pass.
    pub reset: bool,
    /// Terminate the codeword after every pass.
    pub terminate_all: bool,
    /// Vertically causal context formation.
    pub vertically_causal: bool,
    /// Predictable termination.
    pub predictable_termination: bool,
    /// Segmentation symbols after every cleanup pass.
    pub segmentation_symbols: bool,
}

impl CodeBlockStyle {
    pub const BYPASS: u8 = 0x01;
    pub const RESET: u8 = 0x02;
    pub const TERMINATE_ALL: u8 = 0x04;
    pub const VERTICALLY_CAUSAL: u8 = 0x08;
    pub const PREDICTABLE_TERMINATION: u8 = 0x10;
    pub const SEGMENTATION_SYMBOLS: u8 = 0x20;

    pub fn from_bits(bits: u8) -> Result<Self, EbcotError> {
        if bits & !0x3F != 0 {
            return Err(EbcotError::InvalidArgumentCodeBlockStyle);
        }
        Ok(Self {
            bypass: bits & Self::BYPASS != 0,
            reset: bits & Self::RESET != 0,
            terminate_all: bits & Self::TERMINATE_ALL != 0,
            vertically_causal: bits & Self::VERTICALLY_CAUSAL != 0,
            predictable_termination: bits & Self::PREDICTABLE_TERMINATION != 0,
            segmentation_symbols: bits & Self::SEGMENTATION_SYMBOLS != 0,
        })
    }

    pub fn bits(self) -> u8 {
        let mut bits = 0;
        if self.bypass {
            bits |= Self::BYPASS;
        }
        if self.reset {
            bits |= Self::RESET;
        }
        if self.terminate_all {
            bits |= Self::TERMINATE_ALL;
        }
        if self.vertically_causal {
            bits |= Self::VERTICALLY_CAUSAL;
        }
        if self.predictable_termination {
            bits |= Self::PREDICTABLE_TERMINATION;
        }
        if self.segmentation_symbols {
            bits |= Self::SEGMENTATION_SYMBOLS;
        }
        bits
    }

    /// Every combination of the six switches.
    pub fn all() -> impl Iterator<Item = CodeBlockStyle> {
        (0u8..64).filter_map(|bits| Self::from_bits(bits).ok())
    }
}

/// Target for one quality layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LayerTarget {
    /// Cumulative byte budget for all code-block data up to this layer.
    Bytes(usize),
    /// Cumulative weighted distortion reduction to reach.
    Distortion(f64),
    /// Every remaining pass.
    Lossless,
}

/// Tier-2 rate control configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RateControl {
    pub layers: Vec<LayerTarget>,
    /// Bisection rounds per layer.
    pub iterations: u32,
    /// A byte target is considered met once the included rate is at most
    /// this many bytes below it.
    pub tolerance: usize,
}

impl Default for RateControl {
    fn default() -> Self {
        Self {
            layers: vec![LayerTarget::Lossless],
            iterations: DEFAULT_BISECTION_ITERATIONS,
            tolerance: 0,
        }
    }
}

impl RateControl {
    pub fn with_layers(layers: Vec<LayerTarget>) -> Self {
        Self {
            layers,
            ..Self::default()
        }
    }

    /// Byte budgets must not decrease from one layer to the next, and a
    /// lossless layer can only be the last one. Bisection needs at least one
    /// round.
    pub fn validate(&self) -> Result<(), EbcotError> {
        if self.iterations == 0 || self.layers.is_empty() || self.layers.len() > u16::MAX as usize {
            return Err(EbcotError::InvalidArgumentLayerTargets);
        }
        let mut last_bytes = 0usize;
        let mut last_distortion = 0f64;
        for (i, target) in self.layers.iter().enumerate() {
            match *target {
                LayerTarget::Bytes(b) => {
                    if b < last_bytes {
                        return Err(EbcotError::InvalidArgumentLayerTargets);
                    }
                    last_bytes = b;
                }
                LayerTarget::Distortion(d) => {
                    if !d.is_finite() || d < last_distortion {
                        return Err(EbcotError::InvalidArgumentLayerTargets);
                    }
                    last_distortion = d;
                }
                LayerTarget::Lossless => {
                    if i + 1 != self.layers.len() {
                        return Err(EbcotError::InvalidArgumentLayerTargets);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Everything a tile needs to be entropy coded.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TileCodingParameters {
    pub style: CodeBlockStyle,
    pub rate_control: RateControl,
}
