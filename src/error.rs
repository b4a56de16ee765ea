use thiserror::Error;

/// Broad failure classes reported at component boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A coefficient, flag or coder buffer could not be allocated.
    ResourceExhausted,
    /// The compressed input disagrees with itself or with its metadata.
    CorruptInput,
    /// A caller broke a structural precondition (sizes, ranges, ordering).
    InvariantViolation,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EbcotError {
    #[error("Not enough memory")]
    NotEnoughMemory = 1,

    // Corrupt input
    #[error("Code-block data is shorter than the declared segment length")]
    TruncatedCodeBlockData = 10,
    #[error("More coding passes than the code-block has bit-planes for")]
    TooManyCodingPasses = 11,
    #[error("Segmentation symbol mismatch")]
    SegmentationSymbolMismatch = 12,
    #[error("Packet header ended prematurely")]
    TruncatedPacketHeader = 13,
    #[error("Packet body is shorter than its header announces")]
    TruncatedPacketBody = 14,
    #[error("Invalid number of coding passes in packet header")]
    InvalidPassCount = 15,
    #[error("Invalid number of zero bit-planes")]
    InvalidZeroBitPlanes = 16,
    #[error("Code-block length does not fit the length field")]
    InvalidSegmentLength = 17,

    // Logic errors
    #[error("Invalid code-block width")]
    InvalidArgumentWidth = 101,
    #[error("Invalid code-block height")]
    InvalidArgumentHeight = 102,
    #[error("Sample count does not match the code-block geometry")]
    InvalidArgumentSampleCount = 103,
    #[error("Coefficient magnitude exceeds the coder's dynamic range")]
    InvalidArgumentMagnitude = 104,
    #[error("Invalid number of bit-planes")]
    InvalidArgumentBitPlanes = 105,
    #[error("Invalid quantization step size")]
    InvalidArgumentStepSize = 106,
    #[error("Invalid code-block style")]
    InvalidArgumentCodeBlockStyle = 107,
    #[error("Layer targets must be non-decreasing")]
    InvalidArgumentLayerTargets = 108,
    #[error("Tile layout does not match the code-block list")]
    InvalidArgumentLayout = 109,
}

impl EbcotError {
    pub fn kind(self) -> ErrorKind {
        match self {
            EbcotError::NotEnoughMemory => ErrorKind::ResourceExhausted,
            EbcotError::TruncatedCodeBlockData
            | EbcotError::TooManyCodingPasses
            | EbcotError::SegmentationSymbolMismatch
            | EbcotError::TruncatedPacketHeader
            | EbcotError::TruncatedPacketBody
            | EbcotError::InvalidPassCount
            | EbcotError::InvalidZeroBitPlanes
            | EbcotError::InvalidSegmentLength => ErrorKind::CorruptInput,
            _ => ErrorKind::InvariantViolation,
        }
    }

    pub fn is_corrupt_input(self) -> bool {
        self.kind() == ErrorKind::CorruptInput
    }
}

impl From<std::collections::TryReserveError> for EbcotError {
    fn from(_: std::collections::TryReserveError) -> Self {
        EbcotError::NotEnoughMemory
    }
}
