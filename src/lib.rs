//! EBCOT entropy coding and rate control for JPEG 2000.
//!
//! Code-blocks of quantized wavelet coefficients go in; per-block codewords
//! with their rate-distortion pass tables, quality layers and packets come
//! out, and the same path runs backwards on decode.

pub mod coding_parameters;
pub mod constants;
pub mod error;
pub mod jpeg2000;

pub use coding_parameters::{CodeBlockStyle, LayerTarget, RateControl, TileCodingParameters};
pub use error::{EbcotError, ErrorKind};
pub use jpeg2000::bit_plane_coder::{BlockDecoder, decode_code_block, encode_code_block};
pub use jpeg2000::decoder::{DecodedTile, TileDecoder};
pub use jpeg2000::encoder::{EncodedTile, TileEncoder};
pub use jpeg2000::image::{
    CodeBlock, CodeBlockGeometry, DecodeStatus, DecodedBlock, EncodedCodeBlock, SampleData,
    SubbandOrientation,
};
pub use jpeg2000::packet::{BandLayout, PrecinctLayout, ResolutionLayout, TileLayout};
pub use jpeg2000::rate_allocator::{LayerAllocation, RateAllocator};
pub use jpeg2000::segment::{PassKind, PassRecord};
