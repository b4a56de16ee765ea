//! JPEG 2000 entropy coding (ISO/IEC 15444-1, Annex B to D and J.14)
//!
//! The EBCOT coder is divided into several sub-modules:
//!
//! - `mq_coder` / `raw_coder`: the MQ arithmetic coder and the raw bit packer used in bypass passes.
//! - `flags` / `context`: neighbourhood state of every sample and the context labels derived from it.
//! - `bit_plane_coder`: Tier-1 coding of a code-block in three passes per bit-plane.
//! - `segment`: pass sequence and codeword segment boundaries under the mode switches.
//! - `distortion` / `kernel` / `quantization`: distortion estimates and sample scaling.
//! - `rate_allocator`: PCRD-opt truncation points for every quality layer.
//! - `bit_io` / `tag_tree` / `packet`: packet headers and bodies (Tier-2).
//! - `encoder` / `decoder`: tile level driving of both tiers.
//! - `image`: code-block data structures.

pub mod bit_io;
pub mod bit_plane_coder;
pub mod context;
pub mod decoder;
pub mod distortion;
pub mod encoder;
pub mod flags;
pub mod image;
pub mod kernel;
pub mod mq_coder;
pub mod packet;
pub mod quantization;
pub mod rate_allocator;
pub mod raw_coder;
pub mod segment;
pub mod tag_tree;
