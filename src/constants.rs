// Code-block geometry limits. Width and height are each capped independently.
pub const MAXIMUM_CODE_BLOCK_DIMENSION: usize = 1024;

// Samples are coded in a fixed-point domain carrying this many fractional bits
// (T1_NMSEDEC_FRACBITS in ITU-T T.800 implementations).
pub const FRACTIONAL_BITS: u32 = 6;
pub const NMSEDEC_BITS: u32 = 7;

// A scaled magnitude must fit in 31 bits.
pub const MAXIMUM_BIT_PLANES: u8 = (31 - FRACTIONAL_BITS) as u8;
pub const MAXIMUM_REVERSIBLE_MAGNITUDE: i32 = (1 << MAXIMUM_BIT_PLANES) - 1;

// Three passes per bit-plane, minus the two skipped on the most significant plane.
pub const fn maximum_passes(bit_planes: u8) -> usize {
    if bit_planes == 0 {
        0
    } else {
        3 * bit_planes as usize - 2
    }
}

// Context label layout: 9 zero-coding, 5 sign, 3 magnitude, run-length, uniform.
pub const ZERO_CODING_CONTEXTS: u8 = 9;
pub const SIGN_CODING_CONTEXTS: u8 = 5;
pub const MAGNITUDE_CONTEXTS: u8 = 3;
pub const CONTEXT_COUNT: usize = 19;

// Initial probability states (ITU-T T.800, table D.7).
pub const UNIFORM_INITIAL_STATE: u8 = 46;
pub const RUN_LENGTH_INITIAL_STATE: u8 = 3;
pub const ZERO_CODING_INITIAL_STATE: u8 = 4;

// Under the BYPASS switch, the first four bit-planes stay arithmetic coded.
pub const BYPASS_MQ_BIT_PLANES: i32 = 4;

// Lblock starts at 3 on a code-block's first inclusion.
pub const INITIAL_LBLOCK: u32 = 3;

pub const DEFAULT_BISECTION_ITERATIONS: u32 = 32;
