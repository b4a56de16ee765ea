//! Context formation for Tier-1 coding (ISO/IEC 15444-1 D.3).
//!
//! Context labels are a pure function of a coefficient's flag word and the
//! orientation of its subband. All lookup tables are built at compile time.

use crate::constants::{MAGNITUDE_CONTEXTS, SIGN_CODING_CONTEXTS, ZERO_CODING_CONTEXTS};
use crate::jpeg2000::flags::{
    FlagWord, SGN_E, SGN_N, SGN_S, SGN_W, SIG_E, SIG_N, SIG_NE, SIG_NW, SIG_S, SIG_SE, SIG_SW,
    SIG_W,
};
use crate::jpeg2000::image::SubbandOrientation;

/// Context label: zero coding `0..=8`, sign `9..=13`, magnitude `14..=16`,
/// run-length `17`, uniform `18`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Context(u8);

const SIGN_BASE: u8 = ZERO_CODING_CONTEXTS;
const MAGNITUDE_BASE: u8 = SIGN_BASE + SIGN_CODING_CONTEXTS;

impl Context {
    pub const RUN_LENGTH: Context = Context(MAGNITUDE_BASE + MAGNITUDE_CONTEXTS);
    pub const UNIFORM: Context = Context(MAGNITUDE_BASE + MAGNITUDE_CONTEXTS + 1);

    pub const fn zero_coding(n: u8) -> Self {
        Context(if n < ZERO_CODING_CONTEXTS { n } else { ZERO_CODING_CONTEXTS - 1 })
    }

    pub const fn sign(n: u8) -> Self {
        Context(SIGN_BASE + if n < SIGN_CODING_CONTEXTS { n } else { SIGN_CODING_CONTEXTS - 1 })
    }

    pub const fn magnitude(n: u8) -> Self {
        Context(MAGNITUDE_BASE + if n < MAGNITUDE_CONTEXTS { n } else { MAGNITUDE_CONTEXTS - 1 })
    }

    /// Label from its position in the context table; out-of-range values
    /// saturate to the uniform context.
    pub const fn from_index(index: u8) -> Self {
        if index <= Self::UNIFORM.0 {
            Context(index)
        } else {
            Self::UNIFORM
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Which context family a coding step needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextRequest {
    ZeroCoding,
    Sign,
    Magnitude,
    RunLength,
    Uniform,
}

const fn bit(f: u8, mask: u16) -> u8 {
    ((f as u16 & mask) != 0) as u8
}

const fn zero_coding_label(f: u8, orientation: usize) -> u8 {
    let mut h = bit(f, SIG_W) + bit(f, SIG_E);
    let mut v = bit(f, SIG_N) + bit(f, SIG_S);
    let d = bit(f, SIG_NW) + bit(f, SIG_NE) + bit(f, SIG_SE) + bit(f, SIG_SW);

    if orientation == SubbandOrientation::HH as usize {
        let hv = h + v;
        return match d {
            0 => match hv {
                0 => 0,
                1 => 1,
                _ => 2,
            },
            1 => match hv {
                0 => 3,
                1 => 4,
                _ => 5,
            },
            2 => {
                if hv == 0 {
                    6
                } else {
                    7
                }
            }
            _ => 8,
        };
    }
    if orientation == SubbandOrientation::HL as usize {
        let t = h;
        h = v;
        v = t;
    }
    match h {
        0 => match v {
            0 => match d {
                0 => 0,
                1 => 1,
                _ => 2,
            },
            1 => 3,
            _ => 4,
        },
        1 => {
            if v == 0 {
                if d == 0 { 5 } else { 6 }
            } else {
                7
            }
        }
        _ => 8,
    }
}

const fn build_zero_coding_lut() -> [[u8; 256]; 4] {
    let mut lut = [[0u8; 256]; 4];
    let mut orientation = 0;
    while orientation < 4 {
        let mut f = 0;
        while f < 256 {
            lut[orientation][f] = zero_coding_label(f as u8, orientation);
            f += 1;
        }
        orientation += 1;
    }
    lut
}

// `key` is FlagWord::sign_neighbourhood(): N, E, S, W significance in the low
// nibble, their signs in the high nibble.
const fn sign_contributions(key: u8) -> (i32, i32) {
    let f = (key as u16) << 4;
    let east_pos = (f & (SIG_E | SGN_E)) == SIG_E;
    let east_neg = (f & (SIG_E | SGN_E)) == (SIG_E | SGN_E);
    let west_pos = (f & (SIG_W | SGN_W)) == SIG_W;
    let west_neg = (f & (SIG_W | SGN_W)) == (SIG_W | SGN_W);
    let north_pos = (f & (SIG_N | SGN_N)) == SIG_N;
    let north_neg = (f & (SIG_N | SGN_N)) == (SIG_N | SGN_N);
    let south_pos = (f & (SIG_S | SGN_S)) == SIG_S;
    let south_neg = (f & (SIG_S | SGN_S)) == (SIG_S | SGN_S);

    let hc = min1(east_pos as i32 + west_pos as i32) - min1(east_neg as i32 + west_neg as i32);
    let vc = min1(north_pos as i32 + south_pos as i32) - min1(north_neg as i32 + south_neg as i32);
    (hc, vc)
}

const fn min1(x: i32) -> i32 {
    if x > 1 { 1 } else { x }
}

const fn build_sign_lut() -> [(u8, u8); 256] {
    let mut lut = [(0u8, 0u8); 256];
    let mut key = 0;
    while key < 256 {
        let (hc, vc) = sign_contributions(key as u8);

        let prediction = if hc == 0 && vc == 0 {
            0
        } else {
            !(hc > 0 || (hc == 0 && vc > 0)) as u8
        };

        let (h, v) = if hc < 0 { (-hc, -vc) } else { (hc, vc) };
        let label = if h == 0 {
            if v == 0 { 0 } else { 1 }
        } else {
            match v {
                -1 => 2,
                0 => 3,
                _ => 4,
            }
        };
        lut[key] = (label, prediction);
        key += 1;
    }
    lut
}

static ZERO_CODING_LUT: [[u8; 256]; 4] = build_zero_coding_lut();
static SIGN_LUT: [(u8, u8); 256] = build_sign_lut();

/// Zero-coding context of a not yet significant coefficient.
#[inline]
pub fn zero_coding(flags: FlagWord, orientation: SubbandOrientation) -> Context {
    Context(ZERO_CODING_LUT[orientation as usize][flags.neighbour_significance() as usize])
}

/// Sign-coding context.
#[inline]
pub fn sign_coding(flags: FlagWord) -> Context {
    Context(SIGN_BASE + SIGN_LUT[flags.sign_neighbourhood() as usize].0)
}

/// Predicted sign bit; the coded symbol is `sign ^ prediction`.
#[inline]
pub fn sign_prediction(flags: FlagWord) -> u32 {
    SIGN_LUT[flags.sign_neighbourhood() as usize].1 as u32
}

/// Magnitude-refinement context.
#[inline]
pub fn magnitude(flags: FlagWord) -> Context {
    if flags.is_refined() {
        Context(MAGNITUDE_BASE + 2)
    } else if flags.has_significant_neighbour() {
        Context(MAGNITUDE_BASE + 1)
    } else {
        Context(MAGNITUDE_BASE)
    }
}

/// Context for a coding step.
pub fn context_for(
    flags: FlagWord,
    orientation: SubbandOrientation,
    request: ContextRequest,
) -> Context {
    match request {
        ContextRequest::ZeroCoding => zero_coding(flags, orientation),
        ContextRequest::Sign => sign_coding(flags),
        ContextRequest::Magnitude => magnitude(flags),
        ContextRequest::RunLength => Context::RUN_LENGTH,
        ContextRequest::Uniform => Context::UNIFORM,
    }
}
