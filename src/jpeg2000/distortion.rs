//! Distortion-reduction estimates for coding passes.
//!
//! The tables give the normalised mean-squared-error decrease ("nmsedec")
//! caused by coding one more bit of a coefficient, indexed by the seven bits
//! just below and including the bit being coded. Values carry 13 fractional
//! bits.

use std::sync::OnceLock;

use crate::constants::{FRACTIONAL_BITS, NMSEDEC_BITS};

const TABLE_SIZE: usize = 1 << NMSEDEC_BITS;
const TABLE_MASK: u32 = (1 << NMSEDEC_BITS) - 1;

struct NmsedecTables {
    sig: [i32; TABLE_SIZE],
    sig0: [i32; TABLE_SIZE],
    refine: [i32; TABLE_SIZE],
    refine0: [i32; TABLE_SIZE],
}

static TABLES: OnceLock<NmsedecTables> = OnceLock::new();

fn quantize_gain(gain: f64) -> i32 {
    let scale = f64::from(1u32 << FRACTIONAL_BITS);
    (((gain * scale + 0.5).floor() / scale * 8192.0) as i32).max(0)
}

fn tables() -> &'static NmsedecTables {
    TABLES.get_or_init(|| {
        let mut tables = NmsedecTables {
            sig: [0; TABLE_SIZE],
            sig0: [0; TABLE_SIZE],
            refine: [0; TABLE_SIZE],
            refine0: [0; TABLE_SIZE],
        };
        for i in 0..TABLE_SIZE {
            let t = i as f64 / f64::from(1u32 << FRACTIONAL_BITS);

            let (u, v) = (t, t - 1.5);
            tables.sig[i] = quantize_gain(u * u - v * v);
            tables.sig0[i] = quantize_gain(u * u);

            let u = t - 1.0;
            let v = if i & (1 << (NMSEDEC_BITS - 1)) != 0 {
                t - 1.5
            } else {
                t - 0.5
            };
            tables.refine[i] = quantize_gain(u * u - v * v);
            tables.refine0[i] = quantize_gain(u * u);
        }
        tables
    })
}

/// Gain of a coefficient becoming significant at `bit_plane`.
///
/// `magnitude` is in the fixed-point coding domain.
#[inline]
pub fn significance_gain(magnitude: u32, bit_plane: u32) -> i32 {
    let t = tables();
    let bit_pos = bit_plane + FRACTIONAL_BITS;
    if bit_pos > FRACTIONAL_BITS {
        t.sig[((magnitude >> (bit_pos - FRACTIONAL_BITS)) & TABLE_MASK) as usize]
    } else {
        t.sig0[(magnitude & TABLE_MASK) as usize]
    }
}

/// Gain of refining a significant coefficient at `bit_plane`.
#[inline]
pub fn refinement_gain(magnitude: u32, bit_plane: u32) -> i32 {
    let t = tables();
    let bit_pos = bit_plane + FRACTIONAL_BITS;
    if bit_pos > FRACTIONAL_BITS {
        t.refine[((magnitude >> (bit_pos - FRACTIONAL_BITS)) & TABLE_MASK) as usize]
    } else {
        t.refine0[(magnitude & TABLE_MASK) as usize]
    }
}

/// Weighted MSE reduction of a pass from its accumulated `nmsedec`.
///
/// `weight` is the synthesis norm of the subband and `step_size` the
/// quantizer step (1.0 for reversible coding).
pub fn weighted_mse(nmsedec: i64, bit_plane: u32, step_size: f64, weight: f64) -> f64 {
    let scale = weight * step_size * f64::from(1u32 << bit_plane.min(31));
    scale * scale * nmsedec as f64 / 8192.0
}
