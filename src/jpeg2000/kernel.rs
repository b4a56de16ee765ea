//! Sample conversion into the Tier-1 fixed-point domain.
//!
//! Every backend must produce bit-identical output to [`ScalarKernel`].

use crate::constants::{FRACTIONAL_BITS, MAXIMUM_REVERSIBLE_MAGNITUDE};
use crate::error::EbcotError;

const LANES: usize = 8;

// Blocks smaller than this are not worth the chunked loop.
const CHUNKED_THRESHOLD: usize = 256;

// Largest scaled magnitude that still fits the sign-magnitude working domain.
const MAXIMUM_SCALED: f64 = i32::MAX as f64;

/// Converts code-block samples to scaled coefficients.
pub trait SampleKernel: Sync {
    fn name(&self) -> &'static str;

    /// Writes `v << 6` for every reversible sample and returns the largest
    /// scaled magnitude.
    fn scale_integer(&self, src: &[i32], dst: &mut [i32]) -> Result<u32, EbcotError>;

    /// Writes `trunc(x / step * 64)` for every irreversible sample and
    /// returns the largest scaled magnitude.
    fn quantize_float(&self, src: &[f32], step_size: f32, dst: &mut [i32])
    -> Result<u32, EbcotError>;
}

#[inline]
fn scale_one(v: i32) -> Result<i32, EbcotError> {
    if v.unsigned_abs() > MAXIMUM_REVERSIBLE_MAGNITUDE as u32 {
        return Err(EbcotError::InvalidArgumentMagnitude);
    }
    Ok(v << FRACTIONAL_BITS)
}

#[inline]
fn quantize_one(x: f32, inverse_step: f64) -> Result<i32, EbcotError> {
    let scaled = (x as f64 * inverse_step).trunc();
    if !scaled.is_finite() {
        return Err(EbcotError::InvalidArgumentMagnitude);
    }
    Ok(scaled.clamp(-MAXIMUM_SCALED, MAXIMUM_SCALED) as i32)
}

#[inline]
fn inverse_step(step_size: f32) -> Result<f64, EbcotError> {
    if !(step_size.is_finite() && step_size > 0.0) {
        return Err(EbcotError::InvalidArgumentStepSize);
    }
    Ok(f64::from(1u32 << FRACTIONAL_BITS) / step_size as f64)
}

/// Reference implementation, one sample at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarKernel;

impl SampleKernel for ScalarKernel {
    fn name(&self) -> &'static str {
        "scalar"
    }

    fn scale_integer(&self, src: &[i32], dst: &mut [i32]) -> Result<u32, EbcotError> {
        if src.len() != dst.len() {
            return Err(EbcotError::InvalidArgumentSampleCount);
        }
        let mut max = 0u32;
        for (d, &s) in dst.iter_mut().zip(src) {
            *d = scale_one(s)?;
            max = max.max(d.unsigned_abs());
        }
        Ok(max)
    }

    fn quantize_float(
        &self,
        src: &[f32],
        step_size: f32,
        dst: &mut [i32],
    ) -> Result<u32, EbcotError> {
        if src.len() != dst.len() {
            return Err(EbcotError::InvalidArgumentSampleCount);
        }
        let inv = inverse_step(step_size)?;
        let mut max = 0u32;
        for (d, &s) in dst.iter_mut().zip(src) {
            *d = quantize_one(s, inv)?;
            max = max.max(d.unsigned_abs());
        }
        Ok(max)
    }
}

/// Processes eight samples per step so the compiler can vectorise the
/// range check and the maximum reduction.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkedKernel;

impl SampleKernel for ChunkedKernel {
    fn name(&self) -> &'static str {
        "chunked"
    }

    fn scale_integer(&self, src: &[i32], dst: &mut [i32]) -> Result<u32, EbcotError> {
        if src.len() != dst.len() {
            return Err(EbcotError::InvalidArgumentSampleCount);
        }
        let limit = MAXIMUM_REVERSIBLE_MAGNITUDE as u32;
        let mut max = [0u32; LANES];
        let mut src_chunks = src.chunks_exact(LANES);
        let mut dst_chunks = dst.chunks_exact_mut(LANES);
        for (s, d) in (&mut src_chunks).zip(&mut dst_chunks) {
            let mut over = false;
            for lane in 0..LANES {
                let m = s[lane].unsigned_abs();
                over |= m > limit;
                max[lane] = max[lane].max(m);
                d[lane] = s[lane].wrapping_shl(FRACTIONAL_BITS);
            }
            if over {
                return Err(EbcotError::InvalidArgumentMagnitude);
            }
        }
        let mut largest = max.iter().copied().max().unwrap_or(0) << FRACTIONAL_BITS;
        let tail = ScalarKernel.scale_integer(src_chunks.remainder(), dst_chunks.into_remainder())?;
        largest = largest.max(tail);
        Ok(largest)
    }

    fn quantize_float(
        &self,
        src: &[f32],
        step_size: f32,
        dst: &mut [i32],
    ) -> Result<u32, EbcotError> {
        if src.len() != dst.len() {
            return Err(EbcotError::InvalidArgumentSampleCount);
        }
        let inv = inverse_step(step_size)?;
        let mut max = [0u32; LANES];
        let mut src_chunks = src.chunks_exact(LANES);
        let mut dst_chunks = dst.chunks_exact_mut(LANES);
        for (s, d) in (&mut src_chunks).zip(&mut dst_chunks) {
            let mut scaled = [0f64; LANES];
            for lane in 0..LANES {
                scaled[lane] = (s[lane] as f64 * inv).trunc();
            }
            if scaled.iter().any(|v| !v.is_finite()) {
                return Err(EbcotError::InvalidArgumentMagnitude);
            }
            for lane in 0..LANES {
                let q = scaled[lane].clamp(-MAXIMUM_SCALED, MAXIMUM_SCALED) as i32;
                d[lane] = q;
                max[lane] = max[lane].max(q.unsigned_abs());
            }
        }
        let tail =
            ScalarKernel.quantize_float(src_chunks.remainder(), step_size, dst_chunks.into_remainder())?;
        Ok(max.iter().copied().max().unwrap_or(0).max(tail))
    }
}

static SCALAR: ScalarKernel = ScalarKernel;
static CHUNKED: ChunkedKernel = ChunkedKernel;

/// Picks a backend for a block of `samples` samples.
pub fn select_kernel(samples: usize) -> &'static dyn SampleKernel {
    if samples >= CHUNKED_THRESHOLD {
        &CHUNKED
    } else {
        &SCALAR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lcg(seed: &mut u32) -> u32 {
        *seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
        *seed >> 8
    }

    #[test]
    fn test_scale_integer_matches_scalar() {
        let mut seed = 7;
        for len in [0usize, 1, 7, 8, 9, 63, 64, 300] {
            let src: Vec<i32> = (0..len)
                .map(|_| (lcg(&mut seed) % 200_001) as i32 - 100_000)
                .collect();
            let mut a = vec![0; len];
            let mut b = vec![0; len];
            let ma = ScalarKernel.scale_integer(&src, &mut a).unwrap();
            let mb = ChunkedKernel.scale_integer(&src, &mut b).unwrap();
            assert_eq!(a, b, "len {}", len);
            assert_eq!(ma, mb, "len {}", len);
        }
    }

    #[test]
    fn test_quantize_float_matches_scalar() {
        let mut seed = 11;
        let src: Vec<f32> = (0..517)
            .map(|_| (lcg(&mut seed) % 20_000) as f32 / 7.0 - 1400.0)
            .collect();
        let mut a = vec![0; src.len()];
        let mut b = vec![0; src.len()];
        let ma = ScalarKernel.quantize_float(&src, 0.37, &mut a).unwrap();
        let mb = ChunkedKernel.quantize_float(&src, 0.37, &mut b).unwrap();
        assert_eq!(a, b);
        assert_eq!(ma, mb);
    }

    #[test]
    fn test_scaling_values() {
        let mut dst = [0; 3];
        let max = ScalarKernel.scale_integer(&[1, -3, 0], &mut dst).unwrap();
        assert_eq!(dst, [64, -192, 0]);
        assert_eq!(max, 192);

        let max = ScalarKernel.quantize_float(&[1.0, -2.5, 0.01], 0.5, &mut dst).unwrap();
        assert_eq!(dst, [128, -320, 1]);
        assert_eq!(max, 320);
    }

    #[test]
    fn test_out_of_range_input_is_rejected() {
        let big = vec![MAXIMUM_REVERSIBLE_MAGNITUDE + 1; 16];
        let mut dst = vec![0; 16];
        assert_eq!(
            ScalarKernel.scale_integer(&big, &mut dst),
            Err(EbcotError::InvalidArgumentMagnitude)
        );
        assert_eq!(
            ChunkedKernel.scale_integer(&big, &mut dst),
            Err(EbcotError::InvalidArgumentMagnitude)
        );
        assert_eq!(
            ScalarKernel.quantize_float(&[f32::NAN], 1.0, &mut dst[..1]),
            Err(EbcotError::InvalidArgumentMagnitude)
        );
        assert_eq!(
            ScalarKernel.quantize_float(&[1.0], 0.0, &mut dst[..1]),
            Err(EbcotError::InvalidArgumentStepSize)
        );
    }

    #[test]
    fn test_select_kernel() {
        assert_eq!(select_kernel(16).name(), "scalar");
        assert_eq!(select_kernel(64 * 64).name(), "chunked");
    }
}
