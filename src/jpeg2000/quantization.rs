//! Dead-zone scalar quantizer helpers for the irreversible path.

/// `sign(x) * floor(|x| / step)`. A non-positive step leaves the value
/// truncated. Encoding quantizes in the kernels; this is their reference.
#[cfg(test)]
pub fn quantize_scalar(coeff: f32, step_size: f32) -> i32 {
    if step_size <= 0.0 {
        return coeff as i32;
    }
    let q = (coeff.abs() / step_size).floor() as i32;
    if coeff < 0.0 { -q } else { q }
}

/// Mid-point reconstruction: `(|q| + 0.5) * step` with the sign of `q`, and
/// zero stays zero.
pub fn dequantize_scalar(q: i32, step_size: f32) -> f32 {
    if q == 0 {
        return 0.0;
    }
    let magnitude = (q.unsigned_abs() as f32 + 0.5) * step_size;
    if q < 0 { -magnitude } else { magnitude }
}
