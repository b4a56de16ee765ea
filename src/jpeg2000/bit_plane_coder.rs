//! Tier-1 bit-plane coder (ISO/IEC 15444-1 annex D).
//!
//! A code-block is coded one bit-plane at a time, most significant first,
//! in three passes per plane: significance propagation, magnitude refinement
//! and cleanup. Samples are visited in stripes of four rows, column by
//! column. The encoder records the rate and distortion of every pass for the
//! rate allocator; the decoder accepts the passes of a block in as many
//! contributions as there are quality layers.

use log::{debug, warn};

use crate::coding_parameters::CodeBlockStyle;
use crate::constants::{FRACTIONAL_BITS, MAXIMUM_BIT_PLANES};
use crate::error::EbcotError;
use crate::jpeg2000::context::{self, Context};
use crate::jpeg2000::distortion::{refinement_gain, significance_gain, weighted_mse};
use crate::jpeg2000::flags::{FlagGrid, FlagWord};
use crate::jpeg2000::image::{
    CodeBlock, CodeBlockGeometry, DecodeStatus, DecodedBlock, EncodedCodeBlock, SampleData,
    SubbandOrientation,
};
use crate::jpeg2000::kernel::select_kernel;
use crate::jpeg2000::mq_coder::{ContextStates, MqDecoder, MqEncoder};
use crate::jpeg2000::raw_coder::RawDecoder;
use crate::jpeg2000::segment::{PassKind, PassRecord, PassSchedule};

const SEGMENTATION_SYMBOL: u32 = 0b1010;

/// Receives the zero-coding, sign and refinement decisions of a pass.
trait SymbolSink {
    fn put(&mut self, cx: Context, bit: u32);
    fn put_sign(&mut self, flags: FlagWord, negative: bool);
}

impl SymbolSink for MqEncoder {
    #[inline]
    fn put(&mut self, cx: Context, bit: u32) {
        self.encode(cx, bit);
    }

    #[inline]
    fn put_sign(&mut self, flags: FlagWord, negative: bool) {
        let bit = negative as u32 ^ context::sign_prediction(flags);
        self.encode(context::sign_coding(flags), bit);
    }
}

/// Raw packing for lazy-mode passes; contexts are ignored and signs are
/// written as they are.
struct Bypass<'a>(&'a mut MqEncoder);

impl SymbolSink for Bypass<'_> {
    #[inline]
    fn put(&mut self, _cx: Context, bit: u32) {
        self.0.bypass_encode(bit);
    }

    #[inline]
    fn put_sign(&mut self, _flags: FlagWord, negative: bool) {
        self.0.bypass_encode(negative as u32);
    }
}

trait SymbolSource {
    fn get(&mut self, cx: Context) -> u32;
    /// Returns 1 for a negative sample.
    fn get_sign(&mut self, flags: FlagWord) -> u32;
}

impl SymbolSource for MqDecoder<'_> {
    #[inline]
    fn get(&mut self, cx: Context) -> u32 {
        self.decode(cx)
    }

    #[inline]
    fn get_sign(&mut self, flags: FlagWord) -> u32 {
        self.decode(context::sign_coding(flags)) ^ context::sign_prediction(flags)
    }
}

impl SymbolSource for RawDecoder<'_> {
    #[inline]
    fn get(&mut self, _cx: Context) -> u32 {
        self.decode()
    }

    #[inline]
    fn get_sign(&mut self, _flags: FlagWord) -> u32 {
        self.decode()
    }
}

fn zeroed<T: Clone + Default>(len: usize) -> Result<Vec<T>, EbcotError> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)?;
    v.resize(len, T::default());
    Ok(v)
}

/// Coefficients and flags of one code-block session.
///
/// On the encoder side `coefficients` hold the scaled input; on the decoder
/// side they hold the reconstruction built so far.
struct Plane {
    width: usize,
    height: usize,
    orientation: SubbandOrientation,
    vertically_causal: bool,
    flags: FlagGrid,
    coefficients: Vec<i32>,
}

impl Plane {
    fn new(
        width: usize,
        height: usize,
        orientation: SubbandOrientation,
        style: CodeBlockStyle,
    ) -> Result<Self, EbcotError> {
        Ok(Self {
            width,
            height,
            orientation,
            vertically_causal: style.vertically_causal,
            flags: FlagGrid::new(width, height)?,
            coefficients: zeroed(width * height)?,
        })
    }

    /// Flag word as the context former sees it for row `y` of the stripe
    /// starting at `stripe`.
    #[inline]
    fn context_flags(&self, index: usize, y: usize, stripe: usize) -> FlagWord {
        let f = self.flags.get(index);
        if self.vertically_causal && (y == stripe + 3 || y + 1 == self.height) {
            f.vertically_causal()
        } else {
            f
        }
    }

    fn run_length_candidate(&self, x: usize, stripe: usize) -> bool {
        if stripe + 3 >= self.height {
            return false;
        }
        (0..4).all(|r| {
            let y = stripe + r;
            self.context_flags(self.flags.index(x, y), y, stripe).is_idle()
        })
    }

    fn encode_significance<S: SymbolSink>(&mut self, sink: &mut S, bit_plane: u32) -> i64 {
        let shift = bit_plane + FRACTIONAL_BITS;
        let mut nmsedec = 0i64;
        for stripe in (0..self.height).step_by(4) {
            let end = (stripe + 4).min(self.height);
            for x in 0..self.width {
                for y in stripe..end {
                    let index = self.flags.index(x, y);
                    let f = self.context_flags(index, y, stripe);
                    if f.is_significant_or_visited() || !f.has_significant_neighbour() {
                        continue;
                    }
                    let value = self.coefficients[y * self.width + x];
                    let magnitude = value.unsigned_abs();
                    let bit = (magnitude >> shift) & 1;
                    sink.put(context::zero_coding(f, self.orientation), bit);
                    if bit == 1 {
                        nmsedec += significance_gain(magnitude, bit_plane) as i64;
                        sink.put_sign(f, value < 0);
                        self.flags.mark_significant(index, value < 0);
                    }
                    self.flags.set_visited(index);
                }
            }
        }
        nmsedec
    }

    fn encode_refinement<S: SymbolSink>(&mut self, sink: &mut S, bit_plane: u32) -> i64 {
        let shift = bit_plane + FRACTIONAL_BITS;
        let mut nmsedec = 0i64;
        for stripe in (0..self.height).step_by(4) {
            let end = (stripe + 4).min(self.height);
            for x in 0..self.width {
                for y in stripe..end {
                    let index = self.flags.index(x, y);
                    let f = self.context_flags(index, y, stripe);
                    if !f.needs_refinement() {
                        continue;
                    }
                    let magnitude = self.coefficients[y * self.width + x].unsigned_abs();
                    nmsedec += refinement_gain(magnitude, bit_plane) as i64;
                    sink.put(context::magnitude(f), (magnitude >> shift) & 1);
                    self.flags.set_refined(index);
                }
            }
        }
        nmsedec
    }

    fn encode_cleanup(&mut self, mq: &mut MqEncoder, bit_plane: u32) -> i64 {
        let shift = bit_plane + FRACTIONAL_BITS;
        let w = self.width;
        let mut nmsedec = 0i64;
        for stripe in (0..self.height).step_by(4) {
            let end = (stripe + 4).min(self.height);
            for x in 0..w {
                let aggregated = self.run_length_candidate(x, stripe);
                let mut start = stripe;
                if aggregated {
                    let run = (0..4)
                        .find(|&r| (self.coefficients[(stripe + r) * w + x].unsigned_abs() >> shift) & 1 == 1)
                        .unwrap_or(4);
                    mq.encode(Context::RUN_LENGTH, (run != 4) as u32);
                    if run == 4 {
                        continue;
                    }
                    mq.encode(Context::UNIFORM, (run >> 1) as u32);
                    mq.encode(Context::UNIFORM, (run & 1) as u32);
                    start = stripe + run;
                }
                for y in start..end {
                    let index = self.flags.index(x, y);
                    let f = self.context_flags(index, y, stripe);
                    // The first significant sample of a run is known to be
                    // significant; only its sign is coded.
                    let partial = aggregated && y == start;
                    if partial || !f.is_significant_or_visited() {
                        let value = self.coefficients[y * w + x];
                        let magnitude = value.unsigned_abs();
                        let bit = if partial {
                            1
                        } else {
                            let bit = (magnitude >> shift) & 1;
                            mq.encode(context::zero_coding(f, self.orientation), bit);
                            bit
                        };
                        if bit == 1 {
                            nmsedec += significance_gain(magnitude, bit_plane) as i64;
                            mq.put_sign(f, value < 0);
                            self.flags.mark_significant(index, value < 0);
                        }
                    }
                    self.flags.clear_visited(index);
                }
            }
        }
        nmsedec
    }

    fn decode_significance<S: SymbolSource>(&mut self, source: &mut S, bit_plane: u32) {
        let one = 1i32 << bit_plane;
        let one_plus_half = one | (one >> 1);
        for stripe in (0..self.height).step_by(4) {
            let end = (stripe + 4).min(self.height);
            for x in 0..self.width {
                for y in stripe..end {
                    let index = self.flags.index(x, y);
                    let f = self.context_flags(index, y, stripe);
                    if f.is_significant_or_visited() || !f.has_significant_neighbour() {
                        continue;
                    }
                    if source.get(context::zero_coding(f, self.orientation)) == 1 {
                        let negative = source.get_sign(f) == 1;
                        self.coefficients[y * self.width + x] =
                            if negative { -one_plus_half } else { one_plus_half };
                        self.flags.mark_significant(index, negative);
                    }
                    self.flags.set_visited(index);
                }
            }
        }
    }

    fn decode_refinement<S: SymbolSource>(&mut self, source: &mut S, bit_plane: u32) {
        let half = (1i32 << bit_plane) >> 1;
        let neg_half = if bit_plane > 0 { -half } else { -1 };
        for stripe in (0..self.height).step_by(4) {
            let end = (stripe + 4).min(self.height);
            for x in 0..self.width {
                for y in stripe..end {
                    let index = self.flags.index(x, y);
                    let f = self.context_flags(index, y, stripe);
                    if !f.needs_refinement() {
                        continue;
                    }
                    let t = if source.get(context::magnitude(f)) == 1 {
                        half
                    } else {
                        neg_half
                    };
                    let c = &mut self.coefficients[y * self.width + x];
                    *c += if *c < 0 { -t } else { t };
                    self.flags.set_refined(index);
                }
            }
        }
    }

    fn decode_cleanup(&mut self, mq: &mut MqDecoder<'_>, bit_plane: u32) {
        let one = 1i32 << bit_plane;
        let one_plus_half = one | (one >> 1);
        let w = self.width;
        for stripe in (0..self.height).step_by(4) {
            let end = (stripe + 4).min(self.height);
            for x in 0..w {
                let aggregated = self.run_length_candidate(x, stripe);
                let mut start = stripe;
                if aggregated {
                    if mq.decode(Context::RUN_LENGTH) == 0 {
                        continue;
                    }
                    let run = (mq.decode(Context::UNIFORM) << 1) | mq.decode(Context::UNIFORM);
                    start = stripe + run as usize;
                }
                for y in start..end {
                    let index = self.flags.index(x, y);
                    let f = self.context_flags(index, y, stripe);
                    let partial = aggregated && y == start;
                    if partial || !f.is_significant_or_visited() {
                        let significant = partial
                            || mq.decode(context::zero_coding(f, self.orientation)) == 1;
                        if significant {
                            let negative = mq.get_sign(f) == 1;
                            self.coefficients[y * w + x] =
                                if negative { -one_plus_half } else { one_plus_half };
                            self.flags.mark_significant(index, negative);
                        }
                    }
                    self.flags.clear_visited(index);
                }
            }
        }
    }

    fn significance(&self) -> Result<Vec<bool>, EbcotError> {
        let mut out = Vec::new();
        out.try_reserve_exact(self.width * self.height)?;
        for y in 0..self.height {
            for x in 0..self.width {
                out.push(self.flags.at(x, y).is_significant());
            }
        }
        Ok(out)
    }
}

/// Runs Tier-1 on one code-block.
///
/// The block is coded down to bit-plane 0. An all-zero block yields no
/// passes and no bytes.
pub fn encode_code_block(
    block: &CodeBlock,
    style: CodeBlockStyle,
) -> Result<EncodedCodeBlock, EbcotError> {
    let (w, h) = (block.width(), block.height());
    let area = w * h;
    let mut plane = Plane::new(w, h, block.orientation, style)?;

    let kernel = select_kernel(area);
    let max = match &block.samples {
        SampleData::Reversible(samples) => kernel.scale_integer(samples, &mut plane.coefficients)?,
        SampleData::Irreversible {
            samples,
            step_size,
        } => kernel.quantize_float(samples, *step_size, &mut plane.coefficients)?,
    };

    let num_bit_planes = if max == 0 {
        0
    } else {
        (32 - max.leading_zeros()).saturating_sub(FRACTIONAL_BITS) as u8
    };
    if num_bit_planes > block.max_bit_planes {
        return Err(EbcotError::InvalidArgumentBitPlanes);
    }

    let schedule = PassSchedule::new(num_bit_planes, style);
    let total = schedule.total_passes();
    let mut passes = Vec::new();
    passes.try_reserve_exact(total)?;

    let step_size = block.samples.step_size() as f64;
    let mut mq = MqEncoder::with_capacity(area / 2 + 64)?;
    let mut cumulative = 0.0;

    for index in 0..total {
        let position = schedule.position(index);
        let raw = schedule.is_raw(position);
        let bit_plane = position.bit_plane as u32;

        if index > 0 && schedule.is_terminated(index - 1) {
            if raw {
                mq.bypass_init();
            } else {
                mq.restart();
            }
        }

        let nmsedec = match position.kind {
            PassKind::Significance if raw => {
                plane.encode_significance(&mut Bypass(&mut mq), bit_plane)
            }
            PassKind::Significance => plane.encode_significance(&mut mq, bit_plane),
            PassKind::Refinement if raw => plane.encode_refinement(&mut Bypass(&mut mq), bit_plane),
            PassKind::Refinement => plane.encode_refinement(&mut mq, bit_plane),
            PassKind::Cleanup => {
                let n = plane.encode_cleanup(&mut mq, bit_plane);
                if style.segmentation_symbols {
                    mq.segmentation_symbol();
                }
                n
            }
        };
        cumulative += weighted_mse(nmsedec, bit_plane, step_size, block.distortion_weight);

        let terminated = schedule.is_terminated(index);
        let rate = if terminated {
            if raw {
                mq.bypass_flush(style.predictable_termination);
            } else if style.predictable_termination {
                mq.erterm();
            } else {
                mq.flush();
            }
            mq.num_bytes()
        } else if raw {
            mq.num_bytes() + mq.bypass_extra_bytes(style.predictable_termination)
        } else {
            mq.num_bytes() + mq.truncation_extra_bytes()
        };

        passes.push(PassRecord {
            bit_plane: position.bit_plane,
            kind: position.kind,
            rate,
            distortion: cumulative,
            length: 0,
            terminated,
        });

        if style.reset {
            mq.reset_contexts();
        }
    }

    let data = mq.finish();

    // Rates never run past the codeword and never decrease.
    let mut last = data.len();
    for pass in passes.iter_mut().rev() {
        if pass.rate > last {
            pass.rate = last;
        } else {
            last = pass.rate;
        }
    }
    let mut previous = 0;
    for pass in passes.iter_mut() {
        // A truncation point must not end on 0xFF.
        if pass.rate > 0 && data[pass.rate - 1] == 0xFF {
            pass.rate -= 1;
        }
        pass.length = pass.rate.saturating_sub(previous);
        previous = pass.rate;
    }

    debug!(
        "code-block {}x{} ({:?}): {} bit-planes, {} passes, {} bytes",
        w,
        h,
        block.orientation,
        num_bit_planes,
        passes.len(),
        data.len()
    );

    Ok(EncodedCodeBlock {
        geometry: block.geometry,
        orientation: block.orientation,
        num_bit_planes,
        zero_bit_planes: block.max_bit_planes - num_bit_planes,
        data,
        passes,
    })
}

struct Checkpoint {
    flags: FlagGrid,
    coefficients: Vec<i32>,
    contexts: ContextStates,
}

/// Resumable Tier-1 decoder for one code-block.
///
/// Each call to [`add_contribution`](Self::add_contribution) hands over the
/// bytes and pass count a quality layer adds for one codeword segment.
/// Closed segments are decoded once. A segment left open is decoded from a
/// saved state again when a later layer extends it.
pub struct BlockDecoder {
    geometry: CodeBlockGeometry,
    style: CodeBlockStyle,
    schedule: PassSchedule,
    plane: Plane,
    contexts: ContextStates,
    checkpoint: Option<Checkpoint>,
    segment_start: usize,
    segment_end: usize,
    segment_data: Vec<u8>,
    passes_received: usize,
    passes_decoded: usize,
    status: DecodeStatus,
}

impl BlockDecoder {
    pub fn new(
        geometry: CodeBlockGeometry,
        orientation: SubbandOrientation,
        style: CodeBlockStyle,
        num_bit_planes: u8,
    ) -> Result<Self, EbcotError> {
        geometry.validate()?;
        if num_bit_planes > MAXIMUM_BIT_PLANES {
            return Err(EbcotError::InvalidArgumentBitPlanes);
        }
        Ok(Self {
            geometry,
            style,
            schedule: PassSchedule::new(num_bit_planes, style),
            plane: Plane::new(geometry.width(), geometry.height(), orientation, style)?,
            contexts: ContextStates::new(),
            checkpoint: None,
            segment_start: 0,
            segment_end: 0,
            segment_data: Vec::new(),
            passes_received: 0,
            passes_decoded: 0,
            status: DecodeStatus::Complete,
        })
    }

    pub fn passes_received(&self) -> usize {
        self.passes_received
    }

    pub fn passes_decoded(&self) -> usize {
        self.passes_decoded
    }

    pub fn status(&self) -> DecodeStatus {
        self.status
    }

    pub fn num_bit_planes(&self) -> u8 {
        self.schedule.num_bit_planes()
    }

    /// Stops decoding on a malformed contribution. The first error is kept.
    fn reject(&mut self, error: EbcotError) -> Result<(), EbcotError> {
        if self.status == DecodeStatus::Complete {
            self.status = DecodeStatus::Incomplete { error };
        }
        Err(error)
    }

    /// Appends `passes` more coding passes carried by `data`.
    ///
    /// The passes must stay within the codeword segment the contribution
    /// starts in. Once decoding has stopped on corrupt data further
    /// contributions are ignored.
    pub fn add_contribution(&mut self, data: &[u8], passes: usize) -> Result<(), EbcotError> {
        if passes == 0 {
            return if data.is_empty() {
                Ok(())
            } else {
                self.reject(EbcotError::InvalidPassCount)
            };
        }
        if self.status != DecodeStatus::Complete {
            return Ok(());
        }
        let received = self.passes_received + passes;
        if received > self.schedule.total_passes() {
            warn!(
                "code-block at ({}, {}): {} passes for {} bit-planes",
                self.geometry.x0,
                self.geometry.y0,
                received,
                self.schedule.num_bit_planes()
            );
            return self.reject(EbcotError::TooManyCodingPasses);
        }

        if self.passes_received == self.segment_end {
            self.segment_start = self.passes_received;
            self.segment_end = self.schedule.segment_end(self.segment_start);
            self.segment_data.clear();
            self.checkpoint = None;
        }
        if received > self.segment_end {
            return self.reject(EbcotError::InvalidPassCount);
        }

        self.segment_data.try_reserve(data.len())?;
        if received < self.segment_end && self.checkpoint.is_none() {
            let mut coefficients = Vec::new();
            coefficients.try_reserve_exact(self.plane.coefficients.len())?;
            coefficients.extend_from_slice(&self.plane.coefficients);
            self.checkpoint = Some(Checkpoint {
                flags: self.plane.flags.try_clone()?,
                coefficients,
                contexts: self.contexts,
            });
        }
        self.segment_data.extend_from_slice(data);

        if self.passes_decoded > self.segment_start {
            if let Some(checkpoint) = &self.checkpoint {
                self.plane.flags.copy_from(&checkpoint.flags);
                self.plane.coefficients.copy_from_slice(&checkpoint.coefficients);
                self.contexts = checkpoint.contexts;
                self.passes_decoded = self.segment_start;
            }
        }
        self.passes_received = received;
        self.decode_open_segment();

        if self.passes_received == self.segment_end {
            self.checkpoint = None;
        }
        Ok(())
    }

    fn decode_open_segment(&mut self) {
        let data = &self.segment_data;
        let plane = &mut self.plane;
        let first = self.schedule.position(self.segment_start);

        if self.schedule.is_raw(first) {
            let mut raw = RawDecoder::new(data);
            while self.passes_decoded < self.passes_received {
                let position = self.schedule.position(self.passes_decoded);
                let bit_plane = position.bit_plane as u32;
                match position.kind {
                    PassKind::Significance => plane.decode_significance(&mut raw, bit_plane),
                    PassKind::Refinement => plane.decode_refinement(&mut raw, bit_plane),
                    // Raw segments never hold a cleanup pass.
                    PassKind::Cleanup => {}
                }
                self.passes_decoded += 1;
            }
            return;
        }

        let mut mq = MqDecoder::new(data, self.contexts);
        let mut fault = None;
        while self.passes_decoded < self.passes_received {
            let position = self.schedule.position(self.passes_decoded);
            let bit_plane = position.bit_plane as u32;
            match position.kind {
                PassKind::Significance => plane.decode_significance(&mut mq, bit_plane),
                PassKind::Refinement => plane.decode_refinement(&mut mq, bit_plane),
                PassKind::Cleanup => {
                    plane.decode_cleanup(&mut mq, bit_plane);
                    if self.style.segmentation_symbols {
                        let mut symbol = 0;
                        for _ in 0..4 {
                            symbol = (symbol << 1) | mq.decode(Context::UNIFORM);
                        }
                        if symbol != SEGMENTATION_SYMBOL {
                            fault = Some(EbcotError::SegmentationSymbolMismatch);
                        }
                    }
                }
            }
            if self.style.reset {
                mq.contexts_mut().reset();
            }
            self.passes_decoded += 1;
            if fault.is_some() {
                break;
            }
        }
        self.contexts = mq.into_contexts();

        if let Some(error) = fault {
            warn!(
                "code-block at ({}, {}): {} after pass {}",
                self.geometry.x0, self.geometry.y0, error, self.passes_decoded
            );
            self.status = DecodeStatus::Incomplete { error };
        }
    }

    /// Copy of the reconstruction so far.
    pub fn snapshot(&self) -> Result<DecodedBlock, EbcotError> {
        let mut coefficients = Vec::new();
        coefficients.try_reserve_exact(self.plane.coefficients.len())?;
        coefficients.extend_from_slice(&self.plane.coefficients);
        Ok(DecodedBlock {
            geometry: self.geometry,
            coefficients,
            significance: self.plane.significance()?,
            passes_decoded: self.passes_decoded,
            status: self.status,
        })
    }

    pub fn finish(self) -> Result<DecodedBlock, EbcotError> {
        let significance = self.plane.significance()?;
        Ok(DecodedBlock {
            geometry: self.geometry,
            coefficients: self.plane.coefficients,
            significance,
            passes_decoded: self.passes_decoded,
            status: self.status,
        })
    }
}

/// Decodes the first `passes` passes of an encoded block in one go.
pub fn decode_code_block(
    encoded: &EncodedCodeBlock,
    style: CodeBlockStyle,
    passes: usize,
) -> Result<DecodedBlock, EbcotError> {
    let mut decoder = BlockDecoder::new(
        encoded.geometry,
        encoded.orientation,
        style,
        encoded.num_bit_planes,
    )?;
    let schedule = PassSchedule::new(encoded.num_bit_planes, style);
    let passes = passes.min(encoded.passes.len());
    let mut start = 0;
    let mut byte_start = 0;
    while start < passes {
        let end = schedule.segment_end(start).min(passes);
        let byte_end = encoded.rate_at(end);
        if byte_end > encoded.data.len() || byte_end < byte_start {
            return Err(EbcotError::TruncatedCodeBlockData);
        }
        decoder.add_contribution(&encoded.data[byte_start..byte_end], end - start)?;
        start = end;
        byte_start = byte_end;
    }
    decoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lcg(seed: &mut u32) -> u32 {
        *seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
        *seed >> 16
    }

    fn random_block(w: u32, h: u32, range: i32, seed: u32) -> CodeBlock {
        let mut s = seed;
        let samples = (0..w * h)
            .map(|_| (lcg(&mut s) as i32 % (2 * range + 1)) - range)
            .collect();
        CodeBlock::reversible(
            CodeBlockGeometry::with_size(w, h),
            SubbandOrientation::HL,
            samples,
            16,
        )
        .unwrap()
    }

    fn samples_of(block: &CodeBlock) -> &[i32] {
        match &block.samples {
            SampleData::Reversible(v) => v,
            SampleData::Irreversible { .. } => panic!("reversible block expected"),
        }
    }

    #[test]
    fn test_zero_block_has_no_passes() {
        let g = CodeBlockGeometry::with_size(8, 8);
        let block = CodeBlock::reversible(g, SubbandOrientation::LL, vec![0; 64], 8).unwrap();
        let encoded = encode_code_block(&block, CodeBlockStyle::default()).unwrap();
        assert_eq!(encoded.num_bit_planes, 0);
        assert_eq!(encoded.zero_bit_planes, 8);
        assert!(encoded.passes.is_empty());
        assert!(encoded.data.is_empty());

        let decoded = decode_code_block(&encoded, CodeBlockStyle::default(), 0).unwrap();
        assert!(decoded.coefficients.iter().all(|&c| c == 0));
        assert!(decoded.is_complete());
    }

    #[test]
    fn test_termall_first_cleanup_sets_top_plane() {
        let g = CodeBlockGeometry::with_size(4, 4);
        let mut samples = vec![0; 16];
        samples[0] = 15;
        samples[15] = -15;
        let block = CodeBlock::reversible(g, SubbandOrientation::LL, samples.clone(), 8).unwrap();
        let style = CodeBlockStyle {
            terminate_all: true,
            ..Default::default()
        };
        let encoded = encode_code_block(&block, style).unwrap();
        assert_eq!(encoded.num_bit_planes, 4);
        assert_eq!(encoded.passes.len(), 10);
        assert_eq!(encoded.passes[0].kind, PassKind::Cleanup);

        let first = decode_code_block(&encoded, style, 1).unwrap();
        assert_eq!(first.coefficient(0, 0), Some(12));
        assert_eq!(first.coefficient(3, 3), Some(-12));
        assert_eq!(first.is_significant(0, 0), Some(true));
        assert_eq!(first.is_significant(1, 1), Some(false));
        assert_eq!(first.coefficient(4, 0), None);
        assert_eq!(first.is_significant(0, 4), None);

        let full = decode_code_block(&encoded, style, encoded.passes.len()).unwrap();
        assert_eq!(full.coefficients, samples);
    }

    #[test]
    fn test_lossless_roundtrip_every_style() {
        let block = random_block(13, 11, 300, 42);
        for style in CodeBlockStyle::all() {
            let encoded = encode_code_block(&block, style).unwrap();
            let decoded = decode_code_block(&encoded, style, encoded.passes.len()).unwrap();
            assert!(decoded.is_complete(), "style {:#04x}", style.bits());
            assert_eq!(decoded.coefficients, samples_of(&block), "style {:#04x}", style.bits());
        }
    }

    #[test]
    fn test_pass_rates_are_consistent() {
        let block = random_block(32, 32, 1000, 3);
        for bits in [0x00u8, 0x01, 0x04, 0x11, 0x3F] {
            let style = CodeBlockStyle::from_bits(bits).unwrap();
            let encoded = encode_code_block(&block, style).unwrap();
            let mut previous_rate = 0;
            let mut previous_distortion = 0.0;
            for pass in &encoded.passes {
                assert!(pass.rate >= previous_rate);
                assert!(pass.distortion >= previous_distortion);
                assert_eq!(pass.length, pass.rate - previous_rate);
                previous_rate = pass.rate;
                previous_distortion = pass.distortion;
            }
            let last = encoded.passes.last().unwrap();
            assert!(last.terminated);
            assert_eq!(last.rate, encoded.data.len());
        }
    }

    #[test]
    fn test_incremental_decode_matches_one_shot() {
        let block = random_block(16, 16, 500, 9);
        for bits in [0x00u8, 0x01, 0x02, 0x05, 0x20] {
            let style = CodeBlockStyle::from_bits(bits).unwrap();
            let encoded = encode_code_block(&block, style).unwrap();
            let schedule = PassSchedule::new(encoded.num_bit_planes, style);
            let total = encoded.passes.len();

            let mut decoder = BlockDecoder::new(
                encoded.geometry,
                encoded.orientation,
                style,
                encoded.num_bit_planes,
            )
            .unwrap();
            // Feed two passes at a time, cut at segment boundaries.
            let mut start = 0;
            let mut byte_start = 0;
            while start < total {
                let end = (start + 2).min(schedule.segment_end(start));
                let byte_end = encoded.rate_at(end);
                decoder
                    .add_contribution(&encoded.data[byte_start..byte_end], end - start)
                    .unwrap();
                let incremental = decoder.snapshot().unwrap();
                let one_shot = decode_code_block(&encoded, style, end).unwrap();
                assert_eq!(incremental.coefficients, one_shot.coefficients, "style {:#04x}, {} passes", bits, end);
                assert_eq!(incremental.passes_decoded, end);
                start = end;
                byte_start = byte_end;
            }
            assert_eq!(decoder.finish().unwrap().coefficients, samples_of(&block));
        }
    }

    #[test]
    fn test_irreversible_roundtrip() {
        let step = 0.5f32;
        let samples: Vec<f32> = (0..64).map(|i| ((i as f32) - 32.0) * 3.0 * step + 0.3 * step).collect();
        let block = CodeBlock::irreversible(
            CodeBlockGeometry::with_size(8, 8),
            SubbandOrientation::HH,
            samples.clone(),
            step,
            12,
        )
        .unwrap();
        let encoded = encode_code_block(&block, CodeBlockStyle::default()).unwrap();
        let decoded = decode_code_block(&encoded, CodeBlockStyle::default(), usize::MAX).unwrap();
        for (q, x) in decoded.coefficients.iter().zip(&samples) {
            assert_eq!(*q, crate::jpeg2000::quantization::quantize_scalar(*x, step));
        }
    }

    #[test]
    fn test_magnitude_and_bit_plane_limits() {
        let g = CodeBlockGeometry::with_size(2, 2);
        let block = CodeBlock::reversible(g, SubbandOrientation::LL, vec![1 << 25, 0, 0, 0], 25).unwrap();
        assert_eq!(
            encode_code_block(&block, CodeBlockStyle::default()),
            Err(EbcotError::InvalidArgumentMagnitude)
        );
        let block = CodeBlock::reversible(g, SubbandOrientation::LL, vec![256, 0, 0, 0], 8).unwrap();
        assert_eq!(
            encode_code_block(&block, CodeBlockStyle::default()),
            Err(EbcotError::InvalidArgumentBitPlanes)
        );
    }

    #[test]
    fn test_too_many_passes_is_reported() {
        let g = CodeBlockGeometry::with_size(4, 4);
        let mut decoder =
            BlockDecoder::new(g, SubbandOrientation::LL, CodeBlockStyle::default(), 2).unwrap();
        assert_eq!(
            decoder.add_contribution(&[0x12, 0x34], 5),
            Err(EbcotError::TooManyCodingPasses)
        );
        assert_eq!(
            decoder.status(),
            DecodeStatus::Incomplete {
                error: EbcotError::TooManyCodingPasses
            }
        );
    }

    #[test]
    fn test_contribution_cannot_cross_segment() {
        let g = CodeBlockGeometry::with_size(4, 4);
        let style = CodeBlockStyle {
            terminate_all: true,
            ..Default::default()
        };
        let mut decoder = BlockDecoder::new(g, SubbandOrientation::LL, style, 4).unwrap();
        assert_eq!(decoder.add_contribution(&[0x12, 0x34], 2), Err(EbcotError::InvalidPassCount));
        let rejected = DecodeStatus::Incomplete {
            error: EbcotError::InvalidPassCount,
        };
        assert_eq!(decoder.status(), rejected);
        // Later contributions are ignored once decoding has stopped.
        assert!(decoder.add_contribution(&[0x00], 1).is_ok());
        let block = decoder.finish().unwrap();
        assert_eq!(block.status, rejected);
        assert_eq!(block.passes_decoded, 0);
        assert!(block.coefficients.iter().all(|&c| c == 0));
    }

    #[test]
    fn test_bytes_without_passes_are_rejected() {
        let g = CodeBlockGeometry::with_size(4, 4);
        let mut decoder =
            BlockDecoder::new(g, SubbandOrientation::LL, CodeBlockStyle::default(), 3).unwrap();
        assert!(decoder.add_contribution(&[], 0).is_ok());
        assert_eq!(decoder.status(), DecodeStatus::Complete);
        assert_eq!(decoder.add_contribution(&[0x55], 0), Err(EbcotError::InvalidPassCount));
        assert_eq!(
            decoder.finish().unwrap().status,
            DecodeStatus::Incomplete {
                error: EbcotError::InvalidPassCount
            }
        );
    }

    #[test]
    fn test_corrupt_segmentation_symbol_stops_decoding() {
        let style = CodeBlockStyle {
            segmentation_symbols: true,
            ..Default::default()
        };
        let block = random_block(8, 8, 100, 5);
        let encoded = encode_code_block(&block, style).unwrap();
        let mut seed = 77;
        let mut mismatches = 0;
        for _ in 0..32 {
            let mut corrupt = encoded.clone();
            for b in corrupt.data.iter_mut() {
                *b = (lcg(&mut seed) & 0x7F) as u8;
            }
            let decoded = decode_code_block(&corrupt, style, corrupt.passes.len()).unwrap();
            match decoded.status {
                DecodeStatus::Complete => {}
                DecodeStatus::Incomplete { error } => {
                    assert_eq!(error, EbcotError::SegmentationSymbolMismatch);
                    assert!(decoded.passes_decoded <= corrupt.passes.len());
                    mismatches += 1;
                }
            }
        }
        assert!(mismatches > 0);
    }
}
