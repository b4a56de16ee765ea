//! Post-compression rate-distortion optimisation (PCRD-opt).
//!
//! Every code-block's pass list is reduced to the convex hull of its
//! (rate, distortion) points. A slope threshold λ then picks, per block, the
//! last hull point whose slope is at least λ; λ is bisected per layer until
//! the layer target is met.

use std::ops::Range;

use log::{debug, info};

use crate::coding_parameters::{LayerTarget, RateControl};
use crate::error::EbcotError;
use crate::jpeg2000::image::EncodedCodeBlock;
use crate::jpeg2000::segment::PassRecord;

/// Slopes within this distance of the threshold count as equal and are
/// included.
pub const SLOPE_EPSILON: f64 = 1e-9;

/// Candidate truncation point on a block's rate-distortion hull.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HullPoint {
    /// Passes included when truncating here.
    pub passes: usize,
    pub rate: usize,
    pub distortion: f64,
    /// Distortion reduction per byte from the previous hull point.
    pub slope: f64,
}

/// Reduces a pass list to its upper convex hull; slopes strictly decrease
/// along the result.
pub fn convex_hull(passes: &[PassRecord]) -> Vec<HullPoint> {
    let mut hull: Vec<HullPoint> = Vec::with_capacity(passes.len());
    for (i, pass) in passes.iter().enumerate() {
        loop {
            let (rate, distortion, slope) = hull
                .last()
                .map_or((0, 0.0, f64::INFINITY), |p| (p.rate, p.distortion, p.slope));
            let dd = pass.distortion - distortion;
            if dd <= 0.0 {
                break;
            }
            let dr = pass.rate.saturating_sub(rate);
            let new_slope = if dr == 0 {
                f64::INFINITY
            } else {
                dd / dr as f64
            };
            if !hull.is_empty() && new_slope >= slope {
                hull.pop();
                continue;
            }
            hull.push(HullPoint {
                passes: i + 1,
                rate: pass.rate,
                distortion: pass.distortion,
                slope: new_slope,
            });
            break;
        }
    }
    hull
}

/// Truncation points chosen for every layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerAllocation {
    /// `truncation[layer][block]`: cumulative passes included up to and
    /// including `layer`.
    pub truncation: Vec<Vec<usize>>,
    /// Slope threshold selected for each layer.
    pub thresholds: Vec<f64>,
    /// Cumulative code-block bytes up to each layer.
    pub layer_rates: Vec<usize>,
}

impl LayerAllocation {
    pub fn num_layers(&self) -> usize {
        self.truncation.len()
    }

    pub fn passes(&self, layer: usize, block: usize) -> usize {
        self.truncation[layer][block]
    }
}

/// Passes and bytes one layer adds to a code-block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerContribution {
    pub first_pass: usize,
    pub passes: usize,
    pub bytes: Range<usize>,
}

impl LayerContribution {
    pub fn data<'a>(&self, block: &'a EncodedCodeBlock) -> &'a [u8] {
        &block.data[self.bytes.clone()]
    }
}

/// Splits the allocation of `block` (at index `index`) into per-layer
/// contributions.
pub fn layer_contributions(
    allocation: &LayerAllocation,
    index: usize,
    block: &EncodedCodeBlock,
) -> Vec<LayerContribution> {
    let mut previous = 0;
    allocation
        .truncation
        .iter()
        .map(|layer| {
            let passes = layer[index];
            let contribution = LayerContribution {
                first_pass: previous,
                passes: passes - previous,
                bytes: block.rate_at(previous)..block.rate_at(passes),
            };
            previous = passes;
            contribution
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct RateAllocator {
    control: RateControl,
}

struct BlockHull<'a> {
    block: &'a EncodedCodeBlock,
    hull: Vec<HullPoint>,
}

impl BlockHull<'_> {
    fn select(&self, lambda: f64, floor: usize) -> usize {
        let mut passes = 0;
        for point in &self.hull {
            if point.slope >= lambda - SLOPE_EPSILON {
                passes = point.passes;
            } else {
                break;
            }
        }
        passes.max(floor)
    }
}

impl RateAllocator {
    pub fn new(control: RateControl) -> Result<Self, EbcotError> {
        control.validate()?;
        Ok(Self { control })
    }

    pub fn control(&self) -> &RateControl {
        &self.control
    }

    fn rate(hulls: &[BlockHull<'_>], lambda: f64, floor: &[usize]) -> usize {
        hulls
            .iter()
            .zip(floor)
            .map(|(h, &f)| h.block.rate_at(h.select(lambda, f)))
            .sum()
    }

    fn distortion(hulls: &[BlockHull<'_>], lambda: f64, floor: &[usize]) -> f64 {
        hulls
            .iter()
            .zip(floor)
            .map(|(h, &f)| h.block.distortion_at(h.select(lambda, f)))
            .sum()
    }

    /// Largest threshold whose allocation fits `budget` bytes; infinity when
    /// even adding nothing does not fit.
    fn bisect_bytes(&self, hulls: &[BlockHull<'_>], floor: &[usize], budget: usize, max_slope: f64) -> f64 {
        if Self::rate(hulls, 0.0, floor) <= budget {
            return 0.0;
        }
        let (mut lo, mut hi) = (0.0, max_slope);
        let mut best = f64::INFINITY;
        for _ in 0..self.control.iterations {
            let mid = (lo + hi) / 2.0;
            let rate = Self::rate(hulls, mid, floor);
            if rate <= budget {
                best = mid;
                hi = mid;
                if budget - rate <= self.control.tolerance {
                    break;
                }
            } else {
                lo = mid;
            }
        }
        best
    }

    /// Largest threshold whose allocation reaches `target` distortion
    /// reduction; zero (everything) when the target is out of reach.
    fn bisect_distortion(&self, hulls: &[BlockHull<'_>], floor: &[usize], target: f64, max_slope: f64) -> f64 {
        if Self::distortion(hulls, 0.0, floor) < target {
            return 0.0;
        }
        let (mut lo, mut hi) = (0.0, max_slope);
        let mut best = 0.0;
        for _ in 0..self.control.iterations {
            let mid = (lo + hi) / 2.0;
            if Self::distortion(hulls, mid, floor) >= target {
                best = mid;
                lo = mid;
            } else {
                hi = mid;
            }
        }
        best
    }

    /// Chooses the truncation point of every block for every layer.
    pub fn allocate(&self, blocks: &[EncodedCodeBlock]) -> Result<LayerAllocation, EbcotError> {
        let mut hulls = Vec::new();
        hulls.try_reserve_exact(blocks.len())?;
        hulls.extend(blocks.iter().map(|block| BlockHull {
            block,
            hull: convex_hull(&block.passes),
        }));

        let max_slope = hulls
            .iter()
            .flat_map(|h| h.hull.iter().map(|p| p.slope))
            .filter(|s| s.is_finite())
            .fold(0.0, f64::max)
            .max(1.0);
        debug!("rate allocation over {} blocks, max slope {:.3}", blocks.len(), max_slope);

        let layers = self.control.layers.len();
        let mut allocation = LayerAllocation {
            truncation: Vec::with_capacity(layers),
            thresholds: Vec::with_capacity(layers),
            layer_rates: Vec::with_capacity(layers),
        };
        let mut floor = vec![0usize; blocks.len()];

        for (layer, target) in self.control.layers.iter().enumerate() {
            let threshold = match *target {
                LayerTarget::Bytes(budget) => self.bisect_bytes(&hulls, &floor, budget, max_slope),
                LayerTarget::Distortion(d) => self.bisect_distortion(&hulls, &floor, d, max_slope),
                LayerTarget::Lossless => 0.0,
            };
            let truncation: Vec<usize> = match *target {
                LayerTarget::Lossless => hulls.iter().map(|h| h.block.passes.len()).collect(),
                _ => hulls
                    .iter()
                    .zip(&floor)
                    .map(|(h, &f)| h.select(threshold, f))
                    .collect(),
            };
            let rate: usize = hulls
                .iter()
                .zip(&truncation)
                .map(|(h, &n)| h.block.rate_at(n))
                .sum();
            info!(
                "layer {}: threshold {:.6}, {} bytes, {} passes",
                layer,
                threshold,
                rate,
                truncation.iter().sum::<usize>()
            );
            floor.copy_from_slice(&truncation);
            allocation.truncation.push(truncation);
            allocation.thresholds.push(threshold);
            allocation.layer_rates.push(rate);
        }
        Ok(allocation)
    }
}
