//! Rate-distortion hulls and quality layer formation on real pass tables

use ebcot_rs::jpeg2000::rate_allocator::{convex_hull, layer_contributions};
use ebcot_rs::{
    CodeBlock, CodeBlockGeometry, CodeBlockStyle, EbcotError, EncodedCodeBlock, LayerTarget, PassKind,
    PassRecord, RateAllocator, RateControl, SubbandOrientation, encode_code_block,
};

fn lcg(seed: &mut u32) -> u32 {
    *seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
    *seed >> 16
}

fn encoded_block(w: u32, h: u32, range: i32, seed: u32, style: CodeBlockStyle) -> EncodedCodeBlock {
    let mut s = seed;
    let samples = (0..w * h)
        .map(|_| (lcg(&mut s) as i32 % (2 * range + 1)) - range)
        .collect();
    let orientation = [SubbandOrientation::HL, SubbandOrientation::LH, SubbandOrientation::HH][seed as usize % 3];
    let block = CodeBlock::reversible(CodeBlockGeometry::with_size(w, h), orientation, samples, 16).unwrap();
    encode_code_block(&block, style).unwrap()
}

fn synthetic(distortions: &[f64]) -> EncodedCodeBlock {
    let passes = distortions
        .iter()
        .enumerate()
        .map(|(i, &distortion)| PassRecord {
            bit_plane: 0,
            kind: PassKind::Cleanup,
            rate: i + 1,
            distortion,
            length: 1,
            terminated: i + 1 == distortions.len(),
        })
        .collect();
    EncodedCodeBlock {
        geometry: CodeBlockGeometry::with_size(4, 4),
        orientation: SubbandOrientation::LL,
        num_bit_planes: 1,
        zero_bit_planes: 0,
        data: vec![0; distortions.len()],
        passes,
    }
}

#[test]
fn test_hull_slopes_strictly_decrease() {
    for bits in [0x00u8, 0x01, 0x04, 0x3F] {
        let style = CodeBlockStyle::from_bits(bits).unwrap();
        for seed in 0..6 {
            let block = encoded_block(16, 16, 50 << seed, seed, style);
            let hull = convex_hull(&block.passes);
            assert!(!hull.is_empty());
            for pair in hull.windows(2) {
                assert!(pair[1].slope < pair[0].slope, "style {:#04x}, seed {}", bits, seed);
                assert!(pair[1].rate > pair[0].rate);
                assert!(pair[1].distortion > pair[0].distortion);
            }
            // The full block is always a truncation candidate.
            let last = hull.last().unwrap();
            assert_eq!(last.distortion, block.passes.last().unwrap().distortion);
        }
    }
}

#[test]
fn test_steepest_passes_win_the_budget() {
    // Per-pass gains 10, 5, 2 and 8, 4, 1 at one byte each.
    let a = synthetic(&[10.0, 15.0, 17.0]);
    let b = synthetic(&[8.0, 12.0, 13.0]);
    let allocator =
        RateAllocator::new(RateControl::with_layers(vec![LayerTarget::Bytes(4)])).unwrap();
    let allocation = allocator.allocate(&[a, b]).unwrap();
    assert_eq!(allocation.truncation[0], vec![2, 2]);
    assert_eq!(allocation.layer_rates[0], 4);
}

#[test]
fn test_budget_conformance_and_lagrangian_bound() {
    let style = CodeBlockStyle::default();
    let blocks: Vec<EncodedCodeBlock> = (0..3)
        .map(|s| encoded_block(8, 8, 40 + 60 * s as i32, s + 1, style))
        .collect();
    let total: usize = blocks.iter().map(|b| b.data.len()).sum();

    for budget in [total / 4, total / 2, 3 * total / 4] {
        let control = RateControl {
            layers: vec![LayerTarget::Bytes(budget)],
            iterations: 64,
            tolerance: 0,
        };
        let allocation = RateAllocator::new(control).unwrap().allocate(&blocks).unwrap();
        let rate = allocation.layer_rates[0];
        assert!(rate <= budget, "{} > {}", rate, budget);
        let achieved: f64 = blocks
            .iter()
            .enumerate()
            .map(|(i, b)| b.distortion_at(allocation.passes(0, i)))
            .sum();

        // Best reduction over every combination of truncation points.
        let mut best = 0.0f64;
        for n0 in 0..=blocks[0].passes.len() {
            for n1 in 0..=blocks[1].passes.len() {
                for n2 in 0..=blocks[2].passes.len() {
                    let n = [n0, n1, n2];
                    let r: usize = blocks.iter().zip(n).map(|(b, k)| b.rate_at(k)).sum();
                    if r <= budget {
                        let d: f64 = blocks.iter().zip(n).map(|(b, k)| b.distortion_at(k)).sum();
                        best = best.max(d);
                    }
                }
            }
        }
        assert!(achieved <= best + 1e-6);
        // Any allocation within the budget gains at most threshold x unused bytes more.
        let lambda = allocation.thresholds[0];
        if !lambda.is_finite() {
            assert_eq!(rate, 0);
            continue;
        }
        let bound = achieved + lambda * (budget - rate) as f64;
        assert!(best <= bound * (1.0 + 1e-9) + 1e-6, "budget {}: best {} bound {}", budget, best, bound);
    }
}

#[test]
fn test_layers_nest() {
    let style = CodeBlockStyle::from_bits(CodeBlockStyle::BYPASS).unwrap();
    let blocks: Vec<EncodedCodeBlock> = (0..5)
        .map(|s| encoded_block(16, 8, 1000 >> s, s + 20, style))
        .collect();
    let total: usize = blocks.iter().map(|b| b.data.len()).sum();
    let control = RateControl::with_layers(vec![
        LayerTarget::Bytes(total / 10),
        LayerTarget::Bytes(total / 3),
        LayerTarget::Bytes(total / 3),
        LayerTarget::Bytes(2 * total / 3),
        LayerTarget::Lossless,
    ]);
    let allocation = RateAllocator::new(control).unwrap().allocate(&blocks).unwrap();
    assert_eq!(allocation.num_layers(), 5);

    for layer in 1..allocation.num_layers() {
        assert!(allocation.layer_rates[layer] >= allocation.layer_rates[layer - 1]);
        for block in 0..blocks.len() {
            assert!(allocation.passes(layer, block) >= allocation.passes(layer - 1, block));
        }
    }
    for (layer, budget) in [total / 10, total / 3, total / 3, 2 * total / 3].into_iter().enumerate() {
        assert!(allocation.layer_rates[layer] <= budget);
    }
    assert_eq!(allocation.layer_rates[4], total);

    // Per-layer contributions tile each codeword exactly.
    for (i, block) in blocks.iter().enumerate() {
        let contributions = layer_contributions(&allocation, i, block);
        let mut next_pass = 0;
        let mut next_byte = 0;
        for c in &contributions {
            assert_eq!(c.first_pass, next_pass);
            assert_eq!(c.bytes.start, next_byte);
            next_pass += c.passes;
            next_byte = c.bytes.end;
        }
        assert_eq!(next_pass, block.passes.len());
        assert_eq!(next_byte, block.data.len());
    }
}

#[test]
fn test_distortion_targets_lower_the_threshold() {
    let style = CodeBlockStyle::default();
    let blocks: Vec<EncodedCodeBlock> = (0..4)
        .map(|s| encoded_block(8, 8, 500, s + 40, style))
        .collect();
    let full: f64 = blocks.iter().map(|b| b.distortion_at(b.passes.len())).sum();
    let control = RateControl::with_layers(vec![
        LayerTarget::Distortion(full * 0.5),
        LayerTarget::Distortion(full * 0.9),
        LayerTarget::Distortion(full * 0.99),
    ]);
    let allocation = RateAllocator::new(control).unwrap().allocate(&blocks).unwrap();
    for layer in 1..3 {
        assert!(allocation.thresholds[layer] <= allocation.thresholds[layer - 1]);
    }
    for (layer, fraction) in [0.5, 0.9, 0.99].into_iter().enumerate() {
        let reached: f64 = blocks
            .iter()
            .enumerate()
            .map(|(i, b)| b.distortion_at(allocation.passes(layer, i)))
            .sum();
        assert!(reached >= full * fraction * (1.0 - 1e-9), "layer {}", layer);
    }
}

#[test]
fn test_bisection_needs_at_least_one_round() {
    let control = RateControl {
        layers: vec![LayerTarget::Bytes(100), LayerTarget::Lossless],
        iterations: 0,
        tolerance: 0,
    };
    assert_eq!(control.validate(), Err(EbcotError::InvalidArgumentLayerTargets));
    assert_eq!(RateAllocator::new(control).err(), Some(EbcotError::InvalidArgumentLayerTargets));

    let one_round = RateControl {
        layers: vec![LayerTarget::Bytes(100), LayerTarget::Lossless],
        iterations: 1,
        tolerance: 0,
    };
    assert!(RateAllocator::new(one_round).is_ok());
}
