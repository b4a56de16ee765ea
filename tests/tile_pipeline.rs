//! Tile encode, packetization, parsing and decode

use ebcot_rs::jpeg2000::packet::{BlockContribution, PrecinctState};
use ebcot_rs::{
    BandLayout, CodeBlock, CodeBlockGeometry, CodeBlockStyle, DecodeStatus, EbcotError, LayerTarget,
    PrecinctLayout, RateControl, ResolutionLayout, SampleData, SubbandOrientation, TileCodingParameters,
    TileDecoder, TileEncoder, TileLayout, decode_code_block, encode_code_block,
};

fn lcg(seed: &mut u32) -> u32 {
    *seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
    *seed >> 16
}

fn random_block(orientation: SubbandOrientation, range: i32, seed: u32) -> CodeBlock {
    let mut s = seed;
    let samples = (0..16 * 16)
        .map(|_| (lcg(&mut s) as i32 % (2 * range + 1)) - range)
        .collect();
    CodeBlock::reversible(CodeBlockGeometry::with_size(16, 16), orientation, samples, 12).unwrap()
}

fn samples(block: &CodeBlock) -> &[i32] {
    match &block.samples {
        SampleData::Reversible(v) => v,
        SampleData::Irreversible { .. } => unreachable!(),
    }
}

/// Resolution 0: one LL block. Resolution 1: two precincts, each with a
/// 2x1 grid per detail band. Blocks are numbered in packet order.
fn two_resolutions() -> (TileLayout, Vec<CodeBlock>) {
    let details = [SubbandOrientation::HL, SubbandOrientation::LH, SubbandOrientation::HH];
    let mut blocks = vec![random_block(SubbandOrientation::LL, 2000, 1)];
    let mut precincts = Vec::new();
    for p in 0..2 {
        let mut bands = Vec::new();
        for (b, &orientation) in details.iter().enumerate() {
            let first = blocks.len();
            for k in 0..2 {
                let seed = (p * 100 + b * 10 + k + 2) as u32;
                blocks.push(random_block(orientation, 300 >> b, seed));
            }
            bands.push(BandLayout::new(orientation, 2, 1, 12, first));
        }
        precincts.push(PrecinctLayout { bands });
    }
    let layout = TileLayout {
        resolutions: vec![
            ResolutionLayout {
                precincts: vec![PrecinctLayout {
                    bands: vec![BandLayout::new(SubbandOrientation::LL, 1, 1, 12, 0)],
                }],
            },
            ResolutionLayout { precincts },
        ],
    };
    (layout, blocks)
}

fn geometries(blocks: &[CodeBlock]) -> Vec<CodeBlockGeometry> {
    blocks.iter().map(|b| b.geometry).collect()
}

#[test]
fn test_layered_tile_roundtrip() {
    let (layout, blocks) = two_resolutions();
    for bits in [0x00u8, 0x05, 0x3F] {
        let style = CodeBlockStyle::from_bits(bits).unwrap();
        let parameters = TileCodingParameters {
            style,
            rate_control: RateControl::with_layers(vec![
                LayerTarget::Bytes(300),
                LayerTarget::Bytes(900),
                LayerTarget::Lossless,
            ]),
        };
        let tile = TileEncoder::new(parameters).unwrap().encode(&layout, &blocks).unwrap();
        // Three packets (one per precinct) in each of three layers.
        assert_eq!(tile.packets.len(), 9);
        assert!(tile.allocation.layer_rates[0] <= 300);
        assert!(tile.allocation.layer_rates[1] <= 900);

        let decoder = TileDecoder::new(style, layout.clone(), geometries(&blocks)).unwrap();
        let decoded = decoder.decode(&tile.to_bytes()).unwrap();
        assert_eq!(decoded.layers_decoded, 3);
        assert!(decoded.is_complete(), "style {:#04x}", bits);
        for (block, result) in blocks.iter().zip(&decoded.blocks) {
            assert_eq!(result.as_ref().unwrap().coefficients, samples(block), "style {:#04x}", bits);
        }

        // Every layer prefix decodes to the allocated truncation points.
        for layers in 1..=2 {
            let partial = decoder.decode_layers(&tile.layer_bytes(layers), usize::MAX).unwrap();
            assert_eq!(partial.layers_decoded, layers);
            assert!(partial.fault.is_none());
            for (i, result) in partial.blocks.iter().enumerate() {
                let passes = tile.allocation.passes(layers - 1, i);
                let got = result.as_ref().unwrap();
                assert_eq!(got.passes_decoded, passes, "style {:#04x}, layer {}, block {}", bits, layers, i);
                let expected = decode_code_block(&tile.blocks[i], style, passes).unwrap();
                assert_eq!(got.coefficients, expected.coefficients);
            }
        }
    }
}

#[test]
fn test_empty_first_layer() {
    let blocks = vec![
        random_block(SubbandOrientation::HL, 500, 3),
        random_block(SubbandOrientation::HL, 500, 4),
    ];
    let layout =
        TileLayout::single_precinct(vec![BandLayout::new(SubbandOrientation::HL, 2, 1, 12, 0)]);
    let parameters = TileCodingParameters {
        rate_control: RateControl::with_layers(vec![LayerTarget::Bytes(0), LayerTarget::Lossless]),
        ..Default::default()
    };
    let tile = TileEncoder::new(parameters).unwrap().encode(&layout, &blocks).unwrap();
    assert_eq!(tile.allocation.layer_rates[0], 0);
    assert_eq!(tile.packets[0].data, vec![0x00]);

    let decoder =
        TileDecoder::new(CodeBlockStyle::default(), layout, geometries(&blocks)).unwrap();
    let first = decoder.decode_layers(&tile.to_bytes(), 1).unwrap();
    for result in &first.blocks {
        let block = result.as_ref().unwrap();
        assert_eq!(block.passes_decoded, 0);
        assert!(block.coefficients.iter().all(|&c| c == 0));
    }
    let all = decoder.decode(&tile.to_bytes()).unwrap();
    assert!(all.is_complete());
    for (block, result) in blocks.iter().zip(&all.blocks) {
        assert_eq!(result.as_ref().unwrap().coefficients, samples(block));
    }
}

#[test]
fn test_corrupt_block_leaves_siblings_intact() {
    let orientation = SubbandOrientation::LH;
    let blocks: Vec<CodeBlock> = (0..3).map(|s| random_block(orientation, 800, 10 + s)).collect();
    let style = CodeBlockStyle::default();
    let encoded: Vec<_> = blocks
        .iter()
        .map(|b| encode_code_block(b, style).unwrap())
        .collect();

    let precinct = PrecinctLayout {
        bands: vec![BandLayout::new(orientation, 3, 1, 12, 0)],
    };
    let mut state = PrecinctState::new(&precinct, style).unwrap();
    for (k, e) in encoded.iter().enumerate() {
        // Block 1 claims a single bit-plane but carries all of its passes.
        let planes = if k == 1 { 1 } else { e.num_bit_planes };
        state.set_num_bit_planes(0, k, planes).unwrap();
    }
    let contributions = vec![encoded
        .iter()
        .map(|e| BlockContribution {
            passes: &e.passes,
            data: &e.data,
        })
        .collect::<Vec<_>>()];
    let packet = state.encode_packet(0, &contributions).unwrap();

    let layout = TileLayout::single_precinct(precinct.bands.clone());
    let decoder = TileDecoder::new(style, layout, geometries(&blocks)).unwrap();
    let decoded = decoder.decode(&packet).unwrap();
    assert!(decoded.fault.is_none());
    assert!(!decoded.is_complete());

    let corrupt = decoded.blocks[1].as_ref().unwrap();
    assert_eq!(
        corrupt.status,
        DecodeStatus::Incomplete {
            error: EbcotError::TooManyCodingPasses
        }
    );
    assert_eq!(corrupt.passes_decoded, 0);
    for k in [0, 2] {
        let block = decoded.blocks[k].as_ref().unwrap();
        assert!(block.is_complete());
        assert_eq!(block.coefficients, samples(&blocks[k]));
    }
}

#[test]
fn test_truncated_stream_never_fails_the_tile() {
    let (layout, blocks) = two_resolutions();
    let style = CodeBlockStyle::from_bits(CodeBlockStyle::TERMINATE_ALL).unwrap();
    let parameters = TileCodingParameters {
        style,
        rate_control: RateControl::with_layers(vec![LayerTarget::Bytes(500), LayerTarget::Lossless]),
    };
    let tile = TileEncoder::new(parameters).unwrap().encode(&layout, &blocks).unwrap();
    let bytes = tile.to_bytes();
    let decoder = TileDecoder::new(style, layout, geometries(&blocks)).unwrap();

    for cut in (0..bytes.len()).step_by(7) {
        let decoded = decoder.decode(&bytes[..cut]).unwrap();
        if let Some(fault) = decoded.fault {
            assert!(fault.is_corrupt_input(), "cut {}: {}", cut, fault);
        }
        for (i, result) in decoded.blocks.iter().enumerate() {
            let block = result.as_ref().unwrap();
            assert!(block.passes_decoded <= tile.blocks[i].passes.len());
            if let DecodeStatus::Incomplete { error } = block.status {
                assert!(error.is_corrupt_input());
            }
            // Whole segments only: what was decoded is a valid truncation.
            let expected = decode_code_block(&tile.blocks[i], style, block.passes_decoded).unwrap();
            assert_eq!(block.coefficients, expected.coefficients, "cut {}, block {}", cut, i);
        }
    }
}
