//! JPEG 2000 tile decoder
//!
//! Packets are parsed in codestream order, collecting the codeword segments
//! of every code-block. Tier-1 decoding then runs per block; a block that
//! turns out to be corrupt is reported in its own status and never stops its
//! siblings.

use log::{debug, info, warn};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

use super::bit_plane_coder::BlockDecoder;
use super::image::{CodeBlockGeometry, DecodedBlock, SubbandOrientation};
use super::packet::{PacketSegment, PrecinctState, TileLayout};
use crate::coding_parameters::CodeBlockStyle;
use crate::constants::MAXIMUM_BIT_PLANES;
use crate::error::EbcotError;

/// Everything the packets delivered for one code-block.
#[derive(Debug, Clone, Default)]
struct BlockInput<'a> {
    orientation: SubbandOrientation,
    num_bit_planes: Option<u8>,
    segments: Vec<PacketSegment<'a>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTile {
    /// One entry per code-block; `Err` only when the block could not be set
    /// up at all.
    pub blocks: Vec<Result<DecodedBlock, EbcotError>>,
    pub layers_decoded: usize,
    /// Packet parsing stopped here. Blocks still hold everything that
    /// arrived before the fault.
    pub fault: Option<EbcotError>,
}

impl DecodedTile {
    pub fn is_complete(&self) -> bool {
        self.fault.is_none()
            && self
                .blocks
                .iter()
                .all(|b| b.as_ref().is_ok_and(|b| b.is_complete()))
    }
}

/// JPEG 2000 tile decoder
pub struct TileDecoder {
    style: CodeBlockStyle,
    layout: TileLayout,
    geometries: Vec<CodeBlockGeometry>,
}

impl TileDecoder {
    /// `geometries[i]` is the rectangle of the block with index `i` in
    /// `layout`.
    pub fn new(
        style: CodeBlockStyle,
        layout: TileLayout,
        geometries: Vec<CodeBlockGeometry>,
    ) -> Result<Self, EbcotError> {
        layout.validate(geometries.len())?;
        for geometry in &geometries {
            geometry.validate()?;
        }
        if layout.bands().any(|b| b.max_bit_planes > MAXIMUM_BIT_PLANES) {
            return Err(EbcotError::InvalidArgumentBitPlanes);
        }
        Ok(Self {
            style,
            layout,
            geometries,
        })
    }

    pub fn layout(&self) -> &TileLayout {
        &self.layout
    }

    /// Decodes every layer present in `data`.
    pub fn decode(&self, data: &[u8]) -> Result<DecodedTile, EbcotError> {
        self.decode_layers(data, u16::MAX as usize + 1)
    }

    /// Decodes at most the first `layers` layers of `data`.
    pub fn decode_layers(&self, data: &[u8], layers: usize) -> Result<DecodedTile, EbcotError> {
        let mut inputs: Vec<BlockInput> = Vec::new();
        inputs.try_reserve_exact(self.geometries.len())?;
        inputs.resize(self.geometries.len(), BlockInput::default());
        for band in self.layout.bands() {
            for &index in &band.blocks {
                inputs[index].orientation = band.orientation;
            }
        }

        let mut states = Vec::new();
        for precinct in self.layout.precincts() {
            states.push(PrecinctState::new(precinct, self.style)?);
        }

        let mut offset = 0;
        let mut fault = None;
        let mut layers_decoded = 0;
        'layers: for layer in 0..layers.min(u16::MAX as usize + 1) {
            if offset >= data.len() {
                break;
            }
            for (state, precinct) in states.iter_mut().zip(self.layout.precincts()) {
                let packet = match state.decode_packet(layer as u16, &data[offset..]) {
                    Ok(packet) => packet,
                    Err(e) => {
                        warn!("layer {}: packet header at byte {}: {}", layer, offset, e);
                        fault = Some(e);
                        break 'layers;
                    }
                };
                offset += packet.length;
                for block in packet.blocks {
                    let index = precinct.bands[block.band].blocks[block.block];
                    let input = &mut inputs[index];
                    input.num_bit_planes.get_or_insert(block.num_bit_planes);
                    input.segments.extend(block.segments);
                }
                if let Some(e) = packet.fault {
                    fault = Some(e);
                    break 'layers;
                }
            }
            layers_decoded += 1;
        }
        debug!(
            "parsed {} layers, {} of {} bytes",
            layers_decoded,
            offset,
            data.len()
        );

        let style = self.style;
        let decode = |(index, input): (usize, &BlockInput)| {
            decode_block(index, self.geometries[index], style, input)
        };
        #[cfg(feature = "rayon")]
        let blocks: Vec<Result<DecodedBlock, EbcotError>> =
            inputs.par_iter().enumerate().map(decode).collect();
        #[cfg(not(feature = "rayon"))]
        let blocks: Vec<Result<DecodedBlock, EbcotError>> =
            inputs.iter().enumerate().map(decode).collect();

        let incomplete = blocks
            .iter()
            .filter(|b| !b.as_ref().is_ok_and(|b| b.is_complete()))
            .count();
        info!(
            "tile: {} code-blocks, {} layers, {} incomplete",
            blocks.len(),
            layers_decoded,
            incomplete
        );
        Ok(DecodedTile {
            blocks,
            layers_decoded,
            fault,
        })
    }
}

fn decode_block(
    index: usize,
    geometry: CodeBlockGeometry,
    style: CodeBlockStyle,
    input: &BlockInput,
) -> Result<DecodedBlock, EbcotError> {
    let mut decoder = BlockDecoder::new(
        geometry,
        input.orientation,
        style,
        input.num_bit_planes.unwrap_or(0),
    )?;
    for segment in &input.segments {
        // Corrupt contributions leave the block incomplete; siblings go on.
        if let Err(e) = decoder.add_contribution(segment.data, segment.passes) {
            if !e.is_corrupt_input() {
                return Err(e);
            }
            warn!("code-block {}: {}", index, e);
            break;
        }
    }
    decoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coding_parameters::{LayerTarget, RateControl, TileCodingParameters};
    use crate::jpeg2000::bit_plane_coder::decode_code_block;
    use crate::jpeg2000::encoder::TileEncoder;
    use crate::jpeg2000::image::{CodeBlock, SampleData};
    use crate::jpeg2000::packet::BandLayout;

    fn blocks() -> Vec<CodeBlock> {
        let orientations = [SubbandOrientation::HL, SubbandOrientation::HL, SubbandOrientation::LH];
        orientations
            .iter()
            .enumerate()
            .map(|(n, &o)| {
                let samples = (0..32 * 8)
                    .map(|i| ((i * 29 + n as i32 * 13) % 101) - 50)
                    .collect();
                CodeBlock::reversible(CodeBlockGeometry::new(0, 0, 32, 8), o, samples, 14).unwrap()
            })
            .collect()
    }

    fn layout() -> TileLayout {
        TileLayout::single_precinct(vec![
            BandLayout::new(SubbandOrientation::HL, 2, 1, 14, 0),
            BandLayout::new(SubbandOrientation::LH, 1, 1, 14, 2),
        ])
    }

    fn geometries(blocks: &[CodeBlock]) -> Vec<CodeBlockGeometry> {
        blocks.iter().map(|b| b.geometry).collect()
    }

    #[test]
    fn test_tile_roundtrip() {
        let blocks = blocks();
        let parameters = TileCodingParameters {
            rate_control: RateControl::with_layers(vec![
                LayerTarget::Bytes(60),
                LayerTarget::Bytes(200),
                LayerTarget::Lossless,
            ]),
            ..Default::default()
        };
        let tile = TileEncoder::new(parameters).unwrap().encode(&layout(), &blocks).unwrap();

        let decoder =
            TileDecoder::new(CodeBlockStyle::default(), layout(), geometries(&blocks)).unwrap();
        let decoded = decoder.decode(&tile.to_bytes()).unwrap();
        assert_eq!(decoded.layers_decoded, 3);
        assert!(decoded.is_complete());
        for (block, result) in blocks.iter().zip(&decoded.blocks) {
            let SampleData::Reversible(samples) = &block.samples else {
                unreachable!()
            };
            assert_eq!(&result.as_ref().unwrap().coefficients, samples);
        }
    }

    #[test]
    fn test_partial_layers_match_truncated_blocks() {
        let blocks = blocks();
        let parameters = TileCodingParameters {
            rate_control: RateControl::with_layers(vec![
                LayerTarget::Bytes(50),
                LayerTarget::Bytes(150),
                LayerTarget::Lossless,
            ]),
            ..Default::default()
        };
        let tile = TileEncoder::new(parameters).unwrap().encode(&layout(), &blocks).unwrap();
        let decoder =
            TileDecoder::new(CodeBlockStyle::default(), layout(), geometries(&blocks)).unwrap();

        for layers in 1..=2 {
            let decoded = decoder.decode_layers(&tile.to_bytes(), layers).unwrap();
            assert_eq!(decoded.layers_decoded, layers);
            for (i, result) in decoded.blocks.iter().enumerate() {
                let passes = tile.allocation.passes(layers - 1, i);
                let expected =
                    decode_code_block(&tile.blocks[i], CodeBlockStyle::default(), passes).unwrap();
                let got = result.as_ref().unwrap();
                assert_eq!(got.passes_decoded, passes);
                assert_eq!(got.coefficients, expected.coefficients);
            }
        }
    }

    #[test]
    fn test_truncated_stream_keeps_earlier_layers() {
        let blocks = blocks();
        let parameters = TileCodingParameters {
            rate_control: RateControl::with_layers(vec![LayerTarget::Bytes(80), LayerTarget::Lossless]),
            ..Default::default()
        };
        let tile = TileEncoder::new(parameters).unwrap().encode(&layout(), &blocks).unwrap();
        let first = tile.packets[0].data.len();
        let mut bytes = tile.to_bytes();
        bytes.truncate(first + 2);

        let decoder =
            TileDecoder::new(CodeBlockStyle::default(), layout(), geometries(&blocks)).unwrap();
        let decoded = decoder.decode(&bytes).unwrap();
        assert_eq!(decoded.layers_decoded, 1);
        assert!(decoded.fault.is_some_and(|e| e.is_corrupt_input()));
        for (i, result) in decoded.blocks.iter().enumerate() {
            assert!(result.as_ref().unwrap().passes_decoded >= tile.allocation.passes(0, i));
        }
    }

    #[test]
    fn test_layout_checks() {
        let blocks = blocks();
        assert_eq!(
            TileDecoder::new(CodeBlockStyle::default(), layout(), geometries(&blocks[..2])).err(),
            Some(EbcotError::InvalidArgumentLayout)
        );
    }
}
