//! JPEG 2000 tile encoder
//!
//! Tier-1 codes every code-block of a tile (in parallel with the `rayon`
//! feature), waits for all of them, forms the quality layers and writes the
//! packets in layer, resolution, precinct order.

use log::{debug, info, warn};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

use super::bit_plane_coder::encode_code_block;
use super::image::{CodeBlock, EncodedCodeBlock};
use super::packet::{BlockContribution, PrecinctState, TileLayout};
use super::rate_allocator::{LayerAllocation, LayerContribution, RateAllocator, layer_contributions};
use crate::coding_parameters::TileCodingParameters;
use crate::error::EbcotError;

/// One packet of the tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPacket {
    pub layer: u16,
    pub resolution: usize,
    pub precinct: usize,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncodedTile {
    pub blocks: Vec<EncodedCodeBlock>,
    pub allocation: LayerAllocation,
    /// Packets in codestream order.
    pub packets: Vec<EncodedPacket>,
}

impl EncodedTile {
    pub fn len(&self) -> usize {
        self.packets.iter().map(|p| p.data.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Packet bytes of the first `layers` layers, back to back.
    pub fn layer_bytes(&self, layers: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        for packet in self.packets.iter().filter(|p| (p.layer as usize) < layers) {
            out.extend_from_slice(&packet.data);
        }
        out
    }

    /// Every packet back to back.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.layer_bytes(self.allocation.num_layers())
    }
}

/// JPEG 2000 tile encoder
pub struct TileEncoder {
    parameters: TileCodingParameters,
    allocator: RateAllocator,
}

impl TileEncoder {
    pub fn new(parameters: TileCodingParameters) -> Result<Self, EbcotError> {
        let allocator = RateAllocator::new(parameters.rate_control.clone())?;
        Ok(Self {
            parameters,
            allocator,
        })
    }

    pub fn parameters(&self) -> &TileCodingParameters {
        &self.parameters
    }

    /// Tier-1 codes every block. Blocks are independent; the call returns
    /// once all of them are done, and the first failure fails the tile.
    pub fn encode_blocks(&self, blocks: &[CodeBlock]) -> Result<Vec<EncodedCodeBlock>, EbcotError> {
        let style = self.parameters.style;
        let encode = |(index, block): (usize, &CodeBlock)| {
            encode_code_block(block, style).inspect_err(|e| {
                warn!("code-block {} failed to encode: {}", index, e);
            })
        };

        #[cfg(feature = "rayon")]
        let encoded = blocks.par_iter().enumerate().map(encode).collect();
        #[cfg(not(feature = "rayon"))]
        let encoded = blocks.iter().enumerate().map(encode).collect();

        encoded
    }

    /// Encodes a tile whose blocks are arranged by `layout`.
    pub fn encode(&self, layout: &TileLayout, blocks: &[CodeBlock]) -> Result<EncodedTile, EbcotError> {
        layout.validate(blocks.len())?;
        for band in layout.bands() {
            if band
                .blocks
                .iter()
                .any(|&i| blocks[i].orientation != band.orientation)
            {
                return Err(EbcotError::InvalidArgumentLayout);
            }
        }

        let encoded = self.encode_blocks(blocks)?;
        let allocation = self.allocator.allocate(&encoded)?;
        let contributions: Vec<Vec<LayerContribution>> = encoded
            .iter()
            .enumerate()
            .map(|(i, block)| layer_contributions(&allocation, i, block))
            .collect();

        let style = self.parameters.style;
        let mut states = Vec::new();
        for precinct in layout.precincts() {
            let mut state = PrecinctState::new(precinct, style)?;
            for (b, band) in precinct.bands.iter().enumerate() {
                for (k, &index) in band.blocks.iter().enumerate() {
                    state.set_num_bit_planes(b, k, encoded[index].num_bit_planes)?;
                }
            }
            states.push(state);
        }

        let mut packets = Vec::new();
        for layer in 0..allocation.num_layers() {
            let mut state_index = 0;
            let mut layer_bytes = 0;
            for (r, resolution) in layout.resolutions.iter().enumerate() {
                for (p, precinct) in resolution.precincts.iter().enumerate() {
                    let packet_contributions: Vec<Vec<BlockContribution>> = precinct
                        .bands
                        .iter()
                        .map(|band| {
                            band.blocks
                                .iter()
                                .map(|&i| {
                                    let c = &contributions[i][layer];
                                    BlockContribution {
                                        passes: &encoded[i].passes[c.first_pass..c.first_pass + c.passes],
                                        data: c.data(&encoded[i]),
                                    }
                                })
                                .collect()
                        })
                        .collect();
                    let data = states[state_index].encode_packet(layer as u16, &packet_contributions)?;
                    state_index += 1;
                    layer_bytes += data.len();
                    debug!(
                        "packet layer {} resolution {} precinct {}: {} bytes",
                        layer,
                        r,
                        p,
                        data.len()
                    );
                    packets.push(EncodedPacket {
                        layer: layer as u16,
                        resolution: r,
                        precinct: p,
                        data,
                    });
                }
            }
            info!(
                "layer {}: {} packet bytes, {} code-block bytes cumulative",
                layer, layer_bytes, allocation.layer_rates[layer]
            );
        }

        info!(
            "tile: {} code-blocks, {} layers, {} bytes",
            blocks.len(),
            allocation.num_layers(),
            packets.iter().map(|p| p.data.len()).sum::<usize>()
        );
        Ok(EncodedTile {
            blocks: encoded,
            allocation,
            packets,
        })
    }
}
