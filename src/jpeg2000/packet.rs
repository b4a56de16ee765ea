//! Packet headers and packet bodies (ITU-T T.800, B.10).
//!
//! A packet carries one quality layer of one precinct: for every code-block
//! of every subband, in raster order, whether it contributes, how many new
//! passes it adds and the length of each codeword segment touched. The
//! code-block bytes follow the header in the same order.

use log::{trace, warn};

use crate::coding_parameters::CodeBlockStyle;
use crate::constants::INITIAL_LBLOCK;
use crate::error::EbcotError;
use crate::jpeg2000::bit_io::{J2kBitReader, J2kBitWriter};
use crate::jpeg2000::image::SubbandOrientation;
use crate::jpeg2000::segment::{PassRecord, SegmentLimits};
use crate::jpeg2000::tag_tree::TagTree;

// Segment lengths are read into 32 bits.
const MAXIMUM_LENGTH_BITS: u32 = 32;

fn floor_log2(v: usize) -> u32 {
    if v <= 1 { 0 } else { v.ilog2() }
}

/// Code-block grid of one subband inside a precinct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandLayout {
    pub orientation: SubbandOrientation,
    pub grid_width: usize,
    pub grid_height: usize,
    /// Bit-planes implied by the quantizer; zero bit-planes count down from here.
    pub max_bit_planes: u8,
    /// Tile-wide code-block indices in raster order.
    pub blocks: Vec<usize>,
}

impl BandLayout {
    /// A `grid_width` x `grid_height` band whose blocks are numbered
    /// consecutively from `first_block`.
    pub fn new(
        orientation: SubbandOrientation,
        grid_width: usize,
        grid_height: usize,
        max_bit_planes: u8,
        first_block: usize,
    ) -> Self {
        Self {
            orientation,
            grid_width,
            grid_height,
            max_bit_planes,
            blocks: (first_block..first_block + grid_width * grid_height).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PrecinctLayout {
    pub bands: Vec<BandLayout>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolutionLayout {
    pub precincts: Vec<PrecinctLayout>,
}

/// Arrangement of a tile's code-blocks into resolutions, precincts and
/// subbands, which fixes the packet order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TileLayout {
    pub resolutions: Vec<ResolutionLayout>,
}

impl TileLayout {
    /// One resolution holding one precinct.
    pub fn single_precinct(bands: Vec<BandLayout>) -> Self {
        Self {
            resolutions: vec![ResolutionLayout {
                precincts: vec![PrecinctLayout { bands }],
            }],
        }
    }

    /// Precincts in packet order within a layer (resolution, then precinct).
    pub fn precincts(&self) -> impl Iterator<Item = &PrecinctLayout> {
        self.resolutions.iter().flat_map(|r| r.precincts.iter())
    }

    pub fn bands(&self) -> impl Iterator<Item = &BandLayout> {
        self.precincts().flat_map(|p| p.bands.iter())
    }

    pub fn num_blocks(&self) -> usize {
        self.bands().map(|b| b.blocks.len()).sum()
    }

    /// Every block in `0..num_blocks` must appear exactly once and every
    /// grid must match its block list.
    pub fn validate(&self, num_blocks: usize) -> Result<(), EbcotError> {
        let mut seen = vec![false; num_blocks];
        for band in self.bands() {
            if band.grid_width * band.grid_height != band.blocks.len() {
                return Err(EbcotError::InvalidArgumentLayout);
            }
            for &index in &band.blocks {
                match seen.get_mut(index) {
                    Some(slot) if !*slot => *slot = true,
                    _ => return Err(EbcotError::InvalidArgumentLayout),
                }
            }
        }
        if seen.iter().all(|&s| s) {
            Ok(())
        } else {
            Err(EbcotError::InvalidArgumentLayout)
        }
    }
}

/// Header state of one code-block that persists across layers.
#[derive(Debug, Clone, Copy)]
struct BlockState {
    included: bool,
    lblock: u32,
    num_bit_planes: u8,
    limits: SegmentLimits,
    segment_limit: usize,
    segment_passes: usize,
}

impl BlockState {
    fn new(style: CodeBlockStyle) -> Self {
        Self {
            included: false,
            lblock: INITIAL_LBLOCK,
            num_bit_planes: 0,
            limits: SegmentLimits::new(style),
            segment_limit: 0,
            segment_passes: 0,
        }
    }

    fn open_segment(&mut self) {
        self.segment_limit = self.limits.next().unwrap_or(usize::MAX);
        self.segment_passes = 0;
    }
}

struct BandState {
    grid_width: usize,
    max_bit_planes: u8,
    inclusion_tree: TagTree,
    zero_bp_tree: TagTree,
    blocks: Vec<BlockState>,
}

/// Represents the state of a Precinct while its packets are written or
/// parsed, one layer after the other.
pub struct PrecinctState {
    bands: Vec<BandState>,
}

impl PrecinctState {
    pub fn new(layout: &PrecinctLayout, style: CodeBlockStyle) -> Result<Self, EbcotError> {
        let mut bands = Vec::new();
        bands.try_reserve_exact(layout.bands.len())?;
        for band in &layout.bands {
            let mut blocks = Vec::new();
            blocks.try_reserve_exact(band.blocks.len())?;
            blocks.resize(band.blocks.len(), BlockState::new(style));
            bands.push(BandState {
                grid_width: band.grid_width,
                max_bit_planes: band.max_bit_planes,
                inclusion_tree: TagTree::new(band.grid_width, band.grid_height)?,
                zero_bp_tree: TagTree::new(band.grid_width, band.grid_height)?,
                blocks,
            });
        }
        Ok(Self { bands })
    }

    /// Records the coded bit-planes of a block before the first packet is
    /// written. Every block must be set up, included later or not.
    pub fn set_num_bit_planes(
        &mut self,
        band: usize,
        block: usize,
        num_bit_planes: u8,
    ) -> Result<(), EbcotError> {
        let state = self
            .bands
            .get_mut(band)
            .ok_or(EbcotError::InvalidArgumentLayout)?;
        if block >= state.blocks.len() || num_bit_planes > state.max_bit_planes {
            return Err(EbcotError::InvalidArgumentLayout);
        }
        state.blocks[block].num_bit_planes = num_bit_planes;
        let zero_bit_planes = state.max_bit_planes - num_bit_planes;
        let (x, y) = (block % state.grid_width, block / state.grid_width);
        state.zero_bp_tree.set_value(x, y, zero_bit_planes as u32);
        Ok(())
    }

    /// Writes the packet of `layer`. `contributions[band][block]` lists the
    /// new passes of every block in raster order.
    pub fn encode_packet(
        &mut self,
        layer: u16,
        contributions: &[Vec<BlockContribution<'_>>],
    ) -> Result<Vec<u8>, EbcotError> {
        if contributions.len() != self.bands.len()
            || contributions
                .iter()
                .zip(&self.bands)
                .any(|(c, b)| c.len() != b.blocks.len())
        {
            return Err(EbcotError::InvalidArgumentLayout);
        }

        let mut header = PacketHeader {
            empty: true,
            layer_index: layer,
            included_cblks: Vec::new(),
        };
        let mut body_len = 0;
        for (band, blocks) in contributions.iter().enumerate() {
            let grid_width = self.bands[band].grid_width;
            for (index, contribution) in blocks.iter().enumerate() {
                if contribution.passes.is_empty() {
                    continue;
                }
                header.empty = false;
                body_len += contribution.data.len();
                header.included_cblks.push(CodeBlockInfo {
                    band,
                    x: index % grid_width,
                    y: index / grid_width,
                    num_passes: contribution.passes.len(),
                    num_bit_planes: self.bands[band].blocks[index].num_bit_planes,
                    segments: contribution.segments()?,
                });
            }
        }

        let mut writer = J2kBitWriter::new();
        header.write(&mut writer, self)?;
        let mut packet = writer.finish();
        trace!(
            "layer {}: packet header {} bytes, body {} bytes",
            layer,
            packet.len(),
            body_len
        );
        packet.try_reserve_exact(body_len)?;
        for blocks in contributions {
            for contribution in blocks {
                packet.extend_from_slice(contribution.data);
            }
        }
        Ok(packet)
    }

    /// Parses the packet of `layer` at the start of `data`.
    ///
    /// A body shorter than its header announces yields the blocks that
    /// arrived whole together with the fault. A broken header is an error,
    /// the precinct cannot be parsed past it.
    pub fn decode_packet<'a>(&mut self, layer: u16, data: &'a [u8]) -> Result<Packet<'a>, EbcotError> {
        let mut reader = J2kBitReader::new(data);
        let header = PacketHeader::read(&mut reader, self, layer)?;
        reader.align()?;

        let mut offset = reader.position();
        let mut packet = Packet {
            blocks: Vec::new(),
            length: offset,
            fault: None,
        };
        packet.blocks.try_reserve_exact(header.included_cblks.len())?;
        'blocks: for info in header.included_cblks {
            let mut segments = Vec::with_capacity(info.segments.len());
            for segment in &info.segments {
                let end = offset + segment.length;
                let Some(bytes) = data.get(offset..end) else {
                    warn!(
                        "layer {}: packet body ends at {} bytes, {} needed",
                        layer,
                        data.len(),
                        end
                    );
                    packet.fault = Some(EbcotError::TruncatedPacketBody);
                    break 'blocks;
                };
                segments.push(PacketSegment {
                    passes: segment.passes,
                    data: bytes,
                });
                offset = end;
            }
            let band = &self.bands[info.band];
            packet.blocks.push(PacketBlock {
                band: info.band,
                block: info.y * band.grid_width + info.x,
                num_bit_planes: info.num_bit_planes,
                segments,
            });
            packet.length = offset;
        }
        Ok(packet)
    }
}

/// New passes of one code-block in one layer, as the encoder hands them over.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockContribution<'a> {
    pub passes: &'a [PassRecord],
    pub data: &'a [u8],
}

impl BlockContribution<'_> {
    // Cuts the passes at every terminated pass and at the end.
    fn segments(&self) -> Result<Vec<SegmentInfo>, EbcotError> {
        let mut segments = Vec::new();
        let (mut passes, mut length) = (0, 0);
        for (i, pass) in self.passes.iter().enumerate() {
            passes += 1;
            length += pass.length;
            if pass.terminated || i + 1 == self.passes.len() {
                segments.push(SegmentInfo { passes, length });
                passes = 0;
                length = 0;
            }
        }
        if segments.iter().map(|s| s.length).sum::<usize>() != self.data.len() {
            return Err(EbcotError::InvalidArgumentLayout);
        }
        Ok(segments)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentInfo {
    pub passes: usize,
    pub length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlockInfo {
    pub band: usize,
    pub x: usize,
    pub y: usize,
    pub num_passes: usize,
    /// Coded bit-planes, as signalled on first inclusion.
    pub num_bit_planes: u8,
    pub segments: Vec<SegmentInfo>,
}

pub struct PacketHeader {
    pub empty: bool,
    pub layer_index: u16,
    pub included_cblks: Vec<CodeBlockInfo>,
}

fn put_num_passes(writer: &mut J2kBitWriter, n: usize) -> Result<(), EbcotError> {
    let n = u32::try_from(n).map_err(|_| EbcotError::InvalidPassCount)?;
    match n {
        1 => writer.write_bit(0),
        2 => writer.write_bits(0b10, 2),
        3..=5 => writer.write_bits(0xC | (n - 3), 4),
        6..=36 => writer.write_bits(0x1E0 | (n - 6), 9),
        37..=164 => writer.write_bits(0xFF80 | (n - 37), 16),
        _ => return Err(EbcotError::InvalidPassCount),
    }
    Ok(())
}

fn get_num_passes(reader: &mut J2kBitReader) -> Result<usize, EbcotError> {
    if reader.read_bit()? == 0 {
        return Ok(1);
    }
    if reader.read_bit()? == 0 {
        return Ok(2);
    }
    let n = reader.read_bits(2)?;
    if n != 3 {
        return Ok(3 + n as usize);
    }
    let n = reader.read_bits(5)?;
    if n != 31 {
        return Ok(6 + n as usize);
    }
    Ok(37 + reader.read_bits(7)? as usize)
}

fn put_comma_code(writer: &mut J2kBitWriter, n: u32) {
    for _ in 0..n {
        writer.write_bit(1);
    }
    writer.write_bit(0);
}

fn get_comma_code(reader: &mut J2kBitReader) -> Result<u32, EbcotError> {
    let mut n = 0;
    while reader.read_bit()? == 1 {
        n += 1;
        if n > MAXIMUM_LENGTH_BITS {
            return Err(EbcotError::InvalidSegmentLength);
        }
    }
    Ok(n)
}

impl PacketHeader {
    /// Read a packet header from the bit stream.
    pub fn read(
        reader: &mut J2kBitReader,
        state: &mut PrecinctState,
        layer: u16,
    ) -> Result<Self, EbcotError> {
        let mut header = PacketHeader {
            empty: false,
            layer_index: layer,
            included_cblks: Vec::new(),
        };

        // Zero-length packet bit.
        if reader.read_bit()? == 0 {
            header.empty = true;
            return Ok(header);
        }

        let threshold = layer as u32 + 1;
        for (b, band) in state.bands.iter_mut().enumerate() {
            for (index, block) in band.blocks.iter_mut().enumerate() {
                let (x, y) = (index % band.grid_width, index / band.grid_width);
                let included = if block.included {
                    reader.read_bit()? == 1
                } else {
                    band.inclusion_tree.decode(reader, x, y, threshold)?
                };
                if !included {
                    continue;
                }

                if !block.included {
                    let zero_bit_planes = band
                        .zero_bp_tree
                        .decode_value(reader, x, y, band.max_bit_planes as u32)?
                        .ok_or(EbcotError::InvalidZeroBitPlanes)?;
                    block.num_bit_planes = band.max_bit_planes - zero_bit_planes as u8;
                    block.lblock = INITIAL_LBLOCK;
                    block.included = true;
                    block.open_segment();
                } else if block.segment_passes == block.segment_limit {
                    block.open_segment();
                }

                let num_passes = get_num_passes(reader)?;
                block.lblock += get_comma_code(reader)?;

                let mut segments = Vec::new();
                let mut remaining = num_passes;
                loop {
                    let passes = remaining.min(block.segment_limit - block.segment_passes);
                    let bits = block.lblock + floor_log2(passes);
                    if bits > MAXIMUM_LENGTH_BITS {
                        return Err(EbcotError::InvalidSegmentLength);
                    }
                    let length = reader.read_bits(bits)? as usize;
                    segments.push(SegmentInfo { passes, length });
                    block.segment_passes += passes;
                    remaining -= passes;
                    if remaining == 0 {
                        break;
                    }
                    block.open_segment();
                }

                header.included_cblks.push(CodeBlockInfo {
                    band: b,
                    x,
                    y,
                    num_passes,
                    num_bit_planes: block.num_bit_planes,
                    segments,
                });
            }
        }
        Ok(header)
    }

    /// Write a packet header to the bit stream. `included_cblks` must follow
    /// band then raster order.
    pub fn write(&self, writer: &mut J2kBitWriter, state: &mut PrecinctState) -> Result<(), EbcotError> {
        if self.empty {
            writer.write_bit(0);
            return Ok(());
        }
        writer.write_bit(1);

        let threshold = self.layer_index as u32 + 1;
        let mut infos = self.included_cblks.iter().peekable();
        for (b, band) in state.bands.iter_mut().enumerate() {
            // Blocks first included in this layer reveal their layer number.
            for info in self.included_cblks.iter().filter(|c| c.band == b) {
                let index = info.y * band.grid_width + info.x;
                if !band.blocks.get(index).is_some_and(|s| s.included) {
                    band.inclusion_tree
                        .set_value(info.x, info.y, self.layer_index as u32);
                }
            }

            for (index, block) in band.blocks.iter_mut().enumerate() {
                let (x, y) = (index % band.grid_width, index / band.grid_width);
                let info = infos.next_if(|c| c.band == b && c.x == x && c.y == y);
                if block.included {
                    writer.write_bit(info.is_some() as u8);
                } else {
                    band.inclusion_tree.encode(writer, x, y, threshold);
                }
                let Some(info) = info else {
                    continue;
                };

                if !block.included {
                    block.lblock = INITIAL_LBLOCK;
                    block.included = true;
                    band.zero_bp_tree.encode(writer, x, y, u32::MAX);
                }
                put_num_passes(writer, info.num_passes)?;

                let increment = info
                    .segments
                    .iter()
                    .map(|s| {
                        (floor_log2(s.length) + 1).saturating_sub(block.lblock + floor_log2(s.passes))
                    })
                    .max()
                    .unwrap_or(0);
                put_comma_code(writer, increment);
                block.lblock += increment;

                for segment in &info.segments {
                    let length =
                        u32::try_from(segment.length).map_err(|_| EbcotError::InvalidSegmentLength)?;
                    writer.write_bits(length, block.lblock + floor_log2(segment.passes));
                }
            }
        }
        if infos.next().is_some() {
            return Err(EbcotError::InvalidArgumentLayout);
        }
        Ok(())
    }
}

/// One codeword segment piece carried by a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketSegment<'a> {
    pub passes: usize,
    pub data: &'a [u8],
}

/// New data of one code-block found in a packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketBlock<'a> {
    pub band: usize,
    /// Raster index inside the band's grid.
    pub block: usize,
    pub num_bit_planes: u8,
    pub segments: Vec<PacketSegment<'a>>,
}

/// A parsed packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet<'a> {
    pub blocks: Vec<PacketBlock<'a>>,
    /// Bytes consumed, header included.
    pub length: usize,
    pub fault: Option<EbcotError>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg2000::segment::PassKind;

    fn record(length: usize, terminated: bool) -> PassRecord {
        PassRecord {
            bit_plane: 0,
            kind: PassKind::Cleanup,
            rate: 0,
            distortion: 0.0,
            length,
            terminated,
        }
    }

    fn one_band(w: usize, h: usize, max_bit_planes: u8) -> PrecinctLayout {
        PrecinctLayout {
            bands: vec![BandLayout::new(SubbandOrientation::LL, w, h, max_bit_planes, 0)],
        }
    }

    #[test]
    fn test_packet_read_empty() {
        let data = vec![0x00]; // 0 bit -> empty
        let mut state = PrecinctState::new(&one_band(2, 2, 8), CodeBlockStyle::default()).unwrap();
        let packet = state.decode_packet(0, &data).unwrap();
        assert!(packet.blocks.is_empty());
        assert_eq!(packet.length, 1);
    }

    #[test]
    fn test_num_passes_codes() {
        let counts = [1usize, 2, 3, 5, 6, 36, 37, 164];
        let mut writer = J2kBitWriter::new();
        for &n in &counts {
            put_num_passes(&mut writer, n).unwrap();
        }
        let data = writer.finish();
        let mut reader = J2kBitReader::new(&data);
        for &n in &counts {
            assert_eq!(get_num_passes(&mut reader).unwrap(), n);
        }
        assert_eq!(
            put_num_passes(&mut J2kBitWriter::new(), 165),
            Err(EbcotError::InvalidPassCount)
        );
    }

    #[test]
    fn test_layers_roundtrip() {
        let layout = one_band(3, 1, 10);
        let style = CodeBlockStyle::default();
        let mut encoder = PrecinctState::new(&layout, style).unwrap();
        for (block, planes) in [7u8, 0, 9].into_iter().enumerate() {
            encoder.set_num_bit_planes(0, block, planes).unwrap();
        }

        let passes_a = [record(3, false), record(400, false), record(2, true)];
        let passes_c = [record(1, false), record(5, true)];
        let data_a = vec![0xA5u8; 405];
        let data_c = vec![0x3Cu8; 6];

        // Layer 0: block 0 sends two passes; layer 1: block 0 one more, block 2 both.
        let layer0 = vec![vec![
            BlockContribution { passes: &passes_a[..2], data: &data_a[..403] },
            BlockContribution::default(),
            BlockContribution::default(),
        ]];
        let layer1 = vec![vec![
            BlockContribution { passes: &passes_a[2..], data: &data_a[403..] },
            BlockContribution::default(),
            BlockContribution { passes: &passes_c, data: &data_c },
        ]];
        let mut stream = encoder.encode_packet(0, &layer0).unwrap();
        let first_len = stream.len();
        stream.extend(encoder.encode_packet(1, &layer1).unwrap());

        let mut decoder = PrecinctState::new(&layout, style).unwrap();
        let p0 = decoder.decode_packet(0, &stream).unwrap();
        assert_eq!(p0.length, first_len);
        assert_eq!(p0.fault, None);
        assert_eq!(p0.blocks.len(), 1);
        assert_eq!(p0.blocks[0].block, 0);
        assert_eq!(p0.blocks[0].num_bit_planes, 7);
        assert_eq!(p0.blocks[0].segments.len(), 1);
        assert_eq!(p0.blocks[0].segments[0].passes, 2);
        assert_eq!(p0.blocks[0].segments[0].data, &data_a[..403]);

        let p1 = decoder.decode_packet(1, &stream[first_len..]).unwrap();
        assert_eq!(p1.length, stream.len() - first_len);
        let blocks: Vec<usize> = p1.blocks.iter().map(|b| b.block).collect();
        assert_eq!(blocks, vec![0, 2]);
        assert_eq!(p1.blocks[0].segments[0].data, &data_a[403..]);
        assert_eq!(p1.blocks[1].num_bit_planes, 9);
        assert_eq!(p1.blocks[1].segments[0].data, &data_c[..]);
    }

    #[test]
    fn test_segments_follow_terminations() {
        // Under TERMALL every pass is its own segment.
        let layout = one_band(1, 1, 4);
        let style = CodeBlockStyle {
            terminate_all: true,
            ..Default::default()
        };
        let mut encoder = PrecinctState::new(&layout, style).unwrap();
        encoder.set_num_bit_planes(0, 0, 4).unwrap();
        let passes = [record(2, true), record(0, true), record(9, true)];
        let data = [1u8, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];
        let contributions = vec![vec![BlockContribution { passes: &passes, data: &data }]];
        let packet = encoder.encode_packet(0, &contributions).unwrap();

        let mut decoder = PrecinctState::new(&layout, style).unwrap();
        let parsed = decoder.decode_packet(0, &packet).unwrap();
        let segments = &parsed.blocks[0].segments;
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].data, &data[..2]);
        assert!(segments[1].data.is_empty());
        assert_eq!(segments[2].data, &data[2..]);
        assert!(segments.iter().all(|s| s.passes == 1));
    }

    #[test]
    fn test_truncated_body_keeps_whole_blocks() {
        let layout = one_band(2, 1, 6);
        let style = CodeBlockStyle::default();
        let mut encoder = PrecinctState::new(&layout, style).unwrap();
        encoder.set_num_bit_planes(0, 0, 6).unwrap();
        encoder.set_num_bit_planes(0, 1, 6).unwrap();
        let passes = [record(10, true)];
        let data = [7u8; 10];
        let contributions = vec![vec![
            BlockContribution { passes: &passes, data: &data },
            BlockContribution { passes: &passes, data: &data },
        ]];
        let packet = encoder.encode_packet(0, &contributions).unwrap();

        let mut decoder = PrecinctState::new(&layout, style).unwrap();
        let parsed = decoder.decode_packet(0, &packet[..packet.len() - 3]).unwrap();
        assert_eq!(parsed.fault, Some(EbcotError::TruncatedPacketBody));
        assert_eq!(parsed.blocks.len(), 1);
        assert_eq!(parsed.length, packet.len() - 10);
    }

    #[test]
    fn test_truncated_header() {
        let layout = one_band(2, 2, 6);
        let mut decoder = PrecinctState::new(&layout, CodeBlockStyle::default()).unwrap();
        // Non-empty bit, then the header runs out.
        assert_eq!(
            decoder.decode_packet(0, &[0xFF]).unwrap_err(),
            EbcotError::TruncatedPacketHeader
        );
    }

    #[test]
    fn test_layout_validation() {
        let layout = TileLayout::single_precinct(vec![
            BandLayout::new(SubbandOrientation::HL, 2, 1, 8, 0),
            BandLayout::new(SubbandOrientation::LH, 1, 1, 8, 2),
        ]);
        assert_eq!(layout.num_blocks(), 3);
        assert!(layout.validate(3).is_ok());
        assert_eq!(layout.validate(4), Err(EbcotError::InvalidArgumentLayout));

        let overlapping = TileLayout::single_precinct(vec![
            BandLayout::new(SubbandOrientation::HL, 2, 1, 8, 0),
            BandLayout::new(SubbandOrientation::LH, 1, 1, 8, 1),
        ]);
        assert_eq!(overlapping.validate(3), Err(EbcotError::InvalidArgumentLayout));
    }
}
