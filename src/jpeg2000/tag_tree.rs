use crate::error::EbcotError;
use crate::jpeg2000::bit_io::{J2kBitReader, J2kBitWriter};

// Value of a node nothing has been learnt about yet.
const UNDEFINED: u32 = u32::MAX;

/// Tag Tree for JPEG 2000 Packet Header coding.
/// Represents a quad-tree structure used to encode 2D arrays of values
/// (first inclusion layer, zero bit-planes). Every node holds the minimum of
/// its children, so a value shared by a region is sent once at the top.
pub struct TagTree {
    nodes: Vec<TagTreeNode>,
    leaf_width: usize,
    leaf_height: usize,
}

#[derive(Clone, Debug)]
struct TagTreeNode {
    value: u32,
    // Every value below `low` has already been ruled out.
    low: u32,
    known: bool,
    parent_index: Option<usize>,
}

impl Default for TagTreeNode {
    fn default() -> Self {
        Self {
            value: UNDEFINED,
            low: 0,
            known: false,
            parent_index: None,
        }
    }
}

impl TagTree {
    /// Create a new TagTree for a grid of `w` x `h` leaves.
    pub fn new(w: usize, h: usize) -> Result<Self, EbcotError> {
        let mut sizes = vec![(w, h)];
        let (mut current_w, mut current_h) = (w, h);
        while current_w > 1 || current_h > 1 {
            current_w = current_w.div_ceil(2);
            current_h = current_h.div_ceil(2);
            sizes.push((current_w, current_h));
        }
        let total = sizes.iter().map(|(w, h)| w * h).sum();

        let mut nodes = Vec::new();
        nodes.try_reserve_exact(total)?;
        nodes.resize(total, TagTreeNode::default());

        // Link children to parents, level by level.
        let mut level_start = 0;
        for pair in sizes.windows(2) {
            let ((cw, ch), (pw, _)) = (pair[0], pair[1]);
            let parent_start = level_start + cw * ch;
            for y in 0..ch {
                for x in 0..cw {
                    nodes[level_start + y * cw + x].parent_index =
                        Some(parent_start + (y / 2) * pw + x / 2);
                }
            }
            level_start = parent_start;
        }

        Ok(Self {
            nodes,
            leaf_width: w,
            leaf_height: h,
        })
    }

    /// Reset the tree state (values and known status).
    pub fn reset(&mut self) {
        for node in &mut self.nodes {
            node.value = UNDEFINED;
            node.low = 0;
            node.known = false;
        }
    }

    fn leaf(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.leaf_width && y < self.leaf_height).then(|| y * self.leaf_width + x)
    }

    /// Set the value at a leaf coordinate (x, y); ancestors keep the minimum.
    pub fn set_value(&mut self, x: usize, y: usize, value: u32) {
        let mut idx = self.leaf(x, y);
        while let Some(i) = idx {
            let node = &mut self.nodes[i];
            if node.value <= value {
                break;
            }
            node.value = value;
            idx = node.parent_index;
        }
    }

    // Path from the root down to the leaf.
    fn path(&self, leaf_idx: usize) -> Vec<usize> {
        let mut stack = vec![leaf_idx];
        let mut idx = leaf_idx;
        while let Some(parent) = self.nodes[idx].parent_index {
            stack.push(parent);
            idx = parent;
        }
        stack.reverse();
        stack
    }

    /// Encode what the decoder needs to learn whether the leaf at (x, y) is
    /// below `threshold`.
    pub fn encode(&mut self, writer: &mut J2kBitWriter, x: usize, y: usize, threshold: u32) {
        let Some(leaf_idx) = self.leaf(x, y) else {
            return;
        };
        let mut low = 0;
        for idx in self.path(leaf_idx) {
            let node = &mut self.nodes[idx];
            low = low.max(node.low);
            while low < threshold {
                if low >= node.value {
                    if !node.known {
                        writer.write_bit(1);
                        node.known = true;
                    }
                    break;
                }
                writer.write_bit(0);
                low += 1;
            }
            node.low = low;
        }
    }

    /// Decode the tag tree for leaf (x,y) up to threshold. Returns whether
    /// the leaf value is below `threshold`.
    pub fn decode(
        &mut self,
        reader: &mut J2kBitReader,
        x: usize,
        y: usize,
        threshold: u32,
    ) -> Result<bool, EbcotError> {
        let Some(leaf_idx) = self.leaf(x, y) else {
            return Ok(false);
        };
        let mut low = 0;
        for idx in self.path(leaf_idx) {
            let node = &mut self.nodes[idx];
            low = low.max(node.low);
            while low < threshold && low < node.value {
                if reader.read_bit()? == 1 {
                    node.value = low;
                } else {
                    low += 1;
                }
            }
            node.low = low;
        }
        Ok(self.nodes[leaf_idx].value < threshold)
    }

    /// Decodes the exact value of the leaf at (x, y), giving up once it
    /// would exceed `limit`.
    pub fn decode_value(
        &mut self,
        reader: &mut J2kBitReader,
        x: usize,
        y: usize,
        limit: u32,
    ) -> Result<Option<u32>, EbcotError> {
        for threshold in 1..=limit.saturating_add(1) {
            if self.decode(reader, x, y, threshold)? {
                return Ok(Some(threshold - 1));
            }
        }
        Ok(None)
    }
}
