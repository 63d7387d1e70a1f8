//! Tag trees (ISO/IEC 15444-1 B.10.2).

use super::bit_writer::HeaderBitWriter;

/// Value of a leaf that has not been assigned.
pub const UNSET: u32 = u32::MAX;

#[derive(Debug, Clone)]
struct Node {
    value: u32,
    low: u32,
    known: bool,
    parent: Option<usize>,
}

/// Tag tree encoder (ISO/IEC 15444-1 B.10.2).
///
/// A quad-tree over a grid of leaves in which every node holds the minimum
/// of its children. Encoding a leaf against a threshold emits only the bits
/// not already implied by earlier calls, so state persists across packets.
#[derive(Debug, Clone)]
pub struct TagTree {
    nodes: Vec<Node>,
    width: usize,
    height: usize,
}

impl TagTree {
    /// A tree over `width` by `height` leaves, all unset.
    pub fn new(width: usize, height: usize) -> Self {
        let mut nodes: Vec<Node> = Vec::new();
        let leaf = Node {
            value: UNSET,
            low: 0,
            known: false,
            parent: None,
        };
        nodes.resize(width * height, leaf.clone());

        let (mut level_start, mut w, mut h) = (0usize, width, height);
        while w > 1 || h > 1 {
            let (next_w, next_h) = (w.div_ceil(2), h.div_ceil(2));
            let next_start = nodes.len();
            nodes.resize(next_start + next_w * next_h, leaf.clone());
            for y in 0..h {
                for x in 0..w {
                    nodes[level_start + y * w + x].parent = Some(next_start + (y / 2) * next_w + x / 2);
                }
            }
            level_start = next_start;
            w = next_w;
            h = next_h;
        }

        Self {
            nodes,
            width,
            height,
        }
    }

    pub fn num_leaves(&self) -> usize {
        self.width * self.height
    }

    /// Assign a leaf value, lowering ancestors so each holds the minimum of
    /// its subtree.
    pub fn set_value(&mut self, leaf: usize, value: u32) {
        if leaf >= self.num_leaves() {
            return;
        }
        self.nodes[leaf].value = value;
        let mut index = self.nodes[leaf].parent;
        while let Some(i) = index {
            if self.nodes[i].value <= value {
                break;
            }
            self.nodes[i].value = value;
            index = self.nodes[i].parent;
        }
    }

    pub fn value(&self, leaf: usize) -> Option<u32> {
        self.nodes.get(leaf).filter(|_| leaf < self.num_leaves()).map(|n| n.value)
    }

    /// Emit the bits telling a decoder whether the leaf value is below
    /// `threshold`.
    pub fn encode(&mut self, writer: &mut HeaderBitWriter, leaf: usize, threshold: u32) {
        if leaf >= self.num_leaves() {
            return;
        }

        let mut path = Vec::new();
        let mut index = leaf;
        while let Some(parent) = self.nodes[index].parent {
            path.push(index);
            index = parent;
        }
        path.push(index);

        let mut low = 0u32;
        while let Some(i) = path.pop() {
            let node = &mut self.nodes[i];
            if low > node.low {
                node.low = low;
            } else {
                low = node.low;
            }
            while low < threshold {
                if low >= node.value {
                    if !node.known {
                        writer.write_bit(true);
                        node.known = true;
                    }
                    break;
                }
                writer.write_bit(false);
                low += 1;
            }
            node.low = low;
        }
    }

    /// Encode a leaf's value completely.
    pub fn encode_value(&mut self, writer: &mut HeaderBitWriter, leaf: usize) {
        if let Some(value) = self.value(leaf) {
            self.encode(writer, leaf, value.saturating_add(1));
        }
    }
}
