//! Tier-2 packet header encoding (ISO/IEC 15444-1 B.10).
//!
//! A header signals, per code-block, whether the block is included, its
//! missing bit-planes on first inclusion, the number of new coding passes
//! and their byte length. Inclusion and zero bit-planes are coded with tag
//! trees whose state carries over from one layer to the next, so a
//! precinct's headers must be encoded in layer order.

use std::collections::HashMap;

use bytes::Bytes;

use crate::codestream::{CodeBlockGrid, InClassId};

use super::bit_writer::HeaderBitWriter;
use super::tag_tree::{TagTree, UNSET};
use super::PacketHeaderCodec;

/// Initial value of the per-block `Lblock` state.
const INITIAL_LBLOCK: u8 = 3;

/// Largest pass count the codeword table can express.
const MAX_CODED_PASSES: usize = 164;

/// Write the number-of-coding-passes codeword (Table B.4).
pub fn encode_pass_count(writer: &mut HeaderBitWriter, passes: usize) {
    let passes = passes.clamp(1, MAX_CODED_PASSES) as u32;
    match passes {
        1 => writer.write_bit(false),
        2 => writer.write_bits(0b10, 2),
        3..=5 => {
            writer.write_bits(0b11, 2);
            writer.write_bits(passes - 3, 2);
        }
        6..=36 => {
            writer.write_bits(0b1111, 4);
            writer.write_bits(passes - 6, 5);
        }
        _ => {
            writer.write_bits(0b1_1111_1111, 9);
            writer.write_bits(passes - 37, 7);
        }
    }
}

#[derive(Debug, Clone)]
struct BandState {
    blocks: usize,
    inclusion: TagTree,
    zero_bit_planes: TagTree,
    included: Vec<bool>,
    lblock: Vec<u8>,
}

/// Packet header encoder following ISO/IEC 15444-1 B.10.
///
/// Keeps one set of tag trees per precinct between
/// [`begin_precinct`](PacketHeaderCodec::begin_precinct) and
/// [`end_precinct`](PacketHeaderCodec::end_precinct). Each code-block
/// contributes a single codeword segment per packet.
#[derive(Debug, Default)]
pub struct Tier2HeaderCodec {
    precincts: HashMap<InClassId, Vec<BandState>>,
}

impl Tier2HeaderCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_precincts(&self) -> usize {
        self.precincts.len()
    }
}

impl PacketHeaderCodec for Tier2HeaderCodec {
    fn begin_precinct(
        &mut self,
        id: InClassId,
        grids: &[CodeBlockGrid],
        first_layers: &[Vec<Option<u16>>],
        zero_bit_planes: &[Vec<u8>],
    ) {
        let bands = grids
            .iter()
            .enumerate()
            .map(|(b, grid)| {
                let (cols, rows) = (grid.cols as usize, grid.rows as usize);
                let blocks = cols * rows;
                let mut inclusion = TagTree::new(cols, rows);
                let mut zbp = TagTree::new(cols, rows);
                for blk in 0..blocks {
                    let first = first_layers
                        .get(b)
                        .and_then(|layers| layers.get(blk).copied().flatten())
                        .map(u32::from)
                        .unwrap_or(UNSET);
                    inclusion.set_value(blk, first);
                    let planes = zero_bit_planes
                        .get(b)
                        .and_then(|planes| planes.get(blk).copied())
                        .unwrap_or(0);
                    zbp.set_value(blk, planes as u32);
                }
                BandState {
                    blocks,
                    inclusion,
                    zero_bit_planes: zbp,
                    included: vec![false; blocks],
                    lblock: vec![INITIAL_LBLOCK; blocks],
                }
            })
            .collect();
        self.precincts.insert(id, bands);
    }

    fn encode_header(&mut self, id: InClassId, layer: u16, pass_lengths: &[Vec<Vec<u32>>]) -> Bytes {
        let mut writer = HeaderBitWriter::new();
        let non_empty = pass_lengths
            .iter()
            .flatten()
            .any(|passes| !passes.is_empty());
        let Some(bands) = self.precincts.get_mut(&id).filter(|_| non_empty) else {
            writer.write_bit(false);
            return writer.finish();
        };
        writer.write_bit(true);

        for (b, band) in bands.iter_mut().enumerate() {
            for blk in 0..band.blocks {
                let passes: &[u32] = pass_lengths
                    .get(b)
                    .and_then(|blocks| blocks.get(blk))
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);

                if band.included[blk] {
                    writer.write_bit(!passes.is_empty());
                    if passes.is_empty() {
                        continue;
                    }
                } else {
                    band.inclusion.encode(&mut writer, blk, layer as u32 + 1);
                    if passes.is_empty() {
                        continue;
                    }
                    band.included[blk] = true;
                    band.zero_bit_planes.encode_value(&mut writer, blk);
                }

                encode_pass_count(&mut writer, passes.len());

                let total: u64 = passes.iter().map(|&len| len as u64).sum();
                let total = total.min(u32::MAX as u64) as u32;
                let needed = (u32::BITS - total.leading_zeros()) as u8;
                let log_passes = passes.len().ilog2() as u8;
                let lblock = &mut band.lblock[blk];
                while *lblock + log_passes < needed {
                    writer.write_bit(true);
                    *lblock += 1;
                }
                writer.write_bit(false);
                writer.write_bits(total, *lblock + log_passes);
            }
        }

        writer.finish()
    }

    fn end_precinct(&mut self, id: InClassId) {
        self.precincts.remove(&id);
    }
}
