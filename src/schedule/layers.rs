//! Quality layers synthesized by a scheduler rather than read from the
//! codestream.

use std::ops::Range;

use crate::codec::PacketHeaderCodec;
use crate::codestream::{CodeBlockGrid, InClassId, Precinct};
use crate::source::{BlockRef, CodestreamStore};
use crate::window::RelevantPrecinct;

use super::response::{push_range, FileRange, LayerHeader, Pushed, ResponseBuilder};

/// Passes every code-block of a precinct contributes to one layer,
/// indexed `[band][block]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerPlan {
    pub passes: Vec<Vec<Range<u16>>>,
}

impl LayerPlan {
    /// A layer with no contributions from any block of `grids`.
    pub fn empty(grids: &[CodeBlockGrid]) -> Self {
        Self {
            passes: grids
                .iter()
                .map(|grid| vec![0..0; grid.num_blocks() as usize])
                .collect(),
        }
    }

    /// Whether any block contributes.
    pub fn is_empty(&self) -> bool {
        self.passes.iter().flatten().all(Range::is_empty)
    }

    /// Extend a block's pass range to include `pass`.
    pub fn add_pass(&mut self, band: usize, block: usize, pass: u16) {
        if let Some(range) = self.passes.get_mut(band).and_then(|blocks| blocks.get_mut(block)) {
            *range = if range.is_empty() {
                pass..pass + 1
            } else {
                range.start.min(pass)..range.end.max(pass + 1)
            };
        }
    }
}

/// A precinct's data-bin as a scheduler lays it out.
#[derive(Debug, Clone)]
pub struct SynthesizedPrecinct {
    pub id: InClassId,
    pub grids: Vec<CodeBlockGrid>,
    pub layers: Vec<LayerPlan>,
}

impl SynthesizedPrecinct {
    pub fn new(precinct: &Precinct) -> Self {
        Self {
            id: precinct.id(),
            grids: precinct.code_blocks().to_vec(),
            layers: Vec::new(),
        }
    }

    pub fn num_layers(&self) -> u16 {
        self.layers.len() as u16
    }

    /// Layer in which each block first contributes, `[band][block]`.
    pub fn first_layers(&self) -> Vec<Vec<Option<u16>>> {
        self.grids
            .iter()
            .enumerate()
            .map(|(b, grid)| {
                (0..grid.num_blocks() as usize)
                    .map(|blk| {
                        self.layers
                            .iter()
                            .position(|plan| plan.passes[b].get(blk).is_some_and(|r| !r.is_empty()))
                            .map(|l| l as u16)
                    })
                    .collect()
            })
            .collect()
    }

    /// Block address of a raster index in band `b`.
    pub fn block_ref(&self, b: usize, blk: usize) -> Option<BlockRef> {
        let grid = self.grids.get(b)?;
        let cols = grid.cols as usize;
        if cols == 0 {
            return None;
        }
        Some(BlockRef::new(grid.band, (blk / cols) as u32, (blk % cols) as u32))
    }

    /// Reset the codec state for this precinct.
    pub fn begin(&self, codec: &mut dyn PacketHeaderCodec, store: &dyn CodestreamStore) {
        let zero_bit_planes = store.zero_bit_planes(self.id);
        codec.begin_precinct(self.id, &self.grids, &self.first_layers(), &zero_bit_planes);
    }

    /// Pass lengths and file ranges of one layer.
    fn layer_contents(&self, store: &dyn CodestreamStore, layer: u16) -> (Vec<Vec<Vec<u32>>>, Vec<FileRange>) {
        let mut lengths = Vec::with_capacity(self.grids.len());
        let mut ranges = Vec::new();
        let Some(plan) = self.layers.get(layer as usize) else {
            return (lengths, ranges);
        };

        for (b, blocks) in plan.passes.iter().enumerate() {
            let mut band_lengths = Vec::with_capacity(blocks.len());
            for (blk, passes) in blocks.iter().enumerate() {
                let mut block_lengths = Vec::with_capacity(passes.len());
                if let Some(block) = self.block_ref(b, blk) {
                    for pass in passes.clone() {
                        let length = store.coding_pass_length(self.id, block, pass);
                        block_lengths.push(length);
                        push_range(&mut ranges, store.coding_pass_offset(self.id, block, pass), length);
                    }
                }
                band_lengths.push(block_lengths);
            }
            lengths.push(band_lengths);
        }
        (lengths, ranges)
    }

    /// Encode and queue the next layer of `precinct`. The header is always
    /// encoded so the codec state advances over cached layers too.
    pub(crate) fn push_next_layer(
        &self,
        builder: &mut ResponseBuilder<'_>,
        codec: &mut dyn PacketHeaderCodec,
        store: &dyn CodestreamStore,
        precinct: &mut RelevantPrecinct,
    ) -> Pushed {
        let layer = precinct.layers_queued;
        let (lengths, ranges) = self.layer_contents(store, layer);
        let header = codec.encode_header(self.id, layer, &lengths);
        let final_layer = layer + 1 >= self.num_layers();
        builder.push_layer(precinct, LayerHeader::Encoded(header), &ranges, final_layer)
    }
}
