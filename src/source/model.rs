//! A codestream store computed from the geometry model alone.
//!
//! Pass lengths grow with the code-block area and the bit-plane, and zero
//! bit-planes follow a fixed pattern over the block grid. Offsets point into
//! a virtual file in which every precinct of every tile-component owns a
//! disjoint slot, so schedules built on it can be checked for overlaps.

use std::collections::HashMap;
use std::sync::Arc;

use crate::codestream::{Codestream, InClassId, Precinct, ResolutionLevel};
use crate::error::GeometryError;

use super::{BlockRef, Capability, CodestreamStore, PacketExtent, PacketIndex};

/// Largest pass count a packet header can signal.
const MAX_PASSES: u16 = 164;

/// Where the precincts of one resolution level live in the virtual file.
///
/// Every precinct of the level owns a slot of `precinct_span` bytes: one
/// sub-slot of `band_span` per subband, then room for its stored packets.
/// Inside a band sub-slot, every code-block owns `block_span` bytes.
#[derive(Debug, Clone, Copy)]
struct LevelSlots {
    base: u64,
    precinct_span: u64,
    band_span: u64,
    block_span: u64,
    packets: u64,
}

impl LevelSlots {
    /// Size the slots of `level` from bounds on its block count and block
    /// size. Returns `None` if a span does not fit in 64 bits.
    fn new(codestream: &Codestream, level: &ResolutionLevel, t: u32, c: u16, base: u64) -> Option<Self> {
        let r = level.resolution();
        let first = level.precincts().first()?;
        let (xcb, ycb) = first.block_exponents;
        let exponents = level.precinct_exponents();
        let shrink = u8::from(r > 0);
        let band_px = exponents.x.saturating_sub(shrink).max(xcb);
        let band_py = exponents.y.saturating_sub(shrink).max(ycb);

        let widest = level.subbands().iter().map(|b| b.bounds.width()).max().unwrap_or(0);
        let tallest = level.subbands().iter().map(|b| b.bounds.height()).max().unwrap_or(0);
        let cols = (1u64 << (band_px - xcb)).min(widest.div_ceil(1 << xcb) as u64 + 1);
        let rows = (1u64 << (band_py - ycb)).min(tallest.div_ceil(1 << ycb) as u64 + 1);
        let blocks = cols.checked_mul(rows)?;

        let magnitude = level
            .subbands()
            .iter()
            .map(|b| codestream.magnitude_bits(t, c, r, b.kind))
            .max()
            .unwrap_or(0);
        let passes = (3 * magnitude as u16).saturating_sub(2).min(MAX_PASSES);
        let area = 1u64 << (xcb + ycb);
        let block_span = (0..passes).map(|p| ModelStore::pass_length(area, p) as u64).sum::<u64>().max(1);

        let bands = level.subbands().len() as u64;
        let band_span = blocks.checked_mul(block_span)?;
        let layers = codestream.layers(t) as u64;
        let packets = bands.checked_mul(band_span)?;
        let headers = layers.checked_mul(blocks.checked_mul(bands)?.checked_add(2)?)?;
        let precinct_span = packets.checked_mul(2)?.checked_add(headers)?;

        Some(Self {
            base,
            precinct_span,
            band_span,
            block_span,
            packets,
        })
    }

    fn end(&self, precincts: u32) -> Option<u64> {
        self.precinct_span.checked_mul(precincts as u64)?.checked_add(self.base)
    }

    fn precinct(&self, index: u32) -> u64 {
        self.base + index as u64 * self.precinct_span
    }
}

/// A codestream store backed by a closed-form rate model.
///
/// Every code-block gets `3 * K - 2` coding passes, where `K` is the band's
/// magnitude bit-plane count minus a small per-block zero bit-plane count.
/// Pass lengths grow with block area and bit-plane depth, cleanup passes
/// being the largest.
///
/// Offsets address a virtual file laid out level by level in tile,
/// component and resolution order. Each level's slots are sized from its
/// own geometry, so the file grows with the image rather than with the
/// largest in-class identifier.
///
/// The same passes are split evenly over the codestream's quality layers
/// to answer [`PacketIndex`] queries.
#[derive(Debug, Clone)]
pub struct ModelStore {
    codestream: Arc<Codestream>,
    levels: Arc<HashMap<(u32, u16, u8), LevelSlots>>,
    extent: u64,
    packet_index: bool,
}

impl ModelStore {
    /// Lay out the virtual file of a codestream.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::FileTooLarge`] if the layout needs more
    /// than 2^64 bytes of file space.
    pub fn new(codestream: Arc<Codestream>) -> Result<Self, GeometryError> {
        let mut levels = HashMap::new();
        let mut extent = 0u64;
        for t in 0..codestream.num_tiles() {
            let Some(tile) = codestream.tile(t) else {
                continue;
            };
            for component in tile.components() {
                let c = component.index();
                for level in component.resolution_levels() {
                    if level.num_precincts() == 0 {
                        continue;
                    }
                    let too_large = || GeometryError::FileTooLarge {
                        tile: t,
                        component: c,
                        resolution: level.resolution(),
                    };
                    let slots = LevelSlots::new(&codestream, level, t, c, extent).ok_or_else(too_large)?;
                    extent = slots.end(level.num_precincts()).ok_or_else(too_large)?;
                    levels.insert((t, c, level.resolution()), slots);
                }
            }
        }

        Ok(Self {
            codestream,
            levels: Arc::new(levels),
            extent,
            packet_index: true,
        })
    }

    /// Enable or disable answers to packet queries.
    pub fn with_packet_index(mut self, enabled: bool) -> Self {
        self.packet_index = enabled;
        self
    }

    pub fn codestream(&self) -> &Arc<Codestream> {
        &self.codestream
    }

    /// Size of the virtual file: every offset the store hands out lies
    /// below it.
    pub fn extent(&self) -> u64 {
        self.extent
    }

    fn zero_bit_planes_of(&self, block: BlockRef, first_col: u32, first_row: u32) -> u8 {
        let col = first_col + block.x_block;
        let row = first_row + block.y_block;
        ((col + 2 * row + block.band.position() as u32) % 3) as u8
    }

    fn block_passes(&self, precinct: &Precinct, block: BlockRef) -> u16 {
        let Some(grid) = precinct.band_blocks(block.band) else {
            return 0;
        };
        let Some(bounds) = grid.block_bounds(block.y_block, block.x_block) else {
            return 0;
        };
        if bounds.is_empty() {
            return 0;
        }
        let magnitude = self.codestream.magnitude_bits(
            precinct.tile(),
            precinct.component(),
            precinct.resolution(),
            block.band,
        );
        let planes = magnitude.saturating_sub(self.zero_bit_planes_of(block, grid.first_col, grid.first_row));
        if planes == 0 {
            return 0;
        }
        (3 * planes as u16 - 2).min(MAX_PASSES)
    }

    fn block_area(precinct: &Precinct, block: BlockRef) -> u64 {
        precinct
            .band_blocks(block.band)
            .and_then(|grid| grid.block_bounds(block.y_block, block.x_block))
            .map(|bounds| bounds.area())
            .unwrap_or(0)
    }

    fn pass_length(area: u64, pass: u16) -> u32 {
        let plane = (pass as u64 + 2) / 3;
        // Cleanup, significance propagation, magnitude refinement
        let (num, den) = match pass % 3 {
            0 => (4, 4),
            1 => (3, 4),
            _ => (2, 4),
        };
        let bytes = area * (plane + 1) * num / (64 * den);
        bytes.clamp(1, u32::MAX as u64) as u32
    }

    fn slots(&self, precinct: &Precinct) -> Option<&LevelSlots> {
        self.levels
            .get(&(precinct.tile(), precinct.component(), precinct.resolution()))
    }

    fn block_slot(&self, precinct: &Precinct, block: BlockRef) -> u64 {
        let Some(slots) = self.slots(precinct) else {
            return 0;
        };
        let raster = precinct
            .band_blocks(block.band)
            .and_then(|grid| grid.raster_index(block.y_block, block.x_block))
            .unwrap_or(0) as u64;
        slots.precinct(precinct.index())
            + block.band.position() as u64 * slots.band_span
            + raster * slots.block_span
    }

    fn blocks(precinct: &Precinct) -> impl Iterator<Item = BlockRef> + '_ {
        precinct.code_blocks().iter().flat_map(|grid| {
            (0..grid.rows).flat_map(move |y| (0..grid.cols).map(move |x| BlockRef::new(grid.band, y, x)))
        })
    }

    /// Passes of a block assigned to stored layer `layer` of `layers`.
    fn layer_passes(passes: u16, layer: u16, layers: u16) -> std::ops::Range<u16> {
        let layers = layers.max(1) as u32;
        let start = (passes as u32 * layer as u32 / layers) as u16;
        let end = (passes as u32 * (layer as u32 + 1) / layers) as u16;
        start..end
    }

    fn stored_packet(&self, precinct: &Precinct, layer: u16, layers: u16) -> (u32, u32) {
        let mut contributing = 0u32;
        let mut body = 0u64;
        for block in Self::blocks(precinct) {
            let passes = self.block_passes(precinct, block);
            let range = Self::layer_passes(passes, layer, layers);
            if range.is_empty() {
                continue;
            }
            contributing += 1;
            let area = Self::block_area(precinct, block);
            body += range.map(|pass| Self::pass_length(area, pass) as u64).sum::<u64>();
        }
        let header = if contributing == 0 { 1 } else { 2 + contributing };
        (header, body.min(u32::MAX as u64) as u32)
    }
}

impl CodestreamStore for ModelStore {
    fn coding_passes(&self, id: InClassId, block: BlockRef) -> u16 {
        self.codestream
            .precinct(id)
            .map(|precinct| self.block_passes(precinct, block))
            .unwrap_or(0)
    }

    fn coding_pass_offset(&self, id: InClassId, block: BlockRef, pass: u16) -> u64 {
        let Some(precinct) = self.codestream.precinct(id) else {
            return 0;
        };
        let area = Self::block_area(precinct, block);
        let before: u64 = (0..pass).map(|p| Self::pass_length(area, p) as u64).sum();
        self.block_slot(precinct, block) + before
    }

    fn coding_pass_length(&self, id: InClassId, block: BlockRef, pass: u16) -> u32 {
        let Some(precinct) = self.codestream.precinct(id) else {
            return 0;
        };
        if pass >= self.block_passes(precinct, block) {
            return 0;
        }
        Self::pass_length(Self::block_area(precinct, block), pass)
    }

    fn zero_bit_planes(&self, id: InClassId) -> Vec<Vec<u8>> {
        let Some(precinct) = self.codestream.precinct(id) else {
            return Vec::new();
        };
        precinct
            .code_blocks()
            .iter()
            .map(|grid| {
                (0..grid.rows)
                    .flat_map(|y| (0..grid.cols).map(move |x| (y, x)))
                    .map(|(y, x)| {
                        self.zero_bit_planes_of(BlockRef::new(grid.band, y, x), grid.first_col, grid.first_row)
                    })
                    .collect()
            })
            .collect()
    }
}

impl PacketIndex for ModelStore {
    fn layer_count(&self, id: InClassId) -> Capability<u16> {
        if !self.packet_index {
            return Capability::Unsupported;
        }
        match self.codestream.precinct(id) {
            Some(precinct) => Capability::Supported(self.codestream.layers(precinct.tile())),
            None => Capability::Unsupported,
        }
    }

    fn packet(&self, id: InClassId, layer: u16) -> Capability<PacketExtent> {
        if !self.packet_index {
            return Capability::Unsupported;
        }
        let Some(precinct) = self.codestream.precinct(id) else {
            return Capability::Unsupported;
        };
        let layers = self.codestream.layers(precinct.tile());
        if layer >= layers {
            return Capability::Unsupported;
        }

        let Some(slots) = self.slots(precinct) else {
            return Capability::Unsupported;
        };
        let mut offset = slots.precinct(precinct.index()) + slots.packets;
        for previous in 0..layer {
            let (header, body) = self.stored_packet(precinct, previous, layers);
            offset += header as u64 + body as u64;
        }
        let (header_length, body_length) = self.stored_packet(precinct, layer, layers);
        Capability::Supported(PacketExtent {
            offset,
            header_length,
            body_length,
        })
    }
}
