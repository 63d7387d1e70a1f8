use std::sync::OnceLock;

use crate::geometry::{ceil_div_pow2, floor_div_pow2, mul_pow2, Rect};

use super::id::InClassId;
use super::subband::SubbandKind;

/// The code-blocks of one precinct inside one subband.
///
/// Blocks are aligned to a `2^xcb' x 2^ycb'` grid anchored at the subband
/// origin and clipped to the precinct footprint, so edge blocks can be
/// smaller than nominal. Block coordinates `(y_block, x_block)` used by the
/// rest of the crate are relative to this grid: `0..rows` and `0..cols`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeBlockGrid {
    pub band: SubbandKind,

    /// Precinct footprint on the subband grid
    pub bounds: Rect,

    /// Effective code-block width exponent (xcb')
    pub block_width_exp: u8,

    /// Effective code-block height exponent (ycb')
    pub block_height_exp: u8,

    /// Absolute index of the first block column in the subband
    pub first_col: u32,

    /// Absolute index of the first block row in the subband
    pub first_row: u32,

    pub cols: u32,
    pub rows: u32,
}

impl CodeBlockGrid {
    pub(crate) fn new(band: SubbandKind, bounds: Rect, xcb: u8, ycb: u8) -> Self {
        let span = |lo: u32, hi: u32, exp: u8| -> (u32, u32) {
            if hi <= lo {
                return (floor_div_pow2(lo, exp as u32), 0);
            }
            let first = floor_div_pow2(lo, exp as u32);
            (first, ceil_div_pow2(hi, exp as u32) - first)
        };
        let (first_col, cols) = span(bounds.x0, bounds.x1, xcb);
        let (first_row, rows) = span(bounds.y0, bounds.y1, ycb);

        Self {
            band,
            bounds,
            block_width_exp: xcb,
            block_height_exp: ycb,
            first_col,
            first_row,
            cols,
            rows,
        }
    }

    pub fn num_blocks(&self) -> u32 {
        self.cols * self.rows
    }

    /// Raster index of a block inside the grid.
    pub fn raster_index(&self, y_block: u32, x_block: u32) -> Option<usize> {
        if y_block >= self.rows || x_block >= self.cols {
            return None;
        }
        Some((y_block * self.cols + x_block) as usize)
    }

    /// Sample extent of one block, clipped to the precinct footprint.
    pub fn block_bounds(&self, y_block: u32, x_block: u32) -> Option<Rect> {
        self.raster_index(y_block, x_block)?;
        let col = self.first_col + x_block;
        let row = self.first_row + y_block;
        let xcb = self.block_width_exp as u32;
        let ycb = self.block_height_exp as u32;
        Some(
            Rect::new(
                mul_pow2(col, xcb),
                mul_pow2(row, ycb),
                mul_pow2(col + 1, xcb),
                mul_pow2(row + 1, ycb),
            )
            .intersect(&self.bounds),
        )
    }
}

/// A precinct: the unit of delivery.
///
/// Precincts are leaves of the codestream tree. They keep the footprint of
/// each of their subbands so the code-block partition can be computed on
/// first use and cached without touching the parent resolution level.
#[derive(Debug, Clone)]
pub struct Precinct {
    pub(crate) id: InClassId,
    pub(crate) tile: u32,
    pub(crate) component: u16,
    pub(crate) resolution: u8,
    pub(crate) index: u32,
    pub(crate) px: u32,
    pub(crate) py: u32,
    pub(crate) bounds: Rect,
    pub(crate) footprints: Vec<(SubbandKind, Rect)>,
    pub(crate) block_exponents: (u8, u8),
    pub(crate) blocks: OnceLock<Vec<CodeBlockGrid>>,
}

impl Precinct {
    pub fn id(&self) -> InClassId {
        self.id
    }

    pub fn tile(&self) -> u32 {
        self.tile
    }

    pub fn component(&self) -> u16 {
        self.component
    }

    pub fn resolution(&self) -> u8 {
        self.resolution
    }

    /// Raster index within the resolution level.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Column and row of the precinct within its resolution level.
    pub fn position(&self) -> (u32, u32) {
        (self.px, self.py)
    }

    /// Extent on the resolution level's grid, clipped to the level.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Code-block partition, one grid per subband in codestream order.
    pub fn code_blocks(&self) -> &[CodeBlockGrid] {
        self.blocks.get_or_init(|| {
            let (xcb, ycb) = self.block_exponents;
            self.footprints
                .iter()
                .map(|(band, footprint)| CodeBlockGrid::new(*band, *footprint, xcb, ycb))
                .collect()
        })
    }

    /// Code-block partition of a single subband.
    pub fn band_blocks(&self, band: SubbandKind) -> Option<&CodeBlockGrid> {
        self.code_blocks().iter().find(|grid| grid.band == band)
    }

    pub fn num_code_blocks(&self) -> u32 {
        self.code_blocks().iter().map(|grid| grid.num_blocks()).sum()
    }
}
