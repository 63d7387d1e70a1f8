//! Resolution levels and their precinct partition.
//!
//! A level's precincts are laid out in raster order over a grid anchored at
//! multiples of the precinct size. Cells on the level's border are clipped
//! to its bounds, and a level with no samples has no precincts at all.

use std::ops::Range;
use std::sync::OnceLock;

use crate::error::GeometryError;
use crate::geometry::{ceil_div_pow2, floor_div_pow2, mul_pow2, Rect, Size};

use super::id::InClassId;
use super::params::PrecinctExponents;
use super::precinct::Precinct;
use super::subband::{Subband, SubbandKind};

/// Everything a resolution level needs from its parents to lay itself out.
pub(crate) struct LevelLayout {
    pub tile: u32,
    pub component: u16,
    pub num_tiles: u32,
    pub num_components: u16,
    pub resolution: u8,
    pub decomposition_levels: u8,
    pub tile_component: Rect,
    pub precinct_exponents: PrecinctExponents,
    pub block_exponents: (u8, u8),
    pub first_precinct: u64,
}

/// One resolution level of a tile-component.
///
/// Precincts partition the level's grid into `2^PPx x 2^PPy` cells anchored
/// at the grid origin, so the first column starts at `floor(trx0 / 2^PPx)`.
/// Precinct indices are raster-ordered and relative to that first cell.
#[derive(Debug, Clone)]
pub struct ResolutionLevel {
    resolution: u8,
    bounds: Rect,
    exponents: PrecinctExponents,
    origin_col: u32,
    origin_row: u32,
    precincts_wide: u32,
    precincts_high: u32,
    first_precinct: u64,
    subbands: Vec<Subband>,
    precincts: Vec<Precinct>,
}

impl ResolutionLevel {
    pub(crate) fn new(layout: LevelLayout) -> Self {
        let r = layout.resolution;
        let n = (layout.decomposition_levels - r) as u32;
        let tc = &layout.tile_component;
        let bounds = Rect::new(
            ceil_div_pow2(tc.x0, n),
            ceil_div_pow2(tc.y0, n),
            ceil_div_pow2(tc.x1, n),
            ceil_div_pow2(tc.y1, n),
        );

        let pp = layout.precinct_exponents;
        let (origin_col, precincts_wide) = partition(bounds.x0, bounds.x1, pp.x as u32);
        let (origin_row, precincts_high) = partition(bounds.y0, bounds.y1, pp.y as u32);

        // n_b for LL is N_L; for the detail bands of level r it is N_L - r + 1
        let n_b = if r == 0 { n } else { n + 1 };
        let subbands: Vec<Subband> = SubbandKind::for_resolution(r)
            .iter()
            .map(|kind| Subband {
                kind: *kind,
                bounds: kind.bounds(tc, n_b),
            })
            .collect();

        // Precinct cells shrink by one power of two on the subband grid
        let (band_px, band_py) = if r == 0 {
            (pp.x as u32, pp.y as u32)
        } else {
            ((pp.x as u32).saturating_sub(1), (pp.y as u32).saturating_sub(1))
        };
        let (xcb, ycb) = layout.block_exponents;
        let block_exponents = (xcb.min(band_px as u8), ycb.min(band_py as u8));

        let mut precincts = Vec::with_capacity((precincts_wide * precincts_high) as usize);
        for py in 0..precincts_high {
            for px in 0..precincts_wide {
                let col = origin_col + px;
                let row = origin_row + py;
                let cell = Rect::new(
                    mul_pow2(col, pp.x as u32),
                    mul_pow2(row, pp.y as u32),
                    mul_pow2(col + 1, pp.x as u32),
                    mul_pow2(row + 1, pp.y as u32),
                );
                let band_cell = Rect::new(
                    mul_pow2(col, band_px),
                    mul_pow2(row, band_py),
                    mul_pow2(col + 1, band_px),
                    mul_pow2(row + 1, band_py),
                );
                let index = py * precincts_wide + px;
                let sequence = layout.first_precinct + index as u64;

                precincts.push(Precinct {
                    id: InClassId::compose(
                        layout.tile,
                        layout.component,
                        sequence,
                        layout.num_tiles,
                        layout.num_components,
                    ),
                    tile: layout.tile,
                    component: layout.component,
                    resolution: r,
                    index,
                    px,
                    py,
                    bounds: cell.intersect(&bounds),
                    footprints: subbands
                        .iter()
                        .map(|band| (band.kind, band_cell.intersect(&band.bounds)))
                        .collect(),
                    block_exponents,
                    blocks: OnceLock::new(),
                });
            }
        }

        Self {
            resolution: r,
            bounds,
            exponents: pp,
            origin_col,
            origin_row,
            precincts_wide,
            precincts_high,
            first_precinct: layout.first_precinct,
            subbands,
            precincts,
        }
    }

    pub fn resolution(&self) -> u8 {
        self.resolution
    }

    /// Extent on this level's sample grid.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn precinct_exponents(&self) -> PrecinctExponents {
        self.exponents
    }

    pub fn precincts_wide(&self) -> u32 {
        self.precincts_wide
    }

    pub fn precincts_high(&self) -> u32 {
        self.precincts_high
    }

    /// Zero when the level has no samples.
    pub fn num_precincts(&self) -> u32 {
        self.precincts_wide * self.precincts_high
    }

    /// Sequence number of this level's first precinct within the
    /// tile-component. Level 0 starts at 0 and every level continues where
    /// the previous one stopped.
    pub fn first_precinct(&self) -> u64 {
        self.first_precinct
    }

    /// Nominal precinct size, clamped to the level's extent.
    pub fn precinct_size(&self) -> Size {
        Size::new(
            mul_pow2(1, self.exponents.x as u32).min(self.bounds.width()),
            mul_pow2(1, self.exponents.y as u32).min(self.bounds.height()),
        )
    }

    pub fn subbands(&self) -> &[Subband] {
        &self.subbands
    }

    /// Look up a subband. Asking for `LL` above level 0, or for a detail
    /// band at level 0, is a geometry error rather than an absent result.
    pub fn subband(&self, kind: SubbandKind) -> Result<&Subband, GeometryError> {
        self.subbands
            .iter()
            .find(|band| band.kind == kind)
            .ok_or(GeometryError::MissingSubband {
                band: kind,
                resolution: self.resolution,
            })
    }

    pub fn precincts(&self) -> &[Precinct] {
        &self.precincts
    }

    /// Precinct by raster index within this level.
    pub fn precinct(&self, index: u32) -> Option<&Precinct> {
        self.precincts.get(index as usize)
    }

    /// Precinct at column `px` and row `py` of this level's precinct
    /// partition. Out-of-range coordinates give `None` instead of wrapping
    /// into the next row.
    pub fn precinct_at(&self, px: u32, py: u32) -> Option<&Precinct> {
        if px >= self.precincts_wide || py >= self.precincts_high {
            return None;
        }
        self.precinct(py * self.precincts_wide + px)
    }

    /// Column and row ranges of the precincts touching `region`, a
    /// rectangle on this level's grid.
    pub fn precinct_range(&self, region: &Rect) -> (Range<u32>, Range<u32>) {
        let region = region.intersect(&self.bounds);
        if region.is_empty() || self.num_precincts() == 0 {
            return (0..0, 0..0);
        }
        let span = |lo: u32, hi: u32, exp: u8, origin: u32, count: u32| -> Range<u32> {
            let first = floor_div_pow2(lo, exp as u32).saturating_sub(origin);
            let last = ceil_div_pow2(hi, exp as u32).saturating_sub(origin);
            first.min(count)..last.min(count)
        };
        (
            span(region.x0, region.x1, self.exponents.x, self.origin_col, self.precincts_wide),
            span(region.y0, region.y1, self.exponents.y, self.origin_row, self.precincts_high),
        )
    }

    /// Precincts touching `region`, in raster order.
    pub fn precincts_in(&self, region: &Rect) -> impl Iterator<Item = &Precinct> + '_ {
        let (cols, rows) = self.precinct_range(region);
        rows.flat_map(move |py| cols.clone().map(move |px| (px, py)))
            .filter_map(move |(px, py)| self.precinct_at(px, py))
    }
}

/// First cell index and cell count of a `2^exp` partition over `[lo, hi)`.
fn partition(lo: u32, hi: u32, exp: u32) -> (u32, u32) {
    let first = floor_div_pow2(lo, exp);
    if hi <= lo {
        return (first, 0);
    }
    (first, ceil_div_pow2(hi, exp) - first)
}
