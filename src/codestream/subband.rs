use serde::{Deserialize, Serialize};

use crate::geometry::{ceil_div_i64, Rect};

/// Subband orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SubbandKind {
    LowLow,
    HighLow,
    LowHigh,
    HighHigh,
}

const LEVEL_ZERO_BANDS: [SubbandKind; 1] = [SubbandKind::LowLow];
const DETAIL_BANDS: [SubbandKind; 3] = [
    SubbandKind::HighLow,
    SubbandKind::LowHigh,
    SubbandKind::HighHigh,
];

impl SubbandKind {
    /// Subbands present at a resolution level, in codestream order.
    pub fn for_resolution(resolution: u8) -> &'static [SubbandKind] {
        if resolution == 0 {
            &LEVEL_ZERO_BANDS
        } else {
            &DETAIL_BANDS
        }
    }

    /// Position of this band within its resolution level.
    pub fn position(&self) -> usize {
        match self {
            SubbandKind::LowLow | SubbandKind::HighLow => 0,
            SubbandKind::LowHigh => 1,
            SubbandKind::HighHigh => 2,
        }
    }

    /// Whether the band exists at resolution level `resolution`.
    pub fn exists_at(&self, resolution: u8) -> bool {
        (*self == SubbandKind::LowLow) == (resolution == 0)
    }

    /// Nominal dynamic-range gain in bits (Table E.1).
    pub fn gain_bits(&self) -> u8 {
        match self {
            SubbandKind::LowLow => 0,
            SubbandKind::HighLow | SubbandKind::LowHigh => 1,
            SubbandKind::HighHigh => 2,
        }
    }

    /// `(xo_b, yo_b)` from equation B-15.
    fn offsets(&self) -> (i64, i64) {
        match self {
            SubbandKind::LowLow => (0, 0),
            SubbandKind::HighLow => (1, 0),
            SubbandKind::LowHigh => (0, 1),
            SubbandKind::HighHigh => (1, 1),
        }
    }

    /// Bounds of this band for a tile-component, given the number of
    /// decompositions `n_b` separating it from the full tile-component.
    pub(crate) fn bounds(&self, tile_component: &Rect, n_b: u32) -> Rect {
        let (xo, yo) = self.offsets();
        let scale = 1i64 << n_b.min(62);
        let half = if n_b == 0 { 0 } else { scale / 2 };
        let edge = |v: u32, o: i64| -> u32 { ceil_div_i64(v as i64 - half * o, scale).max(0) as u32 };
        Rect::new(
            edge(tile_component.x0, xo),
            edge(tile_component.y0, yo),
            edge(tile_component.x1, xo),
            edge(tile_component.y1, yo),
        )
    }
}

/// A subband of one resolution level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subband {
    pub kind: SubbandKind,
    /// Extent on the subband's own sample grid
    pub bounds: Rect,
}
