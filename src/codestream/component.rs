use crate::geometry::{ceil_div_pow2, floor_div_pow2, Rect};

use super::level::{LevelLayout, ResolutionLevel};
use super::params::{CodingParameters, ComponentInfo, WaveletFilter};
use super::precinct::Precinct;

/// One component of a tile.
///
/// The decomposition level count and wavelet filter are resolved once, from
/// the component, tile and codestream parameters in that order, when the
/// component is built. Changing an override rebuilds the component.
#[derive(Debug, Clone)]
pub struct Component {
    index: u16,
    tile: u32,
    info: ComponentInfo,
    bounds: Rect,
    decomposition_levels: u8,
    filter: WaveletFilter,
    resolutions: Vec<ResolutionLevel>,
}

pub(crate) struct ComponentLayout<'a> {
    pub tile: u32,
    pub index: u16,
    pub num_tiles: u32,
    pub num_components: u16,
    pub info: ComponentInfo,
    pub tile_bounds: Rect,
    pub coding: &'a CodingParameters,
}

impl Component {
    pub(crate) fn new(layout: ComponentLayout<'_>) -> Self {
        let info = layout.info;
        let dx = info.dx.max(1) as u32;
        let dy = info.dy.max(1) as u32;
        let tb = &layout.tile_bounds;
        let bounds = Rect::new(
            tb.x0.div_ceil(dx),
            tb.y0.div_ceil(dy),
            tb.x1.div_ceil(dx),
            tb.y1.div_ceil(dy),
        );

        let coding = layout.coding;
        let levels = coding.decomposition_levels;
        let mut resolutions = Vec::with_capacity(levels as usize + 1);
        let mut first_precinct = 0u64;
        for r in 0..=levels {
            let level = ResolutionLevel::new(LevelLayout {
                tile: layout.tile,
                component: layout.index,
                num_tiles: layout.num_tiles,
                num_components: layout.num_components,
                resolution: r,
                decomposition_levels: levels,
                tile_component: bounds,
                precinct_exponents: coding.precinct_exponents(r),
                block_exponents: (coding.code_block_width_exp, coding.code_block_height_exp),
                first_precinct,
            });
            first_precinct += level.num_precincts() as u64;
            resolutions.push(level);
        }

        Self {
            index: layout.index,
            tile: layout.tile,
            info,
            bounds,
            decomposition_levels: levels,
            filter: coding.filter,
            resolutions,
        }
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn tile(&self) -> u32 {
        self.tile
    }

    pub fn info(&self) -> ComponentInfo {
        self.info
    }

    /// Tile-component extent on the component's sample grid.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn decomposition_levels(&self) -> u8 {
        self.decomposition_levels
    }

    pub fn filter(&self) -> WaveletFilter {
        self.filter
    }

    pub fn resolution_levels(&self) -> &[ResolutionLevel] {
        &self.resolutions
    }

    /// Resolution level `r`, 0 being the lowest.
    pub fn resolution_level(&self, r: u8) -> Option<&ResolutionLevel> {
        self.resolutions.get(r as usize)
    }

    /// Total precincts over all resolution levels.
    pub fn num_precincts(&self) -> u64 {
        self.resolutions
            .last()
            .map(|level| level.first_precinct() + level.num_precincts() as u64)
            .unwrap_or(0)
    }

    /// Split a tile-component sequence number into `(resolution, index)`.
    ///
    /// # Arguments
    ///
    /// * `sequence` - Precinct number within this tile-component, counting
    ///   level 0 first
    ///
    /// # Returns
    ///
    /// The resolution level and the raster index inside it, or `None` when
    /// `sequence` is past the last precinct.
    pub fn find_resolution(&self, sequence: u64) -> Option<(u8, u32)> {
        // Levels with no precincts share their first index with the next
        // level, so search for the last level starting at or before it
        let pos = self
            .resolutions
            .partition_point(|level| level.first_precinct() <= sequence);
        let level = self.resolutions[..pos]
            .iter()
            .rev()
            .find(|level| level.num_precincts() > 0)?;
        let index = sequence - level.first_precinct();
        (index < level.num_precincts() as u64).then_some((level.resolution(), index as u32))
    }

    /// Precinct by tile-component sequence number.
    pub fn precinct(&self, sequence: u64) -> Option<&Precinct> {
        let (r, index) = self.find_resolution(sequence)?;
        self.resolution_level(r)?.precinct(index)
    }

    /// Highest resolution level needed once `discard_levels` are dropped.
    /// A component with fewer levels than the discard count only offers its
    /// level 0.
    pub fn top_resolution(&self, discard_levels: u8) -> u8 {
        self.decomposition_levels.saturating_sub(discard_levels)
    }

    /// Project a reference-grid region onto resolution level `r`, clipped to
    /// the level.
    pub fn region_at_resolution(&self, region: &Rect, r: u8) -> Rect {
        let Some(level) = self.resolution_level(r) else {
            return Rect::default();
        };
        let dx = self.info.dx.max(1) as u32;
        let dy = self.info.dy.max(1) as u32;
        let n = (self.decomposition_levels - r) as u32;
        Rect::new(
            floor_div_pow2(region.x0 / dx, n),
            floor_div_pow2(region.y0 / dy, n),
            ceil_div_pow2(region.x1.div_ceil(dx), n),
            ceil_div_pow2(region.y1.div_ceil(dy), n),
        )
        .intersect(&level.bounds())
    }

    /// Back-project a region on level `from` down to level `to`.
    ///
    /// Each step grows the region by the synthesis filter's boundary
    /// extension on the finer level, halves it and clips it to the coarser
    /// level's bounds.
    pub fn support_region(&self, region: &Rect, from: u8, to: u8) -> Rect {
        let Some(top) = self.resolution_level(from) else {
            return Rect::default();
        };
        let extension = self.filter.support_extension();
        let mut current = region.intersect(&top.bounds());
        let mut r = from;
        while r > to {
            let finer = &self.resolutions[r as usize];
            let coarser = &self.resolutions[r as usize - 1];
            let grown = current.expand_within(extension, &finer.bounds());
            current = Rect::new(
                floor_div_pow2(grown.x0, 1),
                floor_div_pow2(grown.y0, 1),
                ceil_div_pow2(grown.x1, 1),
                ceil_div_pow2(grown.y1, 1),
            )
            .intersect(&coarser.bounds());
            r -= 1;
        }
        current
    }
}
