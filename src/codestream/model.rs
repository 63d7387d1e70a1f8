use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::GeometryError;
use crate::geometry::{Point, Rect, Size};

use super::component::{Component, ComponentLayout};
use super::id::InClassId;
use super::params::{
    CodingParameters, ComponentInfo, PrecinctExponents, QuantizationParameters, WaveletFilter,
};
use super::precinct::Precinct;
use super::subband::SubbandKind;
use super::tile::{ComponentOverrides, Tile, TileOverrides};

/// Largest decomposition level count a COD/COC marker can carry.
pub const MAX_DECOMPOSITION_LEVELS: u8 = 32;

/// Image and tile grid (SIZ marker).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageHeader {
    /// Image area on the reference grid: `[XOsiz, Xsiz) x [YOsiz, Ysiz)`
    pub image: Rect,

    /// Tile grid origin (XTOsiz, YTOsiz)
    pub tile_origin: Point,

    /// Nominal tile size (XTsiz, YTsiz)
    pub tile_size: Size,

    pub components: Vec<ComponentInfo>,
}

impl ImageHeader {
    fn validate(&self) -> Result<(), GeometryError> {
        if self.image.is_empty() {
            return Err(GeometryError::InvalidGrid(format!(
                "image area {:?} is empty",
                self.image
            )));
        }
        if self.tile_size.is_empty() {
            return Err(GeometryError::InvalidGrid(format!(
                "tile size {}x{} has a zero dimension",
                self.tile_size.width, self.tile_size.height
            )));
        }
        if self.tile_origin.x > self.image.x0 || self.tile_origin.y > self.image.y0 {
            return Err(GeometryError::InvalidGrid(
                "tile origin lies past the image origin".to_string(),
            ));
        }
        if self.tile_origin.x as u64 + self.tile_size.width as u64 <= self.image.x0 as u64
            || self.tile_origin.y as u64 + self.tile_size.height as u64 <= self.image.y0 as u64
        {
            return Err(GeometryError::InvalidGrid(
                "first tile does not overlap the image area".to_string(),
            ));
        }
        if self.components.is_empty() {
            return Err(GeometryError::InvalidComponent(
                "codestream has no components".to_string(),
            ));
        }
        if self.components.len() > u16::MAX as usize {
            return Err(GeometryError::InvalidComponent(format!(
                "{} components exceed the 16-bit limit",
                self.components.len()
            )));
        }
        if let Some(c) = self.components.iter().position(|c| c.dx == 0 || c.dy == 0) {
            return Err(GeometryError::InvalidComponent(format!(
                "component {c} has zero sub-sampling"
            )));
        }
        Ok(())
    }

    pub fn tiles_wide(&self) -> u32 {
        (self.image.x1 - self.tile_origin.x).div_ceil(self.tile_size.width)
    }

    pub fn tiles_high(&self) -> u32 {
        (self.image.y1 - self.tile_origin.y).div_ceil(self.tile_size.height)
    }

    /// Reference-grid extent of tile `t`, clipped to the image area (B-7).
    pub fn tile_bounds(&self, t: u32) -> Rect {
        let wide = self.tiles_wide().max(1);
        let p = (t % wide) as u64;
        let q = (t / wide) as u64;
        let tw = self.tile_size.width as u64;
        let th = self.tile_size.height as u64;
        let ox = self.tile_origin.x as u64;
        let oy = self.tile_origin.y as u64;
        let clip = |v: u64, lo: u32, hi: u32| -> u32 { v.clamp(lo as u64, hi as u64) as u32 };
        Rect::new(
            clip(ox + p * tw, self.image.x0, self.image.x1),
            clip(oy + q * th, self.image.y0, self.image.y1),
            clip(ox + (p + 1) * tw, self.image.x0, self.image.x1),
            clip(oy + (q + 1) * th, self.image.y0, self.image.y1),
        )
    }
}

/// The codestream model: the root of the tile tree.
///
/// ```text
/// Codestream
///   └── Tile (by index)
///         └── Component
///               └── ResolutionLevel (0..=N_L)
///                     └── Precinct (raster order)
/// ```
///
/// The tile count is derived from the image header at construction and
/// never changes afterwards, since it is folded into every [`InClassId`].
///
/// Parameters resolve through three tiers: a component override, then a
/// tile override, then the codestream default. Tiles are built from the
/// resolved parameters and rebuilt when an override changes, so lookups on
/// the finished tree need no further resolution.
#[derive(Debug, Clone)]
pub struct Codestream {
    header: ImageHeader,
    num_tiles: u32,
    coding: CodingParameters,
    quantization: QuantizationParameters,
    layer_slopes: Option<Vec<u16>>,
    overrides: BTreeMap<u32, TileOverrides>,
    tiles: BTreeMap<u32, Tile>,
}

impl Codestream {
    pub fn new(
        header: ImageHeader,
        coding: CodingParameters,
        quantization: QuantizationParameters,
    ) -> Result<Self, GeometryError> {
        header.validate()?;
        check_coding(&coding)?;
        let num_tiles = header
            .tiles_wide()
            .checked_mul(header.tiles_high())
            .ok_or_else(|| GeometryError::InvalidGrid("tile count overflows".to_string()))?;

        Ok(Self {
            header,
            num_tiles,
            coding,
            quantization,
            layer_slopes: None,
            overrides: BTreeMap::new(),
            tiles: BTreeMap::new(),
        })
    }

    // =========================================================================
    // Image properties
    // =========================================================================

    pub fn header(&self) -> &ImageHeader {
        &self.header
    }

    /// Image area on the reference grid.
    pub fn image(&self) -> Rect {
        self.header.image
    }

    pub fn num_tiles(&self) -> u32 {
        self.num_tiles
    }

    pub fn tiles_wide(&self) -> u32 {
        self.header.tiles_wide()
    }

    pub fn tiles_high(&self) -> u32 {
        self.header.tiles_high()
    }

    pub fn num_components(&self) -> u16 {
        self.header.components.len() as u16
    }

    pub fn component_info(&self, c: u16) -> Option<ComponentInfo> {
        self.header.components.get(c as usize).copied()
    }

    /// Embedded rate-distortion slope per quality layer, when the
    /// codestream carries them.
    pub fn layer_slopes(&self) -> Option<&[u16]> {
        self.layer_slopes.as_deref()
    }

    pub fn set_layer_slopes(&mut self, slopes: Option<Vec<u16>>) {
        self.layer_slopes = slopes;
    }

    // =========================================================================
    // Parameter resolution (component -> tile -> codestream)
    // =========================================================================

    pub fn default_coding(&self) -> &CodingParameters {
        &self.coding
    }

    pub fn default_quantization(&self) -> &QuantizationParameters {
        &self.quantization
    }

    fn component_overrides(&self, t: u32, c: u16) -> Option<&ComponentOverrides> {
        self.overrides.get(&t)?.component(c)
    }

    /// Coding parameters in effect for a tile-component.
    pub fn coding(&self, t: u32, c: u16) -> &CodingParameters {
        if let Some(coding) = self.component_overrides(t, c).and_then(|o| o.coding.as_ref()) {
            return coding;
        }
        if let Some(coding) = self.overrides.get(&t).and_then(|o| o.coding.as_ref()) {
            return coding;
        }
        &self.coding
    }

    /// Quantization parameters in effect for a tile-component.
    pub fn quantization(&self, t: u32, c: u16) -> &QuantizationParameters {
        if let Some(q) = self.component_overrides(t, c).and_then(|o| o.quantization.as_ref()) {
            return q;
        }
        if let Some(q) = self.overrides.get(&t).and_then(|o| o.quantization.as_ref()) {
            return q;
        }
        &self.quantization
    }

    pub fn decomposition_levels(&self, t: u32, c: u16) -> u8 {
        self.coding(t, c).decomposition_levels
    }

    pub fn wavelet_filter(&self, t: u32, c: u16) -> WaveletFilter {
        self.coding(t, c).filter
    }

    pub fn precinct_exponents(&self, t: u32, c: u16, r: u8) -> PrecinctExponents {
        self.coding(t, c).precinct_exponents(r)
    }

    pub fn code_block_exponents(&self, t: u32, c: u16) -> (u8, u8) {
        let coding = self.coding(t, c);
        (coding.code_block_width_exp, coding.code_block_height_exp)
    }

    /// Quality layers of a tile. Layer count is never set per component.
    pub fn layers(&self, t: u32) -> u16 {
        self.overrides
            .get(&t)
            .and_then(|o| o.coding.as_ref())
            .map(|coding| coding.layers)
            .unwrap_or(self.coding.layers)
    }

    /// Largest layer count over all tiles.
    pub fn max_layers(&self) -> u16 {
        self.overrides
            .values()
            .filter_map(|o| o.coding.as_ref().map(|coding| coding.layers))
            .fold(self.coding.layers, u16::max)
    }

    /// Magnitude bit-planes `M_b` of a subband.
    pub fn magnitude_bits(&self, t: u32, c: u16, r: u8, band: SubbandKind) -> u8 {
        let precision = self.component_info(c).map(|info| info.precision).unwrap_or(8);
        let levels = self.decomposition_levels(t, c);
        self.quantization(t, c).magnitude_bits(band, r, levels, precision)
    }

    /// Largest decomposition level count any tile-component uses.
    pub fn max_decomposition_levels(&self) -> u8 {
        self.overridden_levels()
            .fold(self.coding.decomposition_levels, u8::max)
    }

    /// Smallest decomposition level count any tile-component uses. Frame
    /// sizes for discard levels up to this value exist everywhere.
    pub fn min_decomposition_levels(&self) -> u8 {
        self.overridden_levels()
            .fold(self.coding.decomposition_levels, u8::min)
    }

    fn overridden_levels(&self) -> impl Iterator<Item = u8> + '_ {
        self.overrides.keys().flat_map(move |&t| {
            (0..self.num_components()).map(move |c| self.decomposition_levels(t, c))
        })
    }

    /// Replace the overrides of tile `t`. An existing tile is rebuilt.
    pub fn set_tile_overrides(
        &mut self,
        t: u32,
        overrides: TileOverrides,
    ) -> Result<(), GeometryError> {
        self.check_tile(t)?;
        for coding in overrides
            .coding
            .iter()
            .chain(overrides.components.values().filter_map(|o| o.coding.as_ref()))
        {
            check_coding(coding)?;
        }
        if overrides.is_empty() {
            self.overrides.remove(&t);
        } else {
            self.overrides.insert(t, overrides);
        }
        if self.tiles.contains_key(&t) {
            let tile = self.build_tile(t);
            self.tiles.insert(t, tile);
        }
        Ok(())
    }

    /// Replace the overrides of one tile-component. An existing tile is
    /// rebuilt.
    pub fn set_component_overrides(
        &mut self,
        t: u32,
        c: u16,
        overrides: ComponentOverrides,
    ) -> Result<(), GeometryError> {
        if c >= self.num_components() {
            return Err(GeometryError::InvalidComponent(format!(
                "component {c} out of range: codestream has {}",
                self.num_components()
            )));
        }
        let mut tile_overrides = self.overrides.get(&t).cloned().unwrap_or_default();
        tile_overrides.components.insert(c, overrides);
        self.set_tile_overrides(t, tile_overrides)
    }

    pub fn tile_overrides(&self, t: u32) -> Option<&TileOverrides> {
        self.overrides.get(&t)
    }

    // =========================================================================
    // Tree access
    // =========================================================================

    /// Build tile `t` if it does not exist yet and return it. Calling this
    /// again for the same tile returns the existing one.
    pub fn create_tile(&mut self, t: u32) -> Result<&Tile, GeometryError> {
        self.check_tile(t)?;
        if !self.tiles.contains_key(&t) {
            let tile = self.build_tile(t);
            self.tiles.insert(t, tile);
        }
        self.tiles
            .get(&t)
            .ok_or(GeometryError::TileOutOfRange {
                tile: t,
                num_tiles: self.num_tiles,
            })
    }

    pub fn create_all_tiles(&mut self) {
        for t in 0..self.num_tiles {
            if !self.tiles.contains_key(&t) {
                let tile = self.build_tile(t);
                self.tiles.insert(t, tile);
            }
        }
    }

    /// Tile `t`, if it has been built.
    ///
    /// Tiles are built lazily; call [`Codestream::create_all_tiles`] first
    /// when every tile must be present.
    pub fn tile(&self, t: u32) -> Option<&Tile> {
        self.tiles.get(&t)
    }

    /// Built tiles, in no particular order.
    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.values()
    }

    /// Drop a tile and everything below it.
    ///
    /// Returns the removed tile, or `None` if it was never built. The tile
    /// can be rebuilt later with [`Codestream::create_tile`].
    pub fn remove_tile(&mut self, t: u32) -> Option<Tile> {
        self.tiles.remove(&t)
    }

    /// Tile-component `(t, c)`, if its tile has been built.
    pub fn component(&self, t: u32, c: u16) -> Option<&Component> {
        self.tile(t)?.component(c)
    }

    /// Indices of the tiles whose area meets a reference-grid region, in
    /// raster order.
    pub fn tiles_intersecting(&self, region: &Rect) -> Vec<u32> {
        let region = region.intersect(&self.header.image);
        if region.is_empty() {
            return Vec::new();
        }
        let origin = self.header.tile_origin;
        let size = self.header.tile_size;
        let wide = self.tiles_wide();
        let high = self.tiles_high();
        let p0 = (region.x0 - origin.x) / size.width;
        let p1 = (region.x1 - origin.x).div_ceil(size.width).min(wide);
        let q0 = (region.y0 - origin.y) / size.height;
        let q1 = (region.y1 - origin.y).div_ceil(size.height).min(high);

        (q0..q1)
            .flat_map(|q| (p0..p1).map(move |p| q * wide + p))
            .collect()
    }

    // =========================================================================
    // Precinct addressing
    // =========================================================================

    /// Identifier of precinct `p` of resolution level `r`, if it exists.
    pub fn precinct_id(&self, t: u32, c: u16, r: u8, p: u32) -> Option<InClassId> {
        self.component(t, c)?
            .resolution_level(r)?
            .precinct(p)
            .map(|precinct| precinct.id())
    }

    /// Decompose an identifier into `(tile, component, sequence)`.
    ///
    /// Identifiers interleave tiles fastest, then components, so this is
    /// pure arithmetic and needs no built tiles. `sequence` numbers the
    /// precinct within its tile-component across all resolution levels;
    /// [`Component::find_resolution`] splits it further.
    pub fn find_tcp(&self, id: InClassId) -> (u32, u16, u64) {
        id.decompose(self.num_tiles, self.num_components())
    }

    /// Decompose an identifier into `(tile, component, resolution, index)`.
    /// Returns `None` if the precinct does not exist in the model.
    pub fn find_tcrp(&self, id: InClassId) -> Option<(u32, u16, u8, u32)> {
        let (t, c, sequence) = self.find_tcp(id);
        let (r, p) = self.component(t, c)?.find_resolution(sequence)?;
        Some((t, c, r, p))
    }

    /// The precinct an identifier names, if its tile has been built.
    pub fn precinct(&self, id: InClassId) -> Option<&Precinct> {
        let (t, c, sequence) = self.find_tcp(id);
        self.component(t, c)?.precinct(sequence)
    }

    fn check_tile(&self, t: u32) -> Result<(), GeometryError> {
        if t >= self.num_tiles {
            return Err(GeometryError::TileOutOfRange {
                tile: t,
                num_tiles: self.num_tiles,
            });
        }
        Ok(())
    }

    fn build_tile(&self, t: u32) -> Tile {
        let bounds = self.header.tile_bounds(t);
        let components = self
            .header
            .components
            .iter()
            .enumerate()
            .map(|(c, info)| {
                let c = c as u16;
                Component::new(ComponentLayout {
                    tile: t,
                    index: c,
                    num_tiles: self.num_tiles,
                    num_components: self.num_components(),
                    info: *info,
                    tile_bounds: bounds,
                    coding: self.coding(t, c),
                })
            })
            .collect();
        Tile::new(t, bounds, components)
    }
}

fn check_coding(coding: &CodingParameters) -> Result<(), GeometryError> {
    if coding.decomposition_levels > MAX_DECOMPOSITION_LEVELS {
        return Err(GeometryError::InvalidGrid(format!(
            "{} decomposition levels exceed the limit of {}",
            coding.decomposition_levels, MAX_DECOMPOSITION_LEVELS
        )));
    }
    if coding.layers == 0 {
        return Err(GeometryError::InvalidGrid(
            "codestream must have at least one quality layer".to_string(),
        ));
    }
    Ok(())
}
