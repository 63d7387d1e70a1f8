//! JSON description of a codestream's main and tile headers.
//!
//! A layout carries the SIZ, COD/COC and QCD/QCC information the delivery
//! core needs, so a codestream model can be opened without parsing the
//! codestream itself:
//!
//! ```json
//! {
//!   "width": 192, "height": 48,
//!   "tile_width": 96, "tile_height": 48,
//!   "components": [{ "precision": 8 }],
//!   "coding": { "decomposition_levels": 2, "layers": 4 },
//!   "layer_slopes": [50000, 42000, 30000, 0]
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::GeometryError;
use crate::geometry::{Point, Rect, Size};

use super::model::{Codestream, ImageHeader};
use super::params::{CodingParameters, ComponentInfo, QuantizationParameters};
use super::tile::TileOverrides;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodestreamLayout {
    /// Xsiz
    pub width: u32,

    /// Ysiz
    pub height: u32,

    /// XOsiz
    #[serde(default)]
    pub x_offset: u32,

    /// YOsiz
    #[serde(default)]
    pub y_offset: u32,

    /// XTsiz; a single tile spanning the image when absent
    #[serde(default)]
    pub tile_width: Option<u32>,

    /// YTsiz; a single tile spanning the image when absent
    #[serde(default)]
    pub tile_height: Option<u32>,

    #[serde(default)]
    pub tile_x_offset: u32,

    #[serde(default)]
    pub tile_y_offset: u32,

    #[serde(default = "default_components")]
    pub components: Vec<ComponentInfo>,

    #[serde(default)]
    pub coding: CodingParameters,

    #[serde(default)]
    pub quantization: QuantizationParameters,

    /// Rate-distortion slope signalled for each quality layer
    #[serde(default)]
    pub layer_slopes: Option<Vec<u16>>,

    /// Tile-specific parameter overrides keyed by tile index
    #[serde(default)]
    pub tiles: BTreeMap<u32, TileOverrides>,
}

fn default_components() -> Vec<ComponentInfo> {
    vec![ComponentInfo::default()]
}

impl CodestreamLayout {
    /// A single-tile, single-component layout with default parameters.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            x_offset: 0,
            y_offset: 0,
            tile_width: None,
            tile_height: None,
            tile_x_offset: 0,
            tile_y_offset: 0,
            components: default_components(),
            coding: CodingParameters::default(),
            quantization: QuantizationParameters::default(),
            layer_slopes: None,
            tiles: BTreeMap::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn header(&self) -> ImageHeader {
        let tile_width = self.tile_width.unwrap_or(self.width.saturating_sub(self.tile_x_offset));
        let tile_height = self
            .tile_height
            .unwrap_or(self.height.saturating_sub(self.tile_y_offset));
        ImageHeader {
            image: Rect::new(self.x_offset, self.y_offset, self.width, self.height),
            tile_origin: Point::new(self.tile_x_offset, self.tile_y_offset),
            tile_size: Size::new(tile_width, tile_height),
            components: self.components.clone(),
        }
    }
}

impl Codestream {
    /// Build a fully populated codestream model from a layout.
    pub fn from_layout(layout: &CodestreamLayout) -> Result<Self, GeometryError> {
        let mut codestream = Codestream::new(
            layout.header(),
            layout.coding.clone(),
            layout.quantization.clone(),
        )?;
        codestream.set_layer_slopes(layout.layer_slopes.clone());
        for (&t, overrides) in &layout.tiles {
            codestream.set_tile_overrides(t, overrides.clone())?;
        }
        codestream.create_all_tiles();
        Ok(codestream)
    }
}
