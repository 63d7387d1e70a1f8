use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

use super::component::Component;
use super::params::{CodingParameters, QuantizationParameters};

/// Parameters a tile replaces for all of its components (tile-part COD/QCD).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileOverrides {
    pub coding: Option<CodingParameters>,
    pub quantization: Option<QuantizationParameters>,
    pub components: BTreeMap<u16, ComponentOverrides>,
}

/// Parameters a single tile-component replaces (COC/QCC).
///
/// The layer count is a tile-wide property, so the `layers` field of a
/// component-level coding override is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentOverrides {
    pub coding: Option<CodingParameters>,
    pub quantization: Option<QuantizationParameters>,
}

impl TileOverrides {
    pub fn component(&self, c: u16) -> Option<&ComponentOverrides> {
        self.components.get(&c)
    }

    pub fn is_empty(&self) -> bool {
        self.coding.is_none() && self.quantization.is_none() && self.components.is_empty()
    }
}

/// A tile and its components.
#[derive(Debug, Clone)]
pub struct Tile {
    index: u32,
    bounds: Rect,
    components: Vec<Component>,
}

impl Tile {
    pub(crate) fn new(index: u32, bounds: Rect, components: Vec<Component>) -> Self {
        Self {
            index,
            bounds,
            components,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Extent on the reference grid, clipped to the image area.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn component(&self, c: u16) -> Option<&Component> {
        self.components.get(c as usize)
    }

    pub fn num_precincts(&self) -> u64 {
        self.components.iter().map(|c| c.num_precincts()).sum()
    }
}
