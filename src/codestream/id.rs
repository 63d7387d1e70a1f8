//! In-class identifiers for precinct data-bins.
//!
//! ISO/IEC 15444-9 A.3.2.1 numbers every precinct of a codestream with a
//! single integer:
//!
//! ```text
//! id = t + (c + s * num_components) * num_tiles
//! ```
//!
//! where `t` is the tile index, `c` the component index and `s` the
//! sequence number of the precinct within its tile-component, counting
//! across resolution levels from the lowest one upwards. For a fixed
//! `(num_tiles, num_components)` the mapping is a bijection, which is why
//! the tile count of a codestream can never change once identifiers exist.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GeometryError;

/// Identifier of one precinct data-bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InClassId(u64);

impl InClassId {
    /// Wrap a raw identifier without checking it against any codestream.
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    /// Compose an identifier from its tile, component and sequence number.
    pub fn compose(
        tile: u32,
        component: u16,
        sequence: u64,
        num_tiles: u32,
        num_components: u16,
    ) -> Self {
        let per_tile = component as u64 + sequence * num_components as u64;
        Self(tile as u64 + per_tile * num_tiles as u64)
    }

    /// Split an identifier into `(tile, component, sequence)`.
    pub fn decompose(self, num_tiles: u32, num_components: u16) -> (u32, u16, u64) {
        let num_tiles = num_tiles.max(1) as u64;
        let num_components = num_components.max(1) as u64;
        let tile = (self.0 % num_tiles) as u32;
        let rest = self.0 / num_tiles;
        let component = (rest % num_components) as u16;
        let sequence = rest / num_components;
        (tile, component, sequence)
    }
}

impl TryFrom<i64> for InClassId {
    type Error = GeometryError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u64::try_from(value)
            .map(InClassId)
            .map_err(|_| GeometryError::NegativeIndex {
                what: "in-class identifier",
                value,
            })
    }
}

impl fmt::Display for InClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}
