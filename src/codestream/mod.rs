//! Codestream model.
//!
//! A read-mostly tree describing how a wavelet codestream partitions its
//! samples:
//!
//! ```text
//! ┌────────────┐   tiles    ┌──────┐ components ┌───────────┐
//! │ Codestream │──────────▶│ Tile │──────────▶│ Component │
//! └────────────┘            └──────┘            └───────────┘
//!                                                     │ levels 0..=N_L
//!                                                     ▼
//!                          ┌──────────┐ raster  ┌─────────────────┐
//!                          │ Precinct │◀────────│ ResolutionLevel │
//!                          └──────────┘         └─────────────────┘
//!                               │ per subband, lazily
//!                               ▼
//!                        ┌───────────────┐
//!                        │ CodeBlockGrid │
//!                        └───────────────┘
//! ```
//!
//! Every precinct is addressed by an [`InClassId`]. The model is built when
//! a codestream is opened and shared read-only between requests.

mod component;
mod id;
mod layout;
mod level;
mod model;
mod params;
mod precinct;
mod subband;
mod tile;

pub use component::Component;
pub use id::InClassId;
pub use layout::CodestreamLayout;
pub use level::ResolutionLevel;
pub use model::{Codestream, ImageHeader, MAX_DECOMPOSITION_LEVELS};
pub use params::{
    CodingParameters, ComponentInfo, PrecinctExponents, QuantizationParameters,
    QuantizationStyle, WaveletFilter, DEFAULT_CODE_BLOCK_EXPONENT, DEFAULT_DECOMPOSITION_LEVELS,
    DEFAULT_GUARD_BITS, MAX_PRECINCT_EXPONENT,
};
pub use precinct::{CodeBlockGrid, Precinct};
pub use subband::{Subband, SubbandKind};
pub use tile::{ComponentOverrides, Tile, TileOverrides};
