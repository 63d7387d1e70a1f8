use thiserror::Error;

use crate::codestream::{InClassId, SubbandKind};

/// Errors raised by the codestream model when a node or parameter is
/// addressed in a way the geometry does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    /// Identifiers and indices are unsigned; a negative value is a caller bug
    #[error("Negative {what}: {value}")]
    NegativeIndex { what: &'static str, value: i64 },

    /// The subband does not exist at this resolution level
    #[error("Subband {band:?} does not exist at resolution level {resolution}")]
    MissingSubband { band: SubbandKind, resolution: u8 },

    /// Tile index outside of the tile grid
    #[error("Tile {tile} out of range: codestream has {num_tiles} tiles")]
    TileOutOfRange { tile: u32, num_tiles: u32 },

    /// Tile or image grid with a zero extent
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    /// Component definition is unusable (no components, zero sub-sampling)
    #[error("Invalid component: {0}")]
    InvalidComponent(String),

    /// The codestream's data does not fit a 64-bit file
    #[error("Codestream too large to address: tile {tile}, component {component}, resolution {resolution}")]
    FileTooLarge { tile: u32, component: u16, resolution: u8 },
}

/// Errors in a client view window. These reject the whole request before
/// any scheduling work is done.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    /// Frame size has a zero dimension
    #[error("Frame size must be positive, got {width}x{height}")]
    EmptyFrame { width: u32, height: u32 },

    /// Region size has a zero dimension
    #[error("Region size must be positive, got {width}x{height}")]
    EmptyRegion { width: u32, height: u32 },

    /// Region offset lies outside the requested frame
    #[error("Region offset ({x}, {y}) lies outside the {width}x{height} frame")]
    OffsetOutsideFrame {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    /// Component range is reversed or past the last component
    #[error("Invalid component range {first}..={last}: codestream has {available} components")]
    InvalidComponentRange {
        first: u16,
        last: u16,
        available: u16,
    },

    /// Layer limit of zero
    #[error("Requested layer count must be positive")]
    ZeroLayers,
}

/// Errors that abort a scheduling pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// The request window was rejected
    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    /// A geometry lookup failed
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    /// A relevant precinct does not resolve inside the codestream model
    #[error("Unknown precinct: {0}")]
    UnknownPrecinct(InClassId),
}

/// Request-level errors surfaced by the delivery service.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// No codestream is registered under this target name
    #[error("Codestream not found: {target}")]
    CodestreamNotFound { target: String },

    /// The codestream layout could not be read or parsed
    #[error("Invalid layout for {target}: {message}")]
    InvalidLayout { target: String, message: String },

    /// The codestream layout describes an impossible geometry
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    /// Scheduling failed
    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),
}

impl From<WindowError> for ServiceError {
    fn from(err: WindowError) -> Self {
        ServiceError::Schedule(ScheduleError::Window(err))
    }
}
