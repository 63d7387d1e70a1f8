//! Configuration for the `jpip-plan` binary.
//!
//! Options come from command-line arguments or from `JPIP_`-prefixed
//! environment variables, with defaults for everything but the layout.
//!
//! # Example
//!
//! ```ignore
//! use jpip_streamer::config::Config;
//!
//! let config = Config::parse();
//! println!("Scheduling {} with {}", config.layout.display(), config.scheduler);
//! ```
//!
//! # Environment Variables
//!
//! - `JPIP_LAYOUT` - JSON codestream layout to open (required)
//! - `JPIP_SCHEDULER` - Scheduler to run (default: wsf)
//! - `JPIP_ORDER` - Progression order of relevant precincts (default: trcp)
//! - `JPIP_FRAME` - Requested frame size as `WxH` (default: full image)
//! - `JPIP_OFFSET` - Region offset as `X,Y` (default: 0,0)
//! - `JPIP_REGION` - Region size as `WxH` (default: rest of the frame)
//! - `JPIP_COMPONENTS` - Component range as `A-B` or `A` (default: all)
//! - `JPIP_LAYERS` - Quality layer limit (default: all)
//! - `JPIP_ROUND` - Frame rounding: down, up or closest (default: down)
//! - `JPIP_MAX_BYTES` - Response size limit (default: unbounded)
//! - `JPIP_ROUNDS` - Successive responses for one session (default: 1)
//! - `JPIP_SLOPE_BUCKETS` - WSF threshold buckets (default: 25)
//! - `JPIP_PRIORITY_LAYERS` - Layers WSF sends before weighting (default: 1)
//! - `JPIP_CACHE_SESSIONS` - Client sessions tracked (default: 64)

use std::path::PathBuf;

use clap::Parser;

use crate::geometry::{Point, RoundDirection, Size};
use crate::schedule::{SubbandWeights, DEFAULT_PRIORITY_LAYERS, DEFAULT_SLOPE_BUCKETS};
use crate::service::{SchedulerKind, SchedulerSettings, DEFAULT_SESSION_CAPACITY};
use crate::window::{ComponentRange, ProgressionOrder, ViewWindow};

// =============================================================================
// Default Values
// =============================================================================

/// Default number of responses scheduled per run.
pub const DEFAULT_ROUNDS: u32 = 1;

/// Upper bound on threshold buckets; beyond this the slabs stop getting finer.
pub const MAX_SLOPE_BUCKETS: usize = 4096;

// =============================================================================
// Geometry Arguments
// =============================================================================

/// Parse `WxH`, e.g. `640x480`.
pub fn parse_size(s: &str) -> Result<Size, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got '{s}'"))?;
    let width = w
        .trim()
        .parse()
        .map_err(|_| format!("invalid width '{w}'"))?;
    let height = h
        .trim()
        .parse()
        .map_err(|_| format!("invalid height '{h}'"))?;
    Ok(Size::new(width, height))
}

/// Parse `X,Y`, e.g. `128,64`.
pub fn parse_point(s: &str) -> Result<Point, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{s}'"))?;
    let x = x.trim().parse().map_err(|_| format!("invalid x '{x}'"))?;
    let y = y.trim().parse().map_err(|_| format!("invalid y '{y}'"))?;
    Ok(Point::new(x, y))
}

/// Parse `A-B` or a single component index `A`.
pub fn parse_component_range(s: &str) -> Result<ComponentRange, String> {
    let parse = |v: &str| {
        v.trim()
            .parse::<u16>()
            .map_err(|_| format!("invalid component index '{v}'"))
    };
    match s.split_once('-') {
        Some((first, last)) => Ok(ComponentRange::new(parse(first)?, parse(last)?)),
        None => {
            let c = parse(s)?;
            Ok(ComponentRange::new(c, c))
        }
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// jpip-plan - schedule a JPIP response for one view window.
///
/// Opens a codestream layout, resolves the window onto it and prints the
/// chunks the chosen scheduler would send, as JSON.
#[derive(Parser, Debug, Clone)]
#[command(name = "jpip-plan")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Codestream
    // =========================================================================
    /// JSON codestream layout to open.
    #[arg(long, env = "JPIP_LAYOUT")]
    pub layout: PathBuf,

    // =========================================================================
    // Scheduling
    // =========================================================================
    /// Scheduler to run.
    #[arg(long, value_enum, default_value_t = SchedulerKind::Wsf, env = "JPIP_SCHEDULER")]
    pub scheduler: SchedulerKind,

    /// Progression order of relevant precincts.
    #[arg(long, value_enum, default_value_t = ProgressionOrder::Trcp, env = "JPIP_ORDER")]
    pub order: ProgressionOrder,

    /// Response size limit in bytes. Unbounded when not set.
    #[arg(long, env = "JPIP_MAX_BYTES")]
    pub max_bytes: Option<u64>,

    /// Successive responses to schedule for one client session.
    ///
    /// Each round sees what the previous rounds delivered, so with
    /// `--max-bytes` this shows a window filling in progressively.
    #[arg(long, default_value_t = DEFAULT_ROUNDS, env = "JPIP_ROUNDS")]
    pub rounds: u32,

    /// Threshold buckets for WSF penalties and slabs.
    #[arg(long, default_value_t = DEFAULT_SLOPE_BUCKETS, env = "JPIP_SLOPE_BUCKETS")]
    pub slope_buckets: usize,

    /// Layers WSF sends for every precinct before weighting.
    #[arg(long, default_value_t = DEFAULT_PRIORITY_LAYERS, env = "JPIP_PRIORITY_LAYERS")]
    pub priority_layers: u16,

    /// Client sessions whose cache state is tracked.
    #[arg(long, default_value_t = DEFAULT_SESSION_CAPACITY, env = "JPIP_CACHE_SESSIONS")]
    pub cache_sessions: usize,

    // =========================================================================
    // View Window
    // =========================================================================
    /// Requested frame size, `WxH`. The full image when not set.
    #[arg(long, value_parser = parse_size, env = "JPIP_FRAME")]
    pub frame: Option<Size>,

    /// Region offset on the requested frame, `X,Y`.
    #[arg(long, value_parser = parse_point, env = "JPIP_OFFSET")]
    pub offset: Option<Point>,

    /// Region size, `WxH`. The rest of the frame when not set.
    #[arg(long, value_parser = parse_size, env = "JPIP_REGION")]
    pub region: Option<Size>,

    /// Components to deliver, `A-B` or `A`.
    #[arg(long, value_parser = parse_component_range, env = "JPIP_COMPONENTS")]
    pub components: Option<ComponentRange>,

    /// Quality layer limit.
    #[arg(long, env = "JPIP_LAYERS")]
    pub layers: Option<u16>,

    /// How the requested frame snaps onto an available one.
    #[arg(long, value_enum, default_value_t = RoundDirection::Down, env = "JPIP_ROUND")]
    pub round: RoundDirection,

    // =========================================================================
    // Logging
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.layout.as_os_str().is_empty() {
            return Err("Layout path is required. Set --layout or JPIP_LAYOUT".to_string());
        }

        if self.slope_buckets == 0 || self.slope_buckets > MAX_SLOPE_BUCKETS {
            return Err(format!(
                "slope_buckets must be between 1 and {MAX_SLOPE_BUCKETS}"
            ));
        }
        if self.cache_sessions == 0 {
            return Err("cache_sessions must be greater than 0".to_string());
        }
        if self.rounds == 0 {
            return Err("rounds must be greater than 0".to_string());
        }

        if let Some(frame) = self.frame {
            if frame.is_empty() {
                return Err("frame must have a positive width and height".to_string());
            }
        }
        if let Some(region) = self.region {
            if region.is_empty() {
                return Err("region must have a positive width and height".to_string());
            }
        }
        if let Some(range) = self.components {
            if range.first > range.last {
                return Err(format!(
                    "component range {}-{} is reversed",
                    range.first, range.last
                ));
            }
        }
        if self.layers == Some(0) {
            return Err("layers must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Directory and target name the layout is opened under.
    pub fn layout_target(&self) -> (PathBuf, String) {
        let root = self
            .layout
            .parent()
            .map(PathBuf::from)
            .unwrap_or_default();
        let target = self
            .layout
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        (root, target)
    }

    /// The view window to request, given the full image size.
    pub fn view_window(&self, image: Size) -> ViewWindow {
        let mut window = ViewWindow::full_frame(self.frame.unwrap_or(image)).with_round(self.round);
        if let Some(offset) = self.offset {
            window.offset = offset;
        }
        window.region = self.region;
        window.components = self.components;
        window.layers = self.layers;
        window
    }

    /// Scheduler tuning taken from the command line.
    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            slope_buckets: self.slope_buckets,
            priority_layers: self.priority_layers,
            subband_weights: SubbandWeights::default(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
