//! Window-of-interest resolution.
//!
//! Turning a view window into the precincts that must be delivered happens
//! in two steps:
//!
//! ```text
//! ViewWindow ──resolve_window──▶ ResolvedWindow ──relevant_precincts──▶ [RelevantPrecinct]
//!   frame size                    discard levels                         ordered by
//!   region                        served frame + region                  ProgressionOrder
//!   components                    reference-grid region
//! ```
//!
//! For each tile meeting the reference region and each requested
//! component, the region is projected onto the highest resolution level the
//! discard count leaves, then carried down level by level with the wavelet
//! filter's support. Every precinct whose cell meets the resulting region is
//! relevant. A component with fewer levels than the discard count only
//! contributes its level 0.

use serde::Serialize;
use tracing::{debug, trace};

use crate::codestream::{Codestream, InClassId};
use crate::error::WindowError;
use crate::geometry::{
    determine_discard_levels, frame_size, map_region_to_high_resolution_grid,
    map_region_to_suitable_resolution_grid, Rect,
};

use super::order::ProgressionOrder;
use super::view::{ComponentRange, ResolvedWindow, ViewWindow};

/// A precinct selected for one request, with the scheduling cursor that the
/// schedulers advance while building the response. Never outlives the
/// request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelevantPrecinct {
    pub id: InClassId,
    pub tile: u32,
    pub component: u16,
    pub resolution: u8,
    pub index: u32,

    /// Fraction of the precinct covered by the support region, in `(0, 1]`
    pub overlap: f64,

    /// Data-bin offset reached so far (cached bytes plus bytes queued)
    pub bytes_queued: u64,

    /// Layers completely queued or cached
    pub layers_queued: u16,

    /// Offset inside the packet currently being sent
    pub packet_offset: u64,

    /// Scheduler weight (window scaling factor for WSF)
    pub weight: f64,
}

impl RelevantPrecinct {
    fn new(id: InClassId, tile: u32, component: u16, resolution: u8, index: u32, overlap: f64) -> Self {
        Self {
            id,
            tile,
            component,
            resolution,
            index,
            overlap,
            bytes_queued: 0,
            layers_queued: 0,
            packet_offset: 0,
            weight: 1.0,
        }
    }
}

/// Relevant precincts of one tile-component, per resolution level, each
/// level in raster order.
struct ComponentSelection {
    levels: Vec<Vec<RelevantPrecinct>>,
}

struct TileSelection {
    components: Vec<ComponentSelection>,
}

impl TileSelection {
    fn max_levels(&self) -> usize {
        self.components.iter().map(|c| c.levels.len()).max().unwrap_or(0)
    }

    fn max_precincts(&self) -> usize {
        self.components
            .iter()
            .flat_map(|c| c.levels.iter().map(Vec::len))
            .max()
            .unwrap_or(0)
    }
}

/// Maps view windows onto a codestream model.
pub struct Resolver<'a> {
    codestream: &'a Codestream,
}

impl<'a> Resolver<'a> {
    /// Create a resolver over a fully built codestream model.
    pub fn new(codestream: &'a Codestream) -> Self {
        Self { codestream }
    }

    /// Validate a view window and snap it onto an available frame.
    pub fn resolve_window(&self, window: &ViewWindow) -> Result<ResolvedWindow, WindowError> {
        let cs = self.codestream;
        window.validate(cs.num_components())?;

        let image = cs.image();
        let discard_levels = determine_discard_levels(
            &image,
            window.frame,
            window.round,
            cs.max_decomposition_levels(),
        );
        let frame = frame_size(&image, discard_levels);
        let region = map_region_to_suitable_resolution_grid(&window.region_rect(), window.frame, frame);
        let reference_region = map_region_to_high_resolution_grid(&region, discard_levels, &image);

        let max_layers = cs.max_layers();
        let layers = window.layers.unwrap_or(max_layers).min(max_layers);
        let components = window
            .components
            .unwrap_or(ComponentRange::new(0, cs.num_components() - 1));

        debug!(
            discard_levels,
            frame_width = frame.width,
            frame_height = frame.height,
            region = ?region,
            layers,
            "Resolved view window"
        );

        Ok(ResolvedWindow {
            discard_levels,
            requested_frame: window.frame,
            frame,
            region,
            reference_region,
            components,
            layers,
            requested_layers: window.layers,
        })
    }

    /// Relevant precincts in the given progression order.
    ///
    /// A precinct is relevant when its cell meets the window region carried
    /// down to its level with the wavelet filter's support.
    ///
    /// # Arguments
    ///
    /// * `window` - A window returned by [`Resolver::resolve_window`]
    /// * `order` - Nesting of tiles, components, resolutions and positions
    ///
    /// # Returns
    ///
    /// Every relevant precinct once, each with the fraction of its cell
    /// that the support region covers.
    pub fn relevant_precincts(
        &self,
        window: &ResolvedWindow,
        order: ProgressionOrder,
    ) -> Vec<RelevantPrecinct> {
        let tiles = self.select(window);
        let mut out = Vec::new();

        for tile in tiles {
            match order {
                ProgressionOrder::Tcrp => {
                    for component in tile.components {
                        out.extend(component.levels.into_iter().flatten());
                    }
                }
                ProgressionOrder::Trcp => {
                    for r in 0..tile.max_levels() {
                        for component in &tile.components {
                            if let Some(level) = component.levels.get(r) {
                                out.extend(level.iter().cloned());
                            }
                        }
                    }
                }
                ProgressionOrder::Tcpr => {
                    for component in &tile.components {
                        for k in 0..tile.max_precincts() {
                            for level in &component.levels {
                                out.extend(level.get(k).cloned());
                            }
                        }
                    }
                }
                ProgressionOrder::Trpc => {
                    for r in 0..tile.max_levels() {
                        for k in 0..tile.max_precincts() {
                            for component in &tile.components {
                                out.extend(component.levels.get(r).and_then(|l| l.get(k)).cloned());
                            }
                        }
                    }
                }
                ProgressionOrder::Tpcr => {
                    for k in 0..tile.max_precincts() {
                        for component in &tile.components {
                            for level in &component.levels {
                                out.extend(level.get(k).cloned());
                            }
                        }
                    }
                }
            }
        }

        debug!(order = %order, precincts = out.len(), "Collected relevant precincts");
        out
    }

    /// Relevant precincts grouped by resolution level across every tile and
    /// component. Entry `r` lists level `r` precincts in tile, component,
    /// raster order.
    pub fn relevant_precincts_by_resolution(&self, window: &ResolvedWindow) -> Vec<Vec<RelevantPrecinct>> {
        let tiles = self.select(window);
        let depth = tiles.iter().map(TileSelection::max_levels).max().unwrap_or(0);
        let mut out: Vec<Vec<RelevantPrecinct>> = vec![Vec::new(); depth];

        for tile in tiles {
            for component in tile.components {
                for (r, level) in component.levels.into_iter().enumerate() {
                    out[r].extend(level);
                }
            }
        }
        out
    }

    fn select(&self, window: &ResolvedWindow) -> Vec<TileSelection> {
        let cs = self.codestream;
        let mut tiles = Vec::new();

        for t in cs.tiles_intersecting(&window.reference_region) {
            let Some(tile) = cs.tile(t) else {
                trace!(tile = t, "Tile not built, skipping");
                continue;
            };

            let mut components = Vec::new();
            for c in window.components.iter() {
                let Some(component) = tile.component(c) else {
                    continue;
                };
                let region = window.reference_region.intersect(&tile.bounds());
                let top = component.top_resolution(window.discard_levels);
                let top_region = component.region_at_resolution(&region, top);

                let mut levels = Vec::with_capacity(top as usize + 1);
                for r in 0..=top {
                    let Some(level) = component.resolution_level(r) else {
                        break;
                    };
                    let support = component.support_region(&top_region, top, r);
                    let selected: Vec<RelevantPrecinct> = level
                        .precincts_in(&support)
                        .map(|p| {
                            RelevantPrecinct::new(
                                p.id(),
                                t,
                                c,
                                r,
                                p.index(),
                                overlap(&p.bounds(), &support),
                            )
                        })
                        .collect();
                    trace!(tile = t, component = c, resolution = r, precincts = selected.len(), "Selected precincts");
                    levels.push(selected);
                }
                components.push(ComponentSelection { levels });
            }
            tiles.push(TileSelection { components });
        }
        tiles
    }
}

/// Covered fraction of a precinct. Precincts are only selected when they
/// meet the support region, so a zero-area cell still counts as covered.
fn overlap(cell: &Rect, support: &Rect) -> f64 {
    if cell.is_empty() {
        return 1.0;
    }
    cell.overlap_fraction(support)
}
