//! Coding-pass ordering by rate-distortion (CoRD).
//!
//! Code-blocks are grouped into buckets by tile, component, resolution and
//! band class. A bucket holds blocks that share a magnitude bit-plane count
//! `K`, so its passes can be numbered by *steps* on a common scale:
//!
//! ```text
//! step   0     1     2     3     4     5     6   ...
//! pass   CP    SPP   MRP   CP    SPP   MRP   CP
//! plane  K-1   K-2   K-2   K-2   K-3   K-3   K-3
//! ```
//!
//! Each step gets a synthetic distortion-slope estimate. Non-convex points
//! are lifted so every curve is non-increasing, then the curves are merged
//! greedily into one global [`BlockOrder`] list. Expanding that list over
//! the relevant precincts yields [`CodingPassId`] tokens; each precinct's
//! layers are the distinct levels its tokens fall on.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::{debug, trace};

use crate::codec::PacketHeaderCodec;
use crate::codestream::{Codestream, InClassId, Precinct, SubbandKind};
use crate::error::ScheduleError;
use crate::source::{BlockRef, CodestreamStore};
use crate::window::{RelevantPrecinct, Resolver};

use super::layers::{LayerPlan, SynthesizedPrecinct};
use super::response::{Pushed, ResponseBuilder, Schedule};
use super::{RequestContext, Scheduler};

// =============================================================================
// Buckets and Slopes
// =============================================================================

/// Subbands sharing a slope curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BandClass {
    LowLow,
    /// HL and LH
    Mixed,
    HighHigh,
}

impl BandClass {
    /// Class of a subband.
    pub fn of(band: SubbandKind) -> Self {
        match band {
            SubbandKind::LowLow => BandClass::LowLow,
            SubbandKind::HighLow | SubbandKind::LowHigh => BandClass::Mixed,
            SubbandKind::HighHigh => BandClass::HighHigh,
        }
    }

    /// Subbands in this class, in packet order.
    pub fn bands(&self) -> &'static [SubbandKind] {
        match self {
            BandClass::LowLow => &[SubbandKind::LowLow],
            BandClass::Mixed => &[SubbandKind::HighLow, SubbandKind::LowHigh],
            BandClass::HighHigh => &[SubbandKind::HighHigh],
        }
    }

    fn gain(&self) -> f64 {
        match self {
            BandClass::LowLow => 1.0,
            BandClass::Mixed => 0.5,
            BandClass::HighHigh => 0.25,
        }
    }
}

/// Code-blocks sharing a slope curve: one band class of one
/// tile-component resolution level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BucketKey {
    pub tile: u32,
    pub component: u16,
    pub resolution: u8,
    pub class: BandClass,
}

/// Coding pass type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PassKind {
    Cleanup,
    SignificancePropagation,
    MagnitudeRefinement,
}

/// Pass type and bit-plane of step `step` in a bucket with `magnitude_bits`
/// planes.
pub fn step_pass(step: u16, magnitude_bits: u8) -> (PassKind, u8) {
    let plane = (magnitude_bits as u16 - 1).saturating_sub((step + 2) / 3) as u8;
    let kind = match step {
        0 => PassKind::Cleanup,
        s => match (s - 1) % 3 {
            0 => PassKind::SignificancePropagation,
            1 => PassKind::MagnitudeRefinement,
            _ => PassKind::Cleanup,
        },
    };
    (kind, plane)
}

/// Distortion-slope estimate of every step of a bucket.
///
/// `G * 4^j * phi(kind, j)` with `G = 2^(levels - r)` scaled by the band
/// class. Cleanup weight rises with depth, significance propagation is
/// worth half as much again and magnitude refinement only a fraction, so a
/// refinement of an already coarse block never outranks a finer block's
/// first passes.
pub fn slope_curve(class: BandClass, resolution: u8, decomposition_levels: u8, magnitude_bits: u8) -> Vec<f64> {
    if magnitude_bits == 0 {
        return Vec::new();
    }
    let k = magnitude_bits as f64;
    let gain = 2f64.powi(decomposition_levels.saturating_sub(resolution) as i32) * class.gain();
    let steps = 3 * magnitude_bits as u16 - 2;

    (0..steps)
        .map(|step| {
            let (kind, plane) = step_pass(step, magnitude_bits);
            let depth = (k - 1.0 - plane as f64) / k;
            let cleanup = 0.5 + depth;
            let phi = match kind {
                PassKind::Cleanup => cleanup,
                PassKind::SignificancePropagation => 1.5 * cleanup,
                PassKind::MagnitudeRefinement => 0.25 * depth,
            };
            gain * 4f64.powi(plane as i32) * phi
        })
        .collect()
}

/// Lift every point that lies below a later one, leaving a non-increasing
/// curve.
pub fn remove_liars(curve: &mut [f64]) {
    for i in (1..curve.len()).rev() {
        if curve[i - 1] < curve[i] {
            curve[i - 1] = curve[i];
        }
    }
}

// =============================================================================
// Block Order
// =============================================================================

/// A run of steps of one bucket, sent together as global level `level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockOrder {
    pub bucket: BucketKey,
    pub first_step: u16,
    pub steps: u16,
    pub level: u32,
}

impl BlockOrder {
    pub fn step_range(&self) -> std::ops::Range<u16> {
        self.first_step..self.first_step + self.steps
    }
}

/// Merge bucket curves greedily: take the highest pending slope (lowest
/// bucket key on ties) together with the equal values following it.
pub fn merge_block_order(curves: &BTreeMap<BucketKey, Vec<f64>>) -> Vec<BlockOrder> {
    let mut heads: Vec<(BucketKey, &[f64], usize)> = curves
        .iter()
        .map(|(key, curve)| (*key, curve.as_slice(), 0usize))
        .collect();
    let mut order = Vec::new();

    loop {
        let mut best: Option<(usize, f64)> = None;
        for (i, (_, curve, head)) in heads.iter().enumerate() {
            if let Some(&value) = curve.get(*head) {
                if value > 0.0 && best.map_or(true, |(_, b)| value > b) {
                    best = Some((i, value));
                }
            }
        }
        let Some((i, value)) = best else {
            break;
        };

        let (bucket, curve, head) = &mut heads[i];
        let first_step = *head;
        while curve.get(*head).is_some_and(|&v| v >= value) {
            *head += 1;
        }
        order.push(BlockOrder {
            bucket: *bucket,
            first_step: first_step as u16,
            steps: (*head - first_step) as u16,
            level: order.len() as u32,
        });
    }
    order
}

/// One coding pass of one block, placed on a global level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CodingPassId {
    pub precinct: InClassId,
    pub band: SubbandKind,
    pub y_block: u32,
    pub x_block: u32,
    pub pass: u16,
    pub level: u32,
}

// =============================================================================
// Scheduler
// =============================================================================

/// Bucket magnitude bit-plane count: the largest over the class's bands.
fn bucket_magnitude(codestream: &Codestream, key: &BucketKey) -> u8 {
    key.class
        .bands()
        .iter()
        .map(|&band| codestream.magnitude_bits(key.tile, key.component, key.resolution, band))
        .max()
        .unwrap_or(0)
}

/// Plan built for one request.
#[derive(Debug, Clone)]
pub struct CordPlan {
    /// Magnitude bit-plane count of every bucket
    pub buckets: BTreeMap<BucketKey, u8>,

    /// Magnitude bit-plane count of every band, keyed by its bucket
    pub band_magnitudes: HashMap<(BucketKey, SubbandKind), u8>,

    pub order: Vec<BlockOrder>,
}

impl CordPlan {
    /// Build buckets and the global order for the given precincts.
    pub fn build(codestream: &Codestream, precincts: &[RelevantPrecinct]) -> Self {
        let mut buckets = BTreeMap::new();
        let mut band_magnitudes = HashMap::new();
        for p in precincts {
            for &band in SubbandKind::for_resolution(p.resolution) {
                let key = BucketKey {
                    tile: p.tile,
                    component: p.component,
                    resolution: p.resolution,
                    class: BandClass::of(band),
                };
                buckets
                    .entry(key)
                    .or_insert_with_key(|key| bucket_magnitude(codestream, key));
                band_magnitudes
                    .entry((key, band))
                    .or_insert_with(|| codestream.magnitude_bits(p.tile, p.component, p.resolution, band));
            }
        }

        let curves: BTreeMap<BucketKey, Vec<f64>> = buckets
            .iter()
            .map(|(key, &magnitude)| {
                let levels = codestream.decomposition_levels(key.tile, key.component);
                let mut curve = slope_curve(key.class, key.resolution, levels, magnitude);
                remove_liars(&mut curve);
                (*key, curve)
            })
            .collect();

        Self {
            order: merge_block_order(&curves),
            buckets,
            band_magnitudes,
        }
    }

    /// Tokens of one precinct, in global level order.
    ///
    /// A block's first pass sits on the step of its most significant
    /// non-zero bit-plane: the band's distance below the bucket's top plane
    /// plus the block's zero bit-planes, as reported by the store. The
    /// block's pass count only truncates its tail.
    ///
    /// # Arguments
    ///
    /// * `store` - Source of pass counts and zero bit-planes
    /// * `precinct` - Precinct to expand; buckets it does not belong to are ignored
    pub fn expand(&self, store: &dyn CodestreamStore, precinct: &Precinct) -> Vec<CodingPassId> {
        let mut per_bucket: HashMap<BucketKey, Vec<&BlockOrder>> = HashMap::new();
        for entry in &self.order {
            if entry.bucket.tile == precinct.tile()
                && entry.bucket.component == precinct.component()
                && entry.bucket.resolution == precinct.resolution()
            {
                per_bucket.entry(entry.bucket).or_default().push(entry);
            }
        }

        let zero_bit_planes = store.zero_bit_planes(precinct.id());
        let mut tokens = Vec::new();
        for (b, grid) in precinct.code_blocks().iter().enumerate() {
            let key = BucketKey {
                tile: precinct.tile(),
                component: precinct.component(),
                resolution: precinct.resolution(),
                class: BandClass::of(grid.band),
            };
            let Some(&magnitude) = self.buckets.get(&key) else {
                continue;
            };
            let band_magnitude = self
                .band_magnitudes
                .get(&(key, grid.band))
                .copied()
                .unwrap_or(magnitude);
            let band_lead = magnitude.saturating_sub(band_magnitude) as u16;
            let entries = per_bucket.get(&key).map(Vec::as_slice).unwrap_or(&[]);

            for y in 0..grid.rows {
                for x in 0..grid.cols {
                    let block = BlockRef::new(grid.band, y, x);
                    let passes = store.coding_passes(precinct.id(), block);
                    if passes == 0 {
                        continue;
                    }
                    let missing = grid
                        .raster_index(y, x)
                        .and_then(|blk| zero_bit_planes.get(b)?.get(blk).copied())
                        .unwrap_or(0) as u16;
                    let lead = 3 * (band_lead + missing);
                    for entry in entries {
                        for step in entry.step_range() {
                            let Some(pass) = step.checked_sub(lead).filter(|&p| p < passes) else {
                                continue;
                            };
                            tokens.push(CodingPassId {
                                precinct: precinct.id(),
                                band: grid.band,
                                y_block: y,
                                x_block: x,
                                pass,
                                level: entry.level,
                            });
                        }
                    }
                }
            }
        }
        tokens.sort_by_key(|token| token.level);
        tokens
    }

    /// Lay out a precinct's data-bin: one layer per distinct level its
    /// tokens fall on. Returns the layout and those levels.
    pub fn synthesize(&self, store: &dyn CodestreamStore, precinct: &Precinct) -> (SynthesizedPrecinct, Vec<u32>) {
        let tokens = self.expand(store, precinct);
        let mut synthesized = SynthesizedPrecinct::new(precinct);

        let mut levels: Vec<u32> = tokens.iter().map(|t| t.level).collect();
        levels.dedup();

        let mut layers = vec![LayerPlan::empty(&synthesized.grids); levels.len()];
        let mut layer = 0usize;
        for token in &tokens {
            while levels[layer] != token.level {
                layer += 1;
            }
            let Some(b) = synthesized.grids.iter().position(|g| g.band == token.band) else {
                continue;
            };
            let Some(blk) = synthesized.grids[b].raster_index(token.y_block, token.x_block) else {
                continue;
            };
            layers[layer].add_pass(b, blk, token.pass);
        }
        synthesized.layers = layers;
        (synthesized, levels)
    }
}

/// CoRD scheduler.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cord;

impl Cord {
    pub fn new() -> Self {
        Self
    }
}

impl Scheduler for Cord {
    fn name(&self) -> &'static str {
        "cord"
    }

    fn schedule(&self, ctx: &RequestContext<'_>, codec: &mut dyn PacketHeaderCodec) -> Result<Schedule, ScheduleError> {
        let resolver = Resolver::new(ctx.codestream);
        let mut precincts = resolver.relevant_precincts(ctx.window, ctx.order);
        let plan = CordPlan::build(ctx.codestream, &precincts);

        let mut synthesized = Vec::with_capacity(precincts.len());
        for p in &precincts {
            let precinct = ctx
                .codestream
                .precinct(p.id)
                .ok_or(ScheduleError::UnknownPrecinct(p.id))?;
            let (s, levels) = plan.synthesize(ctx.store, precinct);
            s.begin(codec, ctx.store);
            trace!(precinct = %p.id, layers = s.num_layers(), "CoRD precinct");
            synthesized.push((s, levels));
        }

        let limit = ctx.window.requested_layers.unwrap_or(u16::MAX);
        let mut builder = ResponseBuilder::new(ctx.ledger, ctx.budget());

        'levels: for entry in &plan.order {
            for (precinct, (s, levels)) in precincts.iter_mut().zip(&synthesized) {
                let layer = precinct.layers_queued;
                if layer >= limit || levels.get(layer as usize) != Some(&entry.level) {
                    continue;
                }
                if s.push_next_layer(&mut builder, codec, ctx.store, precinct) == Pushed::Stopped {
                    break 'levels;
                }
            }
        }

        for (s, _) in &synthesized {
            codec.end_precinct(s.id);
        }

        let schedule = builder.finish(self.name());
        debug!(
            precincts = precincts.len(),
            buckets = plan.buckets.len(),
            levels = plan.order.len(),
            bytes = schedule.total_bytes(),
            end_reason = ?schedule.end_reason,
            "CoRD schedule complete"
        );
        Ok(schedule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(resolution: u8, class: BandClass) -> BucketKey {
        BucketKey {
            tile: 0,
            component: 0,
            resolution,
            class,
        }
    }

    #[test]
    fn test_step_pass() {
        assert_eq!(step_pass(0, 5), (PassKind::Cleanup, 4));
        assert_eq!(step_pass(1, 5), (PassKind::SignificancePropagation, 3));
        assert_eq!(step_pass(2, 5), (PassKind::MagnitudeRefinement, 3));
        assert_eq!(step_pass(3, 5), (PassKind::Cleanup, 3));
        assert_eq!(step_pass(12, 5), (PassKind::Cleanup, 0));
    }

    #[test]
    fn test_slope_curve_shape() {
        let curve = slope_curve(BandClass::LowLow, 0, 2, 4);
        assert_eq!(curve.len(), 10);
        // First cleanup: 2^2 * 4^3 * 0.5
        assert_eq!(curve[0], 128.0);
        // Refinement is worth less than the cleanup that follows it
        assert!(curve[2] < curve[3]);
    }

    #[test]
    fn test_remove_liars_is_non_increasing() {
        for class in [BandClass::LowLow, BandClass::Mixed, BandClass::HighHigh] {
            for magnitude in 1..12 {
                let mut curve = slope_curve(class, 1, 3, magnitude);
                remove_liars(&mut curve);
                assert!(curve.windows(2).all(|w| w[0] >= w[1]));
            }
        }
    }

    #[test]
    fn test_remove_liars_lifts_points() {
        let mut curve = vec![5.0, 1.0, 3.0, 2.0];
        remove_liars(&mut curve);
        assert_eq!(curve, vec![5.0, 3.0, 3.0, 2.0]);
    }

    #[test]
    fn test_merge_block_order() {
        let mut curves = BTreeMap::new();
        curves.insert(key(0, BandClass::LowLow), vec![8.0, 4.0, 4.0, 1.0]);
        curves.insert(key(1, BandClass::Mixed), vec![6.0, 4.0, 0.0]);
        let order = merge_block_order(&curves);

        let runs: Vec<(u8, u16, u16)> = order
            .iter()
            .map(|o| (o.bucket.resolution, o.first_step, o.steps))
            .collect();
        // 8 | 6 | 4 4 (lower key wins the tie) | 4 | 1; the zero is never sent
        assert_eq!(runs, vec![(0, 0, 1), (1, 0, 1), (0, 1, 2), (1, 1, 1), (0, 3, 1)]);
        assert!(order.iter().enumerate().all(|(i, o)| o.level == i as u32));
    }
}
