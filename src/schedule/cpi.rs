//! Coding-passes interleaving.
//!
//! CPI ignores the codestream's layers and cuts every code-block into
//! units of coding passes instead. Unit boundaries depend on the variant:
//!
//! ```text
//! pass         0   1   2   3   4   5   6   7 ...
//!              CP  SPP MRP CP  SPP MRP CP  SPP
//! Single      [------------- all ------------]
//! PerBitPlane [0] [1        ] [2        ] [3 ...
//! PerPass     [0] [1] [2] [3] [4] [5] [6] [7]
//! Scale       [0] [1] [2    ] [3] [4    ] [5]
//! ```
//!
//! A precinct gets `V_p = max(U + w)` virtual levels, `U` being a block's
//! unit count and `w` its subband weight. Block units are right-aligned on
//! that scale: a block first contributes in layer `V_p - U - w`, so the
//! last unit of every block lands `w` levels before the end. Delivery walks
//! global levels resolution by resolution, precincts with fewer levels
//! joining late.

use std::ops::Range;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::codec::PacketHeaderCodec;
use crate::codestream::{Precinct, SubbandKind};
use crate::error::ScheduleError;
use crate::source::CodestreamStore;
use crate::window::{RelevantPrecinct, Resolver};

use super::layers::{LayerPlan, SynthesizedPrecinct};
use super::response::{Pushed, ResponseBuilder, Schedule};
use super::{RequestContext, Scheduler};

/// Granularity of the synthesized layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CpiVariant {
    /// One layer holding every pass
    Single,
    /// One layer per bit-plane
    PerBitPlane,
    /// One layer per coding pass
    PerPass,
    /// Magnitude refinement passes joined with the following cleanup
    Scale,
}

/// Whether pass `pass` of a block is a magnitude refinement pass.
pub fn is_magnitude_refinement(pass: u16) -> bool {
    pass >= 2 && (pass - 2) % 3 == 0
}

impl CpiVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            CpiVariant::Single => "cpi-single",
            CpiVariant::PerBitPlane => "cpi-bitplane",
            CpiVariant::PerPass => "cpi-pass",
            CpiVariant::Scale => "cpi-scale",
        }
    }

    /// Units a full bit-plane spans, the multiplier of subband weights.
    pub fn units_per_bit_plane(&self) -> u16 {
        match self {
            CpiVariant::Single => 0,
            CpiVariant::PerBitPlane => 1,
            CpiVariant::PerPass => 3,
            CpiVariant::Scale => 2,
        }
    }

    /// Split `passes` coding passes into units.
    pub fn units(&self, passes: u16) -> Vec<Range<u16>> {
        if passes == 0 {
            return Vec::new();
        }
        match self {
            CpiVariant::Single => vec![0..passes],
            CpiVariant::PerPass => (0..passes).map(|p| p..p + 1).collect(),
            CpiVariant::PerBitPlane => {
                let mut units = vec![0..1];
                let mut start = 1;
                while start < passes {
                    let end = (start + 3).min(passes);
                    units.push(start..end);
                    start = end;
                }
                units
            }
            CpiVariant::Scale => {
                let mut units = Vec::new();
                let mut start = 0;
                while start < passes {
                    let end = if is_magnitude_refinement(start) {
                        (start + 2).min(passes)
                    } else {
                        start + 1
                    };
                    units.push(start..end);
                    start = end;
                }
                units
            }
        }
    }
}

/// Extra virtual levels per subband.
///
/// A block of a heavier band finishes earlier on the virtual level scale,
/// so its passes are sent before those of lighter bands at the same depth.
/// The first-component bonus favours luminance in colour codestreams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubbandWeights {
    pub low_low: u16,
    pub high_low: u16,
    pub low_high: u16,
    pub high_high: u16,
    pub first_component_bonus: u16,
}

impl Default for SubbandWeights {
    fn default() -> Self {
        Self {
            low_low: 2,
            high_low: 1,
            low_high: 1,
            high_high: 0,
            first_component_bonus: 2,
        }
    }
}

impl SubbandWeights {
    /// No band gets precedence.
    pub fn none() -> Self {
        Self {
            low_low: 0,
            high_low: 0,
            low_high: 0,
            high_high: 0,
            first_component_bonus: 0,
        }
    }

    /// Weight `w` of a block in `band` of `component`.
    pub fn weight(&self, variant: CpiVariant, band: SubbandKind, component: u16) -> u16 {
        let factor = variant.units_per_bit_plane();
        if factor == 0 {
            return 0;
        }
        let band_weight = match band {
            SubbandKind::LowLow => self.low_low,
            SubbandKind::HighLow => self.high_low,
            SubbandKind::LowHigh => self.low_high,
            SubbandKind::HighHigh => self.high_high,
        };
        let bonus = if component == 0 { self.first_component_bonus } else { 0 };
        factor * band_weight + bonus
    }
}

/// Coding-passes interleaving scheduler.
#[derive(Debug, Clone, Copy)]
pub struct Cpi {
    variant: CpiVariant,
    weights: SubbandWeights,
}

impl Cpi {
    pub fn new(variant: CpiVariant) -> Self {
        Self {
            variant,
            weights: SubbandWeights::default(),
        }
    }

    /// Replace the per-band weights added to each pass priority.
    pub fn with_weights(mut self, weights: SubbandWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn variant(&self) -> CpiVariant {
        self.variant
    }

    /// Lay out the data-bin of one precinct.
    pub fn synthesize(&self, store: &dyn CodestreamStore, precinct: &Precinct) -> SynthesizedPrecinct {
        let mut synthesized = SynthesizedPrecinct::new(precinct);

        // (band, block, units, weight) of every contributing block
        let mut blocks = Vec::new();
        for (b, grid) in synthesized.grids.iter().enumerate() {
            let weight = self.weights.weight(self.variant, grid.band, precinct.component());
            for blk in 0..grid.num_blocks() as usize {
                let Some(block) = synthesized.block_ref(b, blk) else {
                    continue;
                };
                let units = self.variant.units(store.coding_passes(precinct.id(), block));
                if !units.is_empty() {
                    blocks.push((b, blk, units, weight));
                }
            }
        }

        let levels = blocks
            .iter()
            .map(|(_, _, units, weight)| units.len() as u16 + weight)
            .max()
            .unwrap_or(0);

        let mut layers = vec![LayerPlan::empty(&synthesized.grids); levels as usize];
        for (b, blk, units, weight) in blocks {
            let first = levels - units.len() as u16 - weight;
            for (u, unit) in units.into_iter().enumerate() {
                layers[first as usize + u].passes[b][blk] = unit;
            }
        }
        synthesized.layers = layers;
        synthesized
    }
}

impl Scheduler for Cpi {
    fn name(&self) -> &'static str {
        self.variant.as_str()
    }

    fn schedule(&self, ctx: &RequestContext<'_>, codec: &mut dyn PacketHeaderCodec) -> Result<Schedule, ScheduleError> {
        let resolver = Resolver::new(ctx.codestream);
        let mut precincts: Vec<RelevantPrecinct> = resolver
            .relevant_precincts_by_resolution(ctx.window)
            .into_iter()
            .flatten()
            .collect();

        let mut synthesized = Vec::with_capacity(precincts.len());
        for p in &precincts {
            let precinct = ctx
                .codestream
                .precinct(p.id)
                .ok_or(ScheduleError::UnknownPrecinct(p.id))?;
            let s = self.synthesize(ctx.store, precinct);
            s.begin(codec, ctx.store);
            trace!(precinct = %p.id, levels = s.num_layers(), "CPI precinct");
            synthesized.push(s);
        }

        let total_levels = synthesized.iter().map(SynthesizedPrecinct::num_layers).max().unwrap_or(0);
        let limit = ctx.window.requested_layers.unwrap_or(u16::MAX);
        let mut builder = ResponseBuilder::new(ctx.ledger, ctx.budget());

        'levels: for level in 0..total_levels {
            for (precinct, s) in precincts.iter_mut().zip(&synthesized) {
                let shift = total_levels - s.num_layers();
                if level < shift || level - shift >= limit {
                    continue;
                }
                if s.push_next_layer(&mut builder, codec, ctx.store, precinct) == Pushed::Stopped {
                    break 'levels;
                }
            }
        }

        for s in &synthesized {
            codec.end_precinct(s.id);
        }

        let schedule = builder.finish(self.name());
        debug!(
            variant = self.variant.as_str(),
            precincts = precincts.len(),
            levels = total_levels,
            bytes = schedule.total_bytes(),
            end_reason = ?schedule.end_reason,
            "CPI schedule complete"
        );
        Ok(schedule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mrp_parity() {
        let mrp: Vec<u16> = (0..10).filter(|&p| is_magnitude_refinement(p)).collect();
        assert_eq!(mrp, vec![2, 5, 8]);
    }

    #[test]
    fn test_units_per_variant() {
        assert_eq!(CpiVariant::Single.units(7), vec![0..7]);
        assert_eq!(CpiVariant::PerBitPlane.units(7), vec![0..1, 1..4, 4..7]);
        assert_eq!(CpiVariant::PerBitPlane.units(5), vec![0..1, 1..4, 4..5]);
        assert_eq!(CpiVariant::PerPass.units(3), vec![0..1, 1..2, 2..3]);
        assert_eq!(CpiVariant::Scale.units(7), vec![0..1, 1..2, 2..4, 4..5, 5..7]);
        assert_eq!(CpiVariant::Scale.units(3), vec![0..1, 1..2, 2..3]);
        assert!(CpiVariant::PerPass.units(0).is_empty());
    }

    #[test]
    fn test_units_cover_every_pass() {
        for variant in [
            CpiVariant::Single,
            CpiVariant::PerBitPlane,
            CpiVariant::PerPass,
            CpiVariant::Scale,
        ] {
            for passes in 1..30u16 {
                let units = variant.units(passes);
                assert_eq!(units.first().map(|u| u.start), Some(0));
                assert_eq!(units.last().map(|u| u.end), Some(passes));
                assert!(units.windows(2).all(|w| w[0].end == w[1].start));
            }
        }
    }

    #[test]
    fn test_subband_weights() {
        let weights = SubbandWeights::default();
        assert_eq!(weights.weight(CpiVariant::PerPass, SubbandKind::LowLow, 1), 6);
        assert_eq!(weights.weight(CpiVariant::PerPass, SubbandKind::HighHigh, 0), 2);
        assert_eq!(weights.weight(CpiVariant::Scale, SubbandKind::HighLow, 1), 2);
        assert_eq!(weights.weight(CpiVariant::Single, SubbandKind::LowLow, 0), 0);
        assert_eq!(
            SubbandWeights::none().weight(CpiVariant::PerPass, SubbandKind::LowLow, 0),
            0
        );
    }
}
