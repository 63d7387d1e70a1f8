//! Window scaling factor scheduling over the codestream's own packets.
//!
//! Every relevant precinct gets a weight from how much of it the window
//! covers and from how far the served frame overshoots the requested one:
//!
//! ```text
//! wsf = max(1 - overlap_penalty - scaling_penalty, 1 / buckets)
//! ```
//!
//! Each stored layer then lands in a slab: the bucket of `wsf * slope(l)`
//! among log-spaced slope thresholds. After the first priority layers of
//! every precinct, the scheduler repeatedly takes the highest slab any
//! precinct still has pending and sends every pending layer at or above it.

use std::collections::HashMap;

use tracing::{debug, trace, warn};

use crate::codec::PacketHeaderCodec;
use crate::error::ScheduleError;
use crate::source::Capability;
use crate::window::{RelevantPrecinct, Resolver};

use super::response::{FileRange, LayerHeader, Pushed, ResponseBuilder, Schedule};
use super::thresholds::{SlopeThresholds, DEFAULT_SLOPE_BUCKETS, MAX_SLOPE};
use super::{RequestContext, Scheduler};

/// Layers sent before any weighting applies.
pub const DEFAULT_PRIORITY_LAYERS: u16 = 1;

/// Pass payloads below this size wait for the next layer.
pub const MIN_PAYLOAD_BYTES: u64 = 8;

/// Compression slopes of a codestream with `layers` layers when it does not
/// carry its own: `65535 * ln(L + 1 - l) / ln(L + 1)`.
pub fn estimated_layer_slopes(layers: u16) -> Vec<f64> {
    let total = (layers as f64 + 1.0).ln();
    (0..layers)
        .map(|l| MAX_SLOPE * (layers as f64 + 1.0 - l as f64).ln() / total)
        .collect()
}

/// Per-request state of one precinct.
struct Candidate {
    /// Layers that may be sent
    layers: u16,
    /// Slab of each layer, after small payloads are folded into the next
    slabs: Vec<usize>,
    packets: Vec<(u64, u32, u32)>,
}

impl Candidate {
    fn pending_slab(&self, precinct: &RelevantPrecinct) -> Option<usize> {
        (precinct.layers_queued < self.layers).then(|| self.slabs[precinct.layers_queued as usize])
    }
}

/// Window scaling factor scheduler.
#[derive(Debug, Clone)]
pub struct Wsf {
    slopes: SlopeThresholds,
    penalties: SlopeThresholds,
    priority_layers: u16,
    min_payload: u64,
}

impl Default for Wsf {
    fn default() -> Self {
        Self::new(DEFAULT_SLOPE_BUCKETS)
    }
}

impl Wsf {
    /// A scheduler with `buckets` slope thresholds and the default priority
    /// layer count and minimum payload.
    pub fn new(buckets: usize) -> Self {
        Self {
            slopes: SlopeThresholds::slopes(buckets),
            penalties: SlopeThresholds::unit(buckets),
            priority_layers: DEFAULT_PRIORITY_LAYERS,
            min_payload: MIN_PAYLOAD_BYTES,
        }
    }

    pub fn with_priority_layers(mut self, layers: u16) -> Self {
        self.priority_layers = layers;
        self
    }

    /// Bodies smaller than `bytes` are sent together with the next layer.
    pub fn with_min_payload(mut self, bytes: u64) -> Self {
        self.min_payload = bytes;
        self
    }

    pub fn priority_layers(&self) -> u16 {
        self.priority_layers
    }

    /// Weight of a precinct covering `overlap` of its support region at a
    /// frame scale of `scale`.
    ///
    /// # Arguments
    ///
    /// * `overlap` - Covered fraction of the precinct, in `(0, 1]`
    /// * `scale` - Requested frame area over served frame area, in `[0, 1]`
    ///
    /// # Returns
    ///
    /// A weight in `[1 / buckets, 1]`. Full coverage at full scale gives 1.
    pub fn window_scaling_factor(&self, overlap: f64, scale: f64) -> f64 {
        let floor = 1.0 / self.penalties.len() as f64;
        let wsf = 1.0 - self.penalties.penalty(overlap) - self.penalties.penalty(scale);
        wsf.max(floor)
    }

    /// Slab of a layer with compression slope `slope` in a precinct of
    /// weight `weight`.
    pub fn slab(&self, weight: f64, slope: f64) -> usize {
        self.slopes.bucket(weight * slope)
    }

    fn candidate(
        &self,
        ctx: &RequestContext<'_>,
        precinct: &mut RelevantPrecinct,
        estimates: &mut HashMap<u16, Vec<f64>>,
    ) -> Candidate {
        let empty = Candidate {
            layers: 0,
            slabs: Vec::new(),
            packets: Vec::new(),
        };
        let stored = match ctx.packets.layer_count(precinct.id) {
            Capability::Supported(layers) => layers,
            Capability::Unsupported => {
                trace!(precinct = %precinct.id, "No packet index, skipping");
                return empty;
            }
        };

        let top = ctx
            .codestream
            .component(precinct.tile, precinct.component)
            .map(|component| component.top_resolution(ctx.window.discard_levels));
        let scale = if top == Some(precinct.resolution) {
            ctx.window.scale_factor()
        } else {
            1.0
        };
        precinct.weight = self.window_scaling_factor(precinct.overlap, scale);

        let mut packets = Vec::new();
        for layer in 0..stored.min(ctx.window.layers) {
            match ctx.packets.packet(precinct.id, layer) {
                Capability::Supported(extent) => {
                    packets.push((extent.offset, extent.header_length, extent.body_length))
                }
                Capability::Unsupported => break,
            }
        }
        let layers = packets.len() as u16;

        let tile_layers = ctx.codestream.layers(precinct.tile);
        let slopes: Vec<f64> = match ctx.codestream.layer_slopes() {
            Some(embedded) => embedded.iter().map(|&s| s as f64).collect(),
            None => estimates
                .entry(tile_layers)
                .or_insert_with(|| estimated_layer_slopes(tile_layers))
                .clone(),
        };

        let mut slabs: Vec<usize> = (0..layers as usize)
            .map(|l| self.slab(precinct.weight, slopes.get(l).copied().unwrap_or(0.0)))
            .collect();
        for l in (0..slabs.len().saturating_sub(1)).rev() {
            if (packets[l].2 as u64) < self.min_payload {
                slabs[l] = slabs[l].min(slabs[l + 1]);
            }
        }

        trace!(
            precinct = %precinct.id,
            weight = precinct.weight,
            layers,
            "WSF candidate"
        );
        Candidate {
            layers,
            slabs,
            packets,
        }
    }

    fn push(builder: &mut ResponseBuilder<'_>, precinct: &mut RelevantPrecinct, candidate: &Candidate) -> Pushed {
        let layer = precinct.layers_queued as usize;
        let (offset, header_length, body_length) = candidate.packets[layer];
        let header = LayerHeader::Stored {
            offset,
            length: header_length,
        };
        let body = [FileRange::new(offset + header_length as u64, body_length)];
        builder.push_layer(precinct, header, &body, layer + 1 == candidate.layers as usize)
    }
}

impl Scheduler for Wsf {
    fn name(&self) -> &'static str {
        "wsf"
    }

    fn schedule(&self, ctx: &RequestContext<'_>, _codec: &mut dyn PacketHeaderCodec) -> Result<Schedule, ScheduleError> {
        let resolver = Resolver::new(ctx.codestream);
        let mut precincts = resolver.relevant_precincts(ctx.window, ctx.order);

        if ctx.codestream.layer_slopes().is_none() {
            warn!("Codestream carries no layer slopes, using log estimate");
        }

        let mut estimates = HashMap::new();
        let candidates: Vec<Candidate> = precincts
            .iter_mut()
            .map(|p| self.candidate(ctx, p, &mut estimates))
            .collect();

        let mut builder = ResponseBuilder::new(ctx.ledger, ctx.budget()).with_min_partial(self.min_payload);

        // Priority layers, plus any small layer that rides with them
        'priority: for (precinct, candidate) in precincts.iter_mut().zip(&candidates) {
            while precinct.layers_queued < candidate.layers {
                let layer = precinct.layers_queued as usize;
                let carried = layer > 0 && (candidate.packets[layer - 1].2 as u64) < self.min_payload;
                if layer >= self.priority_layers as usize && !carried {
                    break;
                }
                if Self::push(&mut builder, precinct, candidate) == Pushed::Stopped {
                    break 'priority;
                }
            }
        }

        let mut rounds = 0usize;
        while !builder.is_stopped() {
            let Some(slab) = precincts
                .iter()
                .zip(&candidates)
                .filter_map(|(p, c)| c.pending_slab(p))
                .max()
            else {
                break;
            };
            rounds += 1;
            trace!(slab, "Sending slab");

            'slab: for (precinct, candidate) in precincts.iter_mut().zip(&candidates) {
                while candidate.pending_slab(precinct).is_some_and(|s| s >= slab) {
                    if Self::push(&mut builder, precinct, candidate) == Pushed::Stopped {
                        break 'slab;
                    }
                }
            }
        }

        let schedule = builder.finish(self.name());
        debug!(
            precincts = precincts.len(),
            rounds,
            bytes = schedule.total_bytes(),
            end_reason = ?schedule.end_reason,
            "WSF schedule complete"
        );
        Ok(schedule)
    }
}
