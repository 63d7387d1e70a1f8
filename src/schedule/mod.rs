//! Response scheduling.
//!
//! A scheduler decides which bytes of which precinct data-bins go into one
//! response, and in what order:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                        RequestContext                          │
//! │  codestream · resolved window · order · ledger · store · budget│
//! └───────────────────────────────┬────────────────────────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         ▼                       ▼                       ▼
//!   ┌───────────┐          ┌────────────┐          ┌────────────┐
//!   │    Wsf    │          │    Cpi     │          │    Cord    │
//!   │ stored    │          │ pass units │          │ slope-     │
//!   │ packets   │          │ per level  │          │ ordered    │
//!   └─────┬─────┘          └─────┬──────┘          └─────┬──────┘
//!         └───────────────┬──────┴───────────────────────┘
//!                         ▼
//!                 ResponseBuilder ──▶ Schedule { chunks, end_reason }
//! ```
//!
//! Every scheduler lays each precinct's data-bin out the same way for every
//! window, as a sequence of `header ‖ passes` layers. The cache ledger's
//! byte count is an offset into that layout, which is what lets a replay
//! skip exactly what the client already holds.
//!
//! Schedulers keep no state between calls. Everything a pass needs comes in
//! through [`RequestContext`].

mod cord;
mod cpi;
mod layers;
mod response;
mod thresholds;
mod wsf;

use crate::codec::PacketHeaderCodec;
use crate::codestream::Codestream;
use crate::error::ScheduleError;
use crate::source::{CacheLedger, CodestreamStore, PacketIndex};
use crate::window::{ProgressionOrder, ResolvedWindow};

pub use cord::{
    merge_block_order, remove_liars, slope_curve, step_pass, BandClass, BlockOrder, BucketKey, CodingPassId,
    Cord, CordPlan, PassKind,
};
pub use cpi::{is_magnitude_refinement, Cpi, CpiVariant, SubbandWeights};
pub use layers::{LayerPlan, SynthesizedPrecinct};
pub use response::{ByteBudget, ChunkPayload, EndReason, FileRange, ResponseChunk, Schedule};
pub use thresholds::{SlopeThresholds, DEFAULT_SLOPE_BUCKETS, MAX_SLOPE};
pub use wsf::{estimated_layer_slopes, Wsf, DEFAULT_PRIORITY_LAYERS, MIN_PAYLOAD_BYTES};

/// Everything one scheduling pass reads.
pub struct RequestContext<'a> {
    pub codestream: &'a Codestream,
    pub window: &'a ResolvedWindow,
    pub order: ProgressionOrder,
    pub ledger: &'a dyn CacheLedger,
    pub store: &'a dyn CodestreamStore,
    pub packets: &'a dyn PacketIndex,

    /// Response size limit, `None` for unbounded
    pub max_bytes: Option<u64>,
}

impl RequestContext<'_> {
    /// A fresh budget for this request's byte limit.
    pub fn budget(&self) -> ByteBudget {
        ByteBudget::from_limit(self.max_bytes)
    }
}

/// A response scheduling strategy.
pub trait Scheduler: Send + Sync {
    /// Short name, as used on the command line.
    fn name(&self) -> &'static str;

    /// Build one response.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The resolved window, the client's cache ledger, the
    ///   codestream source and the byte limit
    /// * `codec` - Encodes the headers of synthesized layers. Schedulers
    ///   sending stored packets leave it untouched.
    ///
    /// # Returns
    ///
    /// The ordered chunks, the ledger updates they imply and why the
    /// response ended. Running out of budget is not an error.
    fn schedule(&self, ctx: &RequestContext<'_>, codec: &mut dyn PacketHeaderCodec) -> Result<Schedule, ScheduleError>;
}
