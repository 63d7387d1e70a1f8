//! Test utilities for integration tests.
//!
//! Codestream layouts with known geometry and a harness that runs any
//! scheduler against the deterministic rate model store.

use std::collections::HashMap;
use std::sync::Arc;

use jpip_streamer::codestream::{ComponentInfo, PrecinctExponents};
use jpip_streamer::source::PacketExtent;
use jpip_streamer::{
    BlockRef, Capability, Codestream, CodestreamLayout, CodestreamStore, CodingParameters,
    InClassId, MemoryLedger, ModelStore, PacketIndex, ProgressionOrder, RequestContext,
    ResolvedWindow, Resolver, Schedule, Scheduler, SchedulerKind, SchedulerSettings, Size,
    Tier2HeaderCodec, ViewWindow,
};

// =============================================================================
// Layouts
// =============================================================================

/// 192x48 image in two 96x48 tiles, one component, two decomposition levels
/// and three layers. Precinct partitions give 1 + 3 + 9 precincts per tile.
pub fn two_tile_layout() -> CodestreamLayout {
    let mut layout = CodestreamLayout::new(192, 48);
    layout.tile_width = Some(96);
    layout.tile_height = Some(48);
    layout.coding = CodingParameters {
        decomposition_levels: 2,
        layers: 3,
        precincts: vec![
            PrecinctExponents::new(6, 6),
            PrecinctExponents::new(4, 5),
            PrecinctExponents::new(5, 4),
        ],
        ..Default::default()
    };
    layout
}

/// 128x128 single-tile image with three components, 16x16 code-blocks and
/// four layers.
pub fn color_layout() -> CodestreamLayout {
    let mut layout = CodestreamLayout::new(128, 128);
    layout.components = vec![ComponentInfo::default(); 3];
    layout.coding = CodingParameters {
        decomposition_levels: 3,
        layers: 4,
        code_block_width_exp: 4,
        code_block_height_exp: 4,
        precincts: vec![PrecinctExponents::new(5, 5)],
        ..Default::default()
    };
    layout
}

// =============================================================================
// Scheduling Harness
// =============================================================================

/// An opened codestream plus its rate model store.
pub struct Fixture {
    pub codestream: Arc<Codestream>,
    pub store: ModelStore,
}

impl Fixture {
    pub fn open(layout: &CodestreamLayout) -> Self {
        let codestream = Arc::new(Codestream::from_layout(layout).unwrap());
        Self {
            store: ModelStore::new(Arc::clone(&codestream)).unwrap(),
            codestream,
        }
    }

    pub fn with_store(mut self, store: ModelStore) -> Self {
        self.store = store;
        self
    }

    pub fn image_size(&self) -> Size {
        self.codestream.image().size()
    }

    pub fn full_window(&self) -> ResolvedWindow {
        self.resolve(&ViewWindow::full_frame(self.image_size()))
    }

    pub fn resolve(&self, window: &ViewWindow) -> ResolvedWindow {
        Resolver::new(&self.codestream).resolve_window(window).unwrap()
    }

    /// Run one scheduling pass with a fresh header codec.
    pub fn run(
        &self,
        scheduler: &dyn Scheduler,
        window: &ResolvedWindow,
        ledger: &MemoryLedger,
        max_bytes: Option<u64>,
    ) -> Schedule {
        self.run_ordered(scheduler, window, ProgressionOrder::default(), ledger, max_bytes)
    }

    pub fn run_ordered(
        &self,
        scheduler: &dyn Scheduler,
        window: &ResolvedWindow,
        order: ProgressionOrder,
        ledger: &MemoryLedger,
        max_bytes: Option<u64>,
    ) -> Schedule {
        let ctx = RequestContext {
            codestream: &self.codestream,
            window,
            order,
            ledger,
            store: &self.store,
            packets: &self.store,
            max_bytes,
        };
        let mut codec = Tier2HeaderCodec::new();
        scheduler.schedule(&ctx, &mut codec).unwrap()
    }

    /// Run one scheduling pass against other collaborators.
    pub fn run_with(
        &self,
        scheduler: &dyn Scheduler,
        window: &ResolvedWindow,
        store: &dyn CodestreamStore,
        packets: &dyn PacketIndex,
        ledger: &MemoryLedger,
        max_bytes: Option<u64>,
    ) -> Schedule {
        let ctx = RequestContext {
            codestream: &self.codestream,
            window,
            order: ProgressionOrder::default(),
            ledger,
            store,
            packets,
            max_bytes,
        };
        let mut codec = Tier2HeaderCodec::new();
        scheduler.schedule(&ctx, &mut codec).unwrap()
    }
}

// =============================================================================
// Stores
// =============================================================================

/// Rate model store whose encoder stopped some blocks early, as rate
/// control does in a lossy codestream. Zero bit-planes are unchanged.
pub struct TruncatedStore {
    pub inner: ModelStore,
    pub cut: HashMap<(InClassId, BlockRef), u16>,
}

impl TruncatedStore {
    pub fn new(inner: ModelStore) -> Self {
        Self {
            inner,
            cut: HashMap::new(),
        }
    }

    pub fn truncate(mut self, id: InClassId, block: BlockRef, passes: u16) -> Self {
        self.cut.insert((id, block), passes);
        self
    }
}

impl CodestreamStore for TruncatedStore {
    fn coding_passes(&self, id: InClassId, block: BlockRef) -> u16 {
        let passes = self.inner.coding_passes(id, block);
        match self.cut.get(&(id, block)) {
            Some(&cut) => passes.min(cut),
            None => passes,
        }
    }

    fn coding_pass_offset(&self, id: InClassId, block: BlockRef, pass: u16) -> u64 {
        self.inner.coding_pass_offset(id, block, pass)
    }

    fn coding_pass_length(&self, id: InClassId, block: BlockRef, pass: u16) -> u32 {
        if pass >= self.coding_passes(id, block) {
            return 0;
        }
        self.inner.coding_pass_length(id, block, pass)
    }

    fn zero_bit_planes(&self, id: InClassId) -> Vec<Vec<u8>> {
        self.inner.zero_bit_planes(id)
    }
}

/// Packet index in which every precinct stores the same packets: a 2-byte
/// header and the given body length per layer.
pub struct FixedPackets {
    pub bodies: Vec<u32>,
}

impl FixedPackets {
    const HEADER: u32 = 2;
    const SPAN: u64 = 1 << 16;

    pub fn new(bodies: &[u32]) -> Self {
        Self {
            bodies: bodies.to_vec(),
        }
    }

    /// Bytes of every stored packet of one precinct.
    pub fn precinct_bytes(&self) -> u64 {
        self.bodies.iter().map(|&b| (Self::HEADER + b) as u64).sum()
    }
}

impl PacketIndex for FixedPackets {
    fn layer_count(&self, _id: InClassId) -> Capability<u16> {
        Capability::Supported(self.bodies.len() as u16)
    }

    fn packet(&self, id: InClassId, layer: u16) -> Capability<PacketExtent> {
        let Some(&body_length) = self.bodies.get(layer as usize) else {
            return Capability::Unsupported;
        };
        let before: u64 = self.bodies[..layer as usize]
            .iter()
            .map(|&b| (Self::HEADER + b) as u64)
            .sum();
        Capability::Supported(PacketExtent {
            offset: id.value() * Self::SPAN + before,
            header_length: Self::HEADER,
            body_length,
        })
    }
}

/// Every scheduler with default settings.
pub fn all_schedulers() -> Vec<Box<dyn Scheduler>> {
    SchedulerKind::ALL
        .iter()
        .map(|kind| kind.build(&SchedulerSettings::default()))
        .collect()
}

// =============================================================================
// Assertions
// =============================================================================

/// Data-bin spans `[start, end)` per precinct, in response order across all
/// the given responses.
pub fn spans_by_precinct(responses: &[&Schedule]) -> HashMap<InClassId, Vec<(u64, u64)>> {
    let mut spans: HashMap<InClassId, Vec<(u64, u64)>> = HashMap::new();
    for schedule in responses {
        for chunk in &schedule.chunks {
            spans
                .entry(chunk.precinct)
                .or_default()
                .push((chunk.data_bin_offset, chunk.end()));
        }
    }
    spans
}

/// Assert that successive responses extend every data-bin from offset zero
/// without gaps or overlap.
pub fn assert_contiguous(name: &str, responses: &[&Schedule]) {
    for (id, spans) in spans_by_precinct(responses) {
        let mut reached = 0;
        for (start, end) in spans {
            assert_eq!(start, reached, "{name}: precinct {id} resumes at the wrong offset");
            assert!(end > start, "{name}: empty chunk in precinct {id}");
            reached = end;
        }
    }
}
