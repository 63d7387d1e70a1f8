//! Delivery service orchestrating one response.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         DeliveryService                          │
//! │  ┌────────────────────────────────────────────────────────────┐  │
//! │  │                        deliver()                           │  │
//! │  │  1. Get codestream     4. Resolve window                   │  │
//! │  │  2. Lock session       5. Run scheduler                    │  │
//! │  │  3. Bind ledger        6. Record ledger updates            │  │
//! │  └────────────────────────────────────────────────────────────┘  │
//! │          │                      │                     │          │
//! │          ▼                      ▼                     ▼          │
//! │  ┌──────────────────┐   ┌──────────────┐    ┌─────────────────┐  │
//! │  │CodestreamRegistry│   │ LedgerStore  │    │ dyn Scheduler   │  │
//! │  └──────────────────┘   └──────────────┘    └─────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The session lock is held from reading the ledger to recording the
//! updates, so two requests of one client never schedule against the same
//! stale cache state.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::codec::Tier2HeaderCodec;
use crate::error::ServiceError;
use crate::schedule::{
    Cord, Cpi, CpiVariant, RequestContext, Schedule, Scheduler, SubbandWeights, Wsf, DEFAULT_PRIORITY_LAYERS,
    DEFAULT_SLOPE_BUCKETS,
};
use crate::source::MemoryLedger;
use crate::window::{ProgressionOrder, Resolver, ViewWindow};

use super::ledgers::LedgerStore;
use super::registry::CodestreamRegistry;
use super::source::CodestreamSource;

// =============================================================================
// Scheduler Selection
// =============================================================================

/// Scheduler selectable per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SchedulerKind {
    #[default]
    Wsf,
    CpiSingle,
    CpiBitplane,
    CpiPass,
    CpiScale,
    Cord,
}

impl SchedulerKind {
    pub const ALL: [SchedulerKind; 6] = [
        SchedulerKind::Wsf,
        SchedulerKind::CpiSingle,
        SchedulerKind::CpiBitplane,
        SchedulerKind::CpiPass,
        SchedulerKind::CpiScale,
        SchedulerKind::Cord,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerKind::Wsf => "wsf",
            SchedulerKind::CpiSingle => "cpi-single",
            SchedulerKind::CpiBitplane => "cpi-bitplane",
            SchedulerKind::CpiPass => "cpi-pass",
            SchedulerKind::CpiScale => "cpi-scale",
            SchedulerKind::Cord => "cord",
        }
    }

    /// Instantiate the scheduler.
    pub fn build(&self, settings: &SchedulerSettings) -> Box<dyn Scheduler> {
        let cpi = |variant| -> Box<dyn Scheduler> {
            Box::new(Cpi::new(variant).with_weights(settings.subband_weights))
        };
        match self {
            SchedulerKind::Wsf => Box::new(
                Wsf::new(settings.slope_buckets).with_priority_layers(settings.priority_layers),
            ),
            SchedulerKind::CpiSingle => cpi(CpiVariant::Single),
            SchedulerKind::CpiBitplane => cpi(CpiVariant::PerBitPlane),
            SchedulerKind::CpiPass => cpi(CpiVariant::PerPass),
            SchedulerKind::CpiScale => cpi(CpiVariant::Scale),
            SchedulerKind::Cord => Box::new(Cord::new()),
        }
    }
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunables shared by the schedulers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Threshold buckets for WSF penalties and slabs
    pub slope_buckets: usize,

    /// Layers WSF sends before weighting
    pub priority_layers: u16,

    pub subband_weights: SubbandWeights,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            slope_buckets: DEFAULT_SLOPE_BUCKETS,
            priority_layers: DEFAULT_PRIORITY_LAYERS,
            subband_weights: SubbandWeights::default(),
        }
    }
}

// =============================================================================
// Delivery Request
// =============================================================================

/// One client request.
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    /// Codestream target name
    pub target: String,

    pub window: ViewWindow,

    pub scheduler: SchedulerKind,

    pub order: ProgressionOrder,

    /// Response size limit, `None` for unbounded
    pub max_bytes: Option<u64>,
}

impl DeliveryRequest {
    /// A request with the default scheduler and progression order and no
    /// byte limit.
    pub fn new(target: impl Into<String>, window: ViewWindow) -> Self {
        Self {
            target: target.into(),
            window,
            scheduler: SchedulerKind::default(),
            order: ProgressionOrder::default(),
            max_bytes: None,
        }
    }

    pub fn with_scheduler(mut self, scheduler: SchedulerKind) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_order(mut self, order: ProgressionOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }
}

// =============================================================================
// Delivery Service
// =============================================================================

/// Entry point for scheduling responses.
pub struct DeliveryService<S: CodestreamSource> {
    registry: CodestreamRegistry<S>,
    ledgers: LedgerStore,
    settings: SchedulerSettings,
}

impl<S: CodestreamSource> DeliveryService<S> {
    /// Create a service with the default scheduler settings.
    pub fn new(registry: CodestreamRegistry<S>, ledgers: LedgerStore) -> Self {
        Self {
            registry,
            ledgers,
            settings: SchedulerSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: SchedulerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn registry(&self) -> &CodestreamRegistry<S> {
        &self.registry
    }

    pub fn ledgers(&self) -> &LedgerStore {
        &self.ledgers
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Schedule a response for a client that holds nothing yet. Nothing is
    /// recorded.
    pub async fn plan(&self, request: &DeliveryRequest) -> Result<Schedule, ServiceError> {
        self.run(request, &MemoryLedger::new()).await
    }

    /// Schedule a response for a session and record what it delivers.
    ///
    /// A session that switches codestream or scheduler starts over with an
    /// empty ledger.
    ///
    /// # Arguments
    ///
    /// * `session` - Key of the client's cache ledger, created on first use
    /// * `request` - Target codestream, view window, scheduler and limits
    ///
    /// # Errors
    ///
    /// Fails if the target cannot be opened, the window does not resolve,
    /// or the scheduler rejects the request. The ledger is untouched then.
    pub async fn deliver(&self, session: &str, request: &DeliveryRequest) -> Result<Schedule, ServiceError> {
        let handle = self.ledgers.session(session).await;
        let mut state = handle.lock().await;
        if state.bind(&request.target, request.scheduler) {
            debug!(
                session,
                target = %request.target,
                scheduler = %request.scheduler,
                "Session switched codestream or scheduler, cache state reset"
            );
        }

        let schedule = self.run(request, state.ledger()).await?;
        state.ledger_mut().apply(schedule.ledger_updates());

        info!(
            session,
            target = %request.target,
            scheduler = %request.scheduler,
            chunks = schedule.chunks.len(),
            bytes = schedule.total_bytes(),
            end_reason = ?schedule.end_reason,
            "Delivered response"
        );
        Ok(schedule)
    }

    async fn run(&self, request: &DeliveryRequest, ledger: &MemoryLedger) -> Result<Schedule, ServiceError> {
        let opened = self.registry.get(&request.target).await?;
        let codestream = opened.codestream.as_ref();

        let window = Resolver::new(codestream).resolve_window(&request.window)?;
        let ctx = RequestContext {
            codestream,
            window: &window,
            order: request.order,
            ledger,
            store: opened.store.as_ref(),
            packets: opened.store.as_ref(),
            max_bytes: request.max_bytes,
        };

        let scheduler = request.scheduler.build(&self.settings);
        let mut codec = Tier2HeaderCodec::new();
        Ok(scheduler.schedule(&ctx, &mut codec)?)
    }
}
