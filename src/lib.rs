//! # JPIP Streamer
//!
//! Rate-distortion delivery core for interactive JPEG 2000 streaming.
//!
//! Given a wavelet codestream and a client's view window, this library
//! decides which bytes of which precinct data-bins the next response should
//! carry. It never decodes sample data: it works from codestream geometry,
//! coding-pass offsets and lengths, and a per-client record of what has
//! already been delivered.
//!
//! ## Features
//!
//! - **Codestream geometry**: tiles, components, resolution levels,
//!   precincts, subbands and code-blocks, built from a JSON layout
//! - **Window resolution**: snaps a requested frame onto an available
//!   resolution and enumerates the relevant precincts in a progression order
//! - **Schedulers**: window-scaling-factor (WSF) packet ordering,
//!   coding-passes-interleaving (CPI) in four granularities, and CoRD
//!   slope-ordered layer synthesis
//! - **Cache awareness**: responses skip what the client already holds and
//!   stop cleanly at a byte budget
//!
//! ## Architecture
//!
//! - [`geometry`] - Rectangles and resolution-grid arithmetic
//! - [`codestream`] - Codestream model and layouts
//! - [`window`] - View windows and the precinct resolver
//! - [`source`] - Cache ledger, coding-pass store and packet index
//! - [`codec`] - Packet header coding for synthesized layers
//! - [`schedule`] - The schedulers and response building
//! - [`service`] - Codestream registry, session ledgers and delivery
//! - [`config`] - CLI configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use jpip_streamer::{
//!     CodestreamLayout, CodestreamRegistry, DeliveryRequest, DeliveryService, LedgerStore,
//!     MemorySource, SchedulerKind, Size, ViewWindow,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let source = MemorySource::new().with_layout("scan", CodestreamLayout::new(1024, 768));
//!     let service = DeliveryService::new(CodestreamRegistry::new(source), LedgerStore::new());
//!
//!     let request = DeliveryRequest::new("scan", ViewWindow::full_frame(Size::new(256, 192)))
//!         .with_scheduler(SchedulerKind::Cord)
//!         .with_max_bytes(4096);
//!     let schedule = service.deliver("client-1", &request).await.unwrap();
//!     println!("{} bytes in {} chunks", schedule.total_bytes(), schedule.chunks.len());
//! }
//! ```

pub mod codec;
pub mod codestream;
pub mod config;
pub mod error;
pub mod geometry;
pub mod schedule;
pub mod service;
pub mod source;
pub mod window;

// Re-export commonly used types
pub use codec::{PacketHeaderCodec, Tier2HeaderCodec};
pub use codestream::{
    CodeBlockGrid, Codestream, CodestreamLayout, CodingParameters, InClassId, Precinct,
    PrecinctExponents, SubbandKind,
};
pub use config::Config;
pub use error::{GeometryError, ScheduleError, ServiceError, WindowError};
pub use geometry::{Point, Rect, RoundDirection, Size};
pub use schedule::{
    ByteBudget, ChunkPayload, Cord, Cpi, CpiVariant, EndReason, RequestContext, ResponseChunk,
    Schedule, Scheduler, SubbandWeights, Wsf,
};
pub use service::{
    CodestreamRegistry, CodestreamSource, DeliveryRequest, DeliveryService, LayoutSource,
    LedgerStore, MemorySource, SchedulerKind, SchedulerSettings,
};
pub use source::{
    BlockRef, CacheLedger, Capability, CodestreamStore, LedgerUpdate, MemoryLedger, ModelStore,
    PacketIndex,
};
pub use window::{ComponentRange, ProgressionOrder, RelevantPrecinct, ResolvedWindow, Resolver, ViewWindow};
