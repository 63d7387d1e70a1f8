//! Async orchestration around the scheduling core.
//!
//! The core itself is synchronous and request-local. This layer adds what a
//! server needs around it:
//!
//! - [`CodestreamRegistry`]: opened codestream models, LRU-cached and shared
//! - [`LedgerStore`]: one cache ledger per client session
//! - [`DeliveryService`]: validate, resolve, schedule, record
//!
//! Codestream descriptions come from a [`CodestreamSource`]; [`LayoutSource`]
//! reads JSON layouts from disk.

mod delivery;
mod ledgers;
mod registry;
mod source;

pub use delivery::{DeliveryRequest, DeliveryService, SchedulerKind, SchedulerSettings};
pub use ledgers::{LedgerStore, SessionLedger, DEFAULT_SESSION_CAPACITY};
pub use registry::{CodestreamRegistry, DEFAULT_CODESTREAM_CACHE_CAPACITY};
pub use source::{CodestreamSource, LayoutSource, MemorySource, OpenCodestream};
