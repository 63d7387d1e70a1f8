//! View windows and the precinct resolver.

mod order;
mod resolver;
mod view;

pub use crate::geometry::RoundDirection;
pub use order::ProgressionOrder;
pub use resolver::{RelevantPrecinct, Resolver};
pub use view::{ComponentRange, ResolvedWindow, ViewWindow};
