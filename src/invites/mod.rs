//! Invitation snapshots and join attribution.

mod cache;
mod resolver;

pub use cache::{CacheState, SnapshotCache};
pub use resolver::resolve;
