//! The event-driven attribution engine.
//!
//! One [`Orchestrator`] owns the per-community runtime state:
//!
//! - **Snapshot cache**: last known invitation set per community
//! - **Dedup keys**: recently processed joins/leaves
//! - **Join index**: join times of members seen joining by this process
//!
//! Per-community lifecycle: `Uninitialized` until the first successful
//! snapshot, `Cached` afterwards. Failed refreshes never change the state;
//! leaving a community drops it.

mod config;
mod orchestrator;

#[cfg(test)]
mod tests;

pub use config::{DEFAULT_REFRESH_INTERVAL_SECS, EngineConfig};
pub use orchestrator::Orchestrator;
