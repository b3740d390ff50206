//! Persistence layer for the invite tracker.
//!
//! # Architecture
//!
//! - **Attribution log**: append-only JSON Lines, one row per observed join
//! - **Aggregate tables**: small JSON files rewritten atomically on change
//!   (fake-invite counters, settings)
//! - **MembershipStore**: the per-community ledger built from the two
//!
//! # Crash Safety
//!
//! - Log rows are fsynced on append; a torn final line is truncated on replay
//! - Aggregate files use write-to-temp-then-rename with file and directory fsync

use std::io;

use thiserror::Error;

use crate::types::CommunityId;

pub mod atomic;
pub mod counters;
pub mod fsync;
pub mod log;
pub mod store;

pub use atomic::{try_read_json, write_json_atomic};
pub use counters::{COUNTERS_SCHEMA_VERSION, FakeInviteTable};
pub use fsync::{fsync_dir, fsync_file};
pub use log::AttributionLog;
pub use store::{MembershipStore, TOP_INVITERS_LIMIT, validate_path_component};

/// Errors that can occur in the persistence layer.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// On-disk schema version this build does not understand.
    #[error("schema version mismatch: expected {expected}, got {got}")]
    SchemaMismatch { expected: u32, got: u32 },

    /// Identifier unusable as a directory name.
    #[error("invalid path component: {0:?}")]
    InvalidPathComponent(String),

    /// The community's ledger could not be opened.
    #[error("ledger unavailable for community {0}")]
    LedgerUnavailable(CommunityId),
}

/// Result type for persistence operations.
pub type Result<T> = std::result::Result<T, PersistenceError>;
