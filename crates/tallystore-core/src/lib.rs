//! TallyStore Core: crash-safe lifecycle event counters
//!
//! Counts server starts, dimension loads and per-player events in memory,
//! and persists the whole state to a single gzip-compressed tag-tree file.
//!
//! # Architecture
//!
//! - **Counter store**: plain in-memory maps plus a dirty flag, no I/O
//! - **Codec**: state <-> named tag tree <-> gzip bytes
//! - **Persistence**: stage to `data_tracker.nbt.tmp`, rename over the
//!   canonical file, so the file on disk is always a complete state
//! - **Tracker**: binds a store to a storage root; I/O failures are logged
//!   and reported as outcomes, never propagated into the host
//!
//! # No Host Dependencies
//!
//! This crate knows nothing about game engines or event buses. The host
//! adapter (`tallystore-host`) maps lifecycle callbacks onto the tracker.

pub mod autosave;
pub mod codec;
pub mod config;
pub mod error;
pub mod format;
pub mod persist;
pub mod platform_durability;
pub mod store;
pub mod tracker;

// Re-export key types for convenience
pub use autosave::{start_autosave, AutosaveHandle};
pub use config::TrackerConfig;
pub use error::{TrackerError, TrackerResult};
pub use persist::{DataFiles, WriteStats};
pub use store::{
    CounterStore, DimensionEvent, DimensionId, PlayerEvent, PlayerId, PlayerRecord, TrackerState, UnknownEventKind,
    COUNTER_MAX,
};
pub use tracker::{DataTracker, LoadOutcome, SaveOutcome, SharedTracker, TrackerStats};
