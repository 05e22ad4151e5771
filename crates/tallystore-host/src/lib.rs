//! Host adapter for TallyStore
//!
//! Maps a host's lifecycle callbacks onto the counter store and exposes
//! the counters to other host features.
//!
//! # Architecture
//!
//! - [`LifecycleHooks`]: one method per lifecycle event, each a thin call
//!   into the tracker's increment operations
//! - [`TrackerQuery`]: integer getters for every counter
//! - [`WorldSession`]: owns the tracker for one world. Opening a session
//!   reads the tracker file and starts autosave; closing it saves
//!
//! A host creates a new session per world instead of reusing a global.

pub mod hooks;
pub mod query;
pub mod session;

pub use hooks::LifecycleHooks;
pub use query::TrackerQuery;
pub use session::WorldSession;

pub use tallystore_core::{DimensionEvent, DimensionId, PlayerEvent, PlayerId, TrackerConfig};
