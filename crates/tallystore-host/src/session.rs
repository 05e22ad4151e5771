//! `WorldSession`: tracker lifetime for one loaded world.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use tallystore_core::{
    start_autosave, AutosaveHandle, DataTracker, DimensionEvent, DimensionId, LoadOutcome, PlayerEvent,
    PlayerId, SaveOutcome, SharedTracker, TrackerConfig, TrackerResult,
};

use crate::hooks::LifecycleHooks;
use crate::query::TrackerQuery;

/// Owns the tracker for one world.
///
/// `open` constructs a tracker, binds it to the world's storage root and
/// starts autosave when configured. `close` (or drop) stops autosave and
/// performs a final save. Loading another world means opening a new
/// session.
pub struct WorldSession {
    tracker: SharedTracker,
    autosave: Option<AutosaveHandle>,
    root: PathBuf,
    load: LoadOutcome,
    closed: bool,
}

impl WorldSession {
    /// Open a session for the world stored under `root`.
    ///
    /// Only configuration errors and thread spawn failures are returned;
    /// problems with the tracker file are reported through
    /// [`WorldSession::load_outcome`].
    pub fn open<P: AsRef<Path>>(root: P, config: TrackerConfig) -> TrackerResult<Self> {
        let root = root.as_ref().to_path_buf();
        let autosave_interval = config.autosave_interval;
        let enabled = config.enable_data_tracking;

        let mut tracker = DataTracker::new(config)?;
        let load = tracker.read_from_disk(&root);
        let tracker = tracker.into_shared();

        let autosave = match autosave_interval {
            Some(cadence) if enabled => Some(start_autosave(Arc::clone(&tracker), cadence)?),
            _ => None,
        };

        info!(root = %root.display(), enabled, autosave = autosave.is_some(), "Opened tracker session");
        Ok(Self {
            tracker,
            autosave,
            root,
            load,
            closed: false,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Result of the initial `read_from_disk`.
    pub fn load_outcome(&self) -> &LoadOutcome {
        &self.load
    }

    /// The shared tracker, for hosts that dispatch events from other threads.
    pub fn tracker(&self) -> &SharedTracker {
        &self.tracker
    }

    pub fn has_autosave(&self) -> bool {
        self.autosave.is_some()
    }

    /// Save now (for example on the host's own world-save event).
    pub fn save(&self) -> SaveOutcome {
        self.tracker.lock().save()
    }

    /// Stop autosave and perform the final save.
    ///
    /// The outcome is final: dropping the closed session does not save again.
    pub fn close(mut self) -> SaveOutcome {
        let outcome = self.shutdown();
        self.closed = true;
        outcome
    }

    fn shutdown(&mut self) -> SaveOutcome {
        if let Some(handle) = self.autosave.take() {
            handle.shutdown();
        }
        let outcome = self.save();
        if let SaveOutcome::Failed(error) = &outcome {
            warn!(root = %self.root.display(), error = %error, "Tracker data not saved on session close");
        }
        outcome
    }
}

impl Drop for WorldSession {
    fn drop(&mut self) {
        if !self.closed {
            self.shutdown();
        }
    }
}

impl LifecycleHooks for WorldSession {
    fn on_server_start(&mut self) {
        self.tracker.on_server_start();
    }

    fn on_dimension_load(&mut self, dim: DimensionId) {
        self.tracker.on_dimension_load(dim);
    }

    fn on_player_event(&mut self, player: PlayerId, kind: PlayerEvent) {
        self.tracker.on_player_event(player, kind);
    }

    fn on_player_dimension_event(&mut self, player: PlayerId, dim: DimensionId, kind: DimensionEvent) {
        self.tracker.on_player_dimension_event(player, dim, kind);
    }
}

impl TrackerQuery for WorldSession {
    fn server_starts(&self) -> u32 {
        self.tracker.server_starts()
    }

    fn dimension_loads(&self, dim: DimensionId) -> u32 {
        self.tracker.dimension_loads(dim)
    }

    fn player_events(&self, player: &PlayerId, kind: PlayerEvent) -> u32 {
        self.tracker.player_events(player, kind)
    }

    fn player_dimension_events(&self, player: &PlayerId, dim: DimensionId, kind: DimensionEvent) -> u32 {
        self.tracker.player_dimension_events(player, dim, kind)
    }
}
