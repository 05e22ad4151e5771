//! DataTracker: counter store + persistence for one storage root.
//!
//! **Read path**: counters are served straight from the in-memory store
//! **Write path**: increments mark the store dirty; `save()` commits the
//! whole state through the atomic rename pattern and only then clears dirty
//! **Failure policy**: every I/O or decode error stops here. It is logged
//! and reported as a [`LoadOutcome`]/[`SaveOutcome`], never propagated.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::TrackerConfig;
use crate::error::{TrackerError, TrackerResult};
use crate::persist::{self, DataFiles, ExistingFile, WriteStats};
use crate::store::{CounterStore, DimensionEvent, DimensionId, PlayerEvent, PlayerId};

/// A tracker shared between the host thread and the autosave thread.
///
/// `save` runs with the lock held, including any durable sync.
pub type SharedTracker = Arc<Mutex<DataTracker>>;

/// What `read_from_disk` did.
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    /// Tracking is disabled; nothing was read and the store was not touched
    Disabled,
    /// Neither the canonical nor the legacy file exists
    FirstRun,
    /// State hydrated from `path`
    Loaded { path: PathBuf, legacy: bool },
    /// The file exists but could not be read or decoded; the store is empty
    Failed { path: PathBuf, error: TrackerError },
}

/// What `save` did.
#[derive(Debug, Clone)]
pub enum SaveOutcome {
    /// Tracking is disabled; nothing was written
    Disabled,
    /// Nothing changed since the last successful write
    Clean,
    /// `read_from_disk` has not run yet, so there is nowhere to write
    NoDataRoot,
    /// Committed to disk; the store is clean
    Written(WriteStats),
    /// Write abandoned; the store stays dirty so the next save retries
    Failed(TrackerError),
}

impl SaveOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, SaveOutcome::Written(_))
    }
}

/// Lifetime I/O statistics for one tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerStats {
    /// Successful commits
    pub writes_completed: u64,
    /// Commits abandoned after an error
    pub writes_failed: u64,
    /// Files successfully hydrated
    pub loads_completed: u64,
    /// Files that existed but failed to load
    pub loads_failed: u64,
}

/// Counter store bound to an on-disk location.
///
/// Starts Uninitialized (no data root). `read_from_disk` binds it to a
/// storage root; after that any number of `save` calls commit the state.
#[derive(Debug)]
pub struct DataTracker {
    store: CounterStore,
    files: Option<DataFiles>,
    config: TrackerConfig,
    stats: TrackerStats,
}

impl DataTracker {
    /// Create an empty, unbound tracker.
    pub fn new(config: TrackerConfig) -> TrackerResult<Self> {
        config.validate()?;
        Ok(Self {
            store: CounterStore::new(),
            files: None,
            config,
            stats: TrackerStats::default(),
        })
    }

    /// Wrap in `Arc<Mutex<_>>` for use across threads.
    pub fn into_shared(self) -> SharedTracker {
        Arc::new(Mutex::new(self))
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enable_data_tracking
    }

    /// Storage paths, once bound by `read_from_disk`.
    pub fn data_files(&self) -> Option<&DataFiles> {
        self.files.as_ref()
    }

    pub fn store(&self) -> &CounterStore {
        &self.store
    }

    pub fn is_dirty(&self) -> bool {
        self.store.is_dirty()
    }

    pub fn stats(&self) -> TrackerStats {
        self.stats
    }

    /// Bind to `root` and hydrate from the tracker file under it.
    ///
    /// With tracking disabled this does nothing. Otherwise counters are
    /// cleared first, then filled from `data_tracker.nbt`, or from the
    /// legacy `dim_loads.nbt` when only that exists. The legacy file is
    /// never renamed or rewritten.
    pub fn read_from_disk(&mut self, root: &Path) -> LoadOutcome {
        if !self.is_enabled() {
            debug!(root = %root.display(), "Data tracking disabled, skipping tracker file read");
            return LoadOutcome::Disabled;
        }

        self.store.clear();
        let files = DataFiles::new(root, &self.config.namespace)
            .with_compression_level(self.config.compression_level);
        let existing = files.locate_existing();
        self.files = Some(files);

        let Some(ExistingFile { path, legacy }) = existing else {
            debug!(root = %root.display(), "No tracker file yet, starting empty");
            return LoadOutcome::FirstRun;
        };

        match persist::read_state(&path) {
            Ok(state) => {
                self.store.replace_state(state);
                self.stats.loads_completed += 1;
                info!(
                    path = %path.display(),
                    legacy,
                    players = self.store.player_count(),
                    server_starts = self.store.server_start_count(),
                    "Loaded tracker data"
                );
                LoadOutcome::Loaded { path, legacy }
            }
            Err(error) => {
                self.stats.loads_failed += 1;
                warn!(path = %path.display(), error = %error, "Failed to read tracker data, starting empty");
                LoadOutcome::Failed { path, error }
            }
        }
    }

    /// Commit the state if it is dirty and tracking is enabled.
    pub fn save(&mut self) -> SaveOutcome {
        if !self.is_enabled() {
            return SaveOutcome::Disabled;
        }
        if !self.store.is_dirty() {
            return SaveOutcome::Clean;
        }
        let Some(files) = self.files.as_ref() else {
            debug!("Tracker has no data root yet, deferring save");
            return SaveOutcome::NoDataRoot;
        };

        match files.write_atomic(self.store.state(), self.config.durable_writes) {
            Ok(stats) => {
                self.store.mark_clean();
                self.stats.writes_completed += 1;
                debug!(path = %stats.path.display(), bytes = stats.bytes, "Wrote tracker data");
                SaveOutcome::Written(stats)
            }
            Err(error) => {
                self.stats.writes_failed += 1;
                warn!(dir = %files.dir().display(), error = %error, "Failed to write tracker data");
                SaveOutcome::Failed(error)
            }
        }
    }

    // -- counters --------------------------------------------------------------

    pub fn record_server_start(&mut self) {
        self.store.record_server_start();
    }

    pub fn server_start_count(&self) -> u32 {
        self.store.server_start_count()
    }

    pub fn record_dimension_load(&mut self, dim: DimensionId) {
        self.store.record_dimension_load(dim);
    }

    pub fn dimension_load_count(&self, dim: DimensionId) -> u32 {
        self.store.dimension_load_count(dim)
    }

    pub fn increment_player_event(&mut self, player: PlayerId, kind: PlayerEvent) {
        self.store.increment_player_event(player, kind);
    }

    pub fn player_event_count(&self, player: &PlayerId, kind: PlayerEvent) -> u32 {
        self.store.player_event_count(player, kind)
    }

    pub fn increment_player_dimension_event(&mut self, player: PlayerId, dim: DimensionId, kind: DimensionEvent) {
        self.store.increment_player_dimension_event(player, dim, kind);
    }

    pub fn player_dimension_event_count(&self, player: &PlayerId, dim: DimensionId, kind: DimensionEvent) -> u32 {
        self.store.player_dimension_event_count(player, dim, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::persist::{DATA_FILE_NAME, LEGACY_FILE_NAME};
    use crate::store::TrackerState;
    use std::fs;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn config() -> TrackerConfig {
        TrackerConfig {
            durable_writes: false,
            autosave_interval: None,
            ..TrackerConfig::default()
        }
    }

    fn loaded_tracker(root: &Path) -> DataTracker {
        let mut tracker = DataTracker::new(config()).unwrap();
        tracker.read_from_disk(root);
        tracker
    }

    fn tracker_dir(root: &Path) -> PathBuf {
        root.join(crate::config::DEFAULT_NAMESPACE)
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad = config().with_namespace("../escape");
        assert!(matches!(DataTracker::new(bad), Err(TrackerError::Config(_))));
    }

    #[test]
    fn test_first_run() {
        let tmp = TempDir::new().unwrap();
        let mut tracker = DataTracker::new(config()).unwrap();
        assert!(tracker.data_files().is_none());

        assert!(matches!(tracker.read_from_disk(tmp.path()), LoadOutcome::FirstRun));
        assert!(tracker.data_files().is_some());
        assert!(tracker.store().state().is_empty());
        assert!(!tracker.is_dirty());
        // Reading never creates the directory
        assert!(!tracker_dir(tmp.path()).exists());
    }

    #[test]
    fn test_dimension_counts_survive_reload() {
        let tmp = TempDir::new().unwrap();
        let mut tracker = loaded_tracker(tmp.path());

        for _ in 0..3 {
            tracker.record_dimension_load(0);
        }
        tracker.record_dimension_load(-1);
        assert!(tracker.save().is_written());
        drop(tracker);

        let mut reloaded = DataTracker::new(config()).unwrap();
        assert!(matches!(
            reloaded.read_from_disk(tmp.path()),
            LoadOutcome::Loaded { legacy: false, .. }
        ));
        assert_eq!(reloaded.dimension_load_count(0), 3);
        assert_eq!(reloaded.dimension_load_count(-1), 1);
        assert_eq!(reloaded.dimension_load_count(7), 0);
        assert!(!reloaded.is_dirty());
    }

    #[test]
    fn test_save_is_noop_when_clean() {
        let tmp = TempDir::new().unwrap();
        let mut tracker = loaded_tracker(tmp.path());

        assert!(matches!(tracker.save(), SaveOutcome::Clean));
        tracker.record_server_start();
        assert!(tracker.save().is_written());
        assert!(matches!(tracker.save(), SaveOutcome::Clean));
        assert_eq!(tracker.stats().writes_completed, 1);
    }

    #[test]
    fn test_save_before_load_defers() {
        let mut tracker = DataTracker::new(config()).unwrap();
        tracker.record_server_start();
        assert!(matches!(tracker.save(), SaveOutcome::NoDataRoot));
        assert!(tracker.is_dirty());
    }

    #[test]
    fn test_disabled_tracking_counts_in_memory_only() {
        let tmp = TempDir::new().unwrap();
        let mut tracker = DataTracker::new(TrackerConfig::disabled()).unwrap();

        assert!(matches!(tracker.read_from_disk(tmp.path()), LoadOutcome::Disabled));
        tracker.record_server_start();
        tracker.record_dimension_load(1);
        let p = Uuid::from_u128(5);
        tracker.increment_player_event(p, PlayerEvent::Respawn);

        assert!(matches!(tracker.save(), SaveOutcome::Disabled));
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
        assert_eq!(tracker.server_start_count(), 1);
        assert_eq!(tracker.dimension_load_count(1), 1);
        assert_eq!(tracker.player_event_count(&p, PlayerEvent::Respawn), 1);
    }

    #[test]
    fn test_legacy_file_fallback_is_read_only() {
        let tmp = TempDir::new().unwrap();
        let dir = tracker_dir(tmp.path());
        fs::create_dir_all(&dir).unwrap();

        let mut legacy_state = TrackerState::default();
        legacy_state.dimension_load_counts.insert(1, 8);
        legacy_state.server_start_count = 2;
        let legacy_bytes = codec::to_bytes(&legacy_state).unwrap();
        fs::write(dir.join(LEGACY_FILE_NAME), &legacy_bytes).unwrap();

        let mut tracker = DataTracker::new(config()).unwrap();
        assert!(matches!(
            tracker.read_from_disk(tmp.path()),
            LoadOutcome::Loaded { legacy: true, .. }
        ));
        assert_eq!(tracker.store().state(), &legacy_state);

        tracker.record_dimension_load(1);
        assert!(tracker.save().is_written());

        // New data goes to the canonical name; the legacy file is untouched
        assert_eq!(fs::read(dir.join(LEGACY_FILE_NAME)).unwrap(), legacy_bytes);
        let saved = persist::read_state(&dir.join(DATA_FILE_NAME)).unwrap();
        assert_eq!(saved.dimension_load_counts[&1], 9);
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let dir = tracker_dir(tmp.path());
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(DATA_FILE_NAME), b"\x1f\x8b\x08 truncated").unwrap();

        let mut tracker = DataTracker::new(config()).unwrap();
        tracker.record_server_start();

        match tracker.read_from_disk(tmp.path()) {
            LoadOutcome::Failed { path, error } => {
                assert_eq!(path, dir.join(DATA_FILE_NAME));
                assert!(error.is_decode_error());
            }
            other => panic!("Expected Failed, got {:?}", other),
        }
        assert!(tracker.store().state().is_empty());
        assert_eq!(tracker.stats().loads_failed, 1);
    }

    /// Gzipped root { "a": List<List<...>> } with `lists` list levels.
    fn write_nested_file(dir: &Path, lists: usize) {
        use crate::format::{self, Compound, Tag};
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut tag = Tag::List(Vec::new());
        for _ in 1..lists {
            tag = Tag::List(vec![tag]);
        }
        let mut root = Compound::new();
        root.insert("a", tag);

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&format::to_bytes(&root).unwrap()).unwrap();
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(DATA_FILE_NAME), encoder.finish().unwrap()).unwrap();
    }

    #[test]
    fn test_deeply_nested_file_loads_on_small_stack() {
        let tmp = TempDir::new().unwrap();
        write_nested_file(&tracker_dir(tmp.path()), crate::format::MAX_DEPTH - 1);

        let root = tmp.path().to_path_buf();
        let outcome = std::thread::Builder::new()
            .stack_size(512 * 1024)
            .spawn(move || DataTracker::new(config()).unwrap().read_from_disk(&root))
            .unwrap()
            .join()
            .unwrap();
        // No DimLoadCounts list: decodes as an empty state
        assert!(matches!(outcome, LoadOutcome::Loaded { legacy: false, .. }));
    }

    #[test]
    fn test_over_nested_file_fails_to_load() {
        let tmp = TempDir::new().unwrap();
        write_nested_file(&tracker_dir(tmp.path()), crate::format::MAX_DEPTH + 8);

        let root = tmp.path().to_path_buf();
        let outcome = std::thread::Builder::new()
            .stack_size(512 * 1024)
            .spawn(move || DataTracker::new(config()).unwrap().read_from_disk(&root))
            .unwrap()
            .join()
            .unwrap();
        match outcome {
            LoadOutcome::Failed { error, .. } => {
                assert!(matches!(error, TrackerError::NestingTooDeep { .. }));
            }
            other => panic!("Expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn test_directory_at_canonical_path_fails_save() {
        let tmp = TempDir::new().unwrap();
        let mut tracker = loaded_tracker(tmp.path());
        tracker.record_server_start();

        // Non-empty directory squatting on the canonical name: the rename and
        // the delete-then-rename fallback both fail
        let canonical = tracker_dir(tmp.path()).join(DATA_FILE_NAME);
        fs::create_dir_all(canonical.join("occupied")).unwrap();

        assert!(matches!(tracker.save(), SaveOutcome::Failed(TrackerError::Io { .. })));
        assert!(tracker.is_dirty());
        assert!(canonical.join("occupied").is_dir());
        assert!(!tracker_dir(tmp.path()).join(crate::persist::TEMP_FILE_NAME).exists());
    }

    #[test]
    fn test_failed_write_keeps_dirty_and_retries() {
        let tmp = TempDir::new().unwrap();
        let mut tracker = loaded_tracker(tmp.path());
        tracker.record_server_start();

        // A plain file where the namespace directory should be
        let dir = tracker_dir(tmp.path());
        fs::write(&dir, b"blocker").unwrap();

        assert!(matches!(tracker.save(), SaveOutcome::Failed(TrackerError::Io { .. })));
        assert!(tracker.is_dirty());
        assert_eq!(tracker.stats().writes_failed, 1);

        fs::remove_file(&dir).unwrap();
        assert!(tracker.save().is_written());
        assert!(!tracker.is_dirty());
        assert_eq!(persist::read_state(&dir.join(DATA_FILE_NAME)).unwrap().server_start_count, 1);
    }

    #[test]
    fn test_reload_discards_unsaved_counts() {
        let tmp = TempDir::new().unwrap();
        let mut tracker = loaded_tracker(tmp.path());
        tracker.record_server_start();
        tracker.save();
        tracker.record_server_start();

        tracker.read_from_disk(tmp.path());
        assert_eq!(tracker.server_start_count(), 1);
        assert!(!tracker.is_dirty());
    }

    #[test]
    fn test_world_change_rebinds_root() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let mut tracker = loaded_tracker(first.path());
        tracker.record_dimension_load(0);
        tracker.save();

        assert!(matches!(tracker.read_from_disk(second.path()), LoadOutcome::FirstRun));
        assert_eq!(tracker.dimension_load_count(0), 0);
        tracker.record_dimension_load(2);
        tracker.save();

        let a = persist::read_state(&tracker_dir(first.path()).join(DATA_FILE_NAME)).unwrap();
        let b = persist::read_state(&tracker_dir(second.path()).join(DATA_FILE_NAME)).unwrap();
        assert_eq!(a.dimension_load_counts.get(&2), None);
        assert_eq!(b.dimension_load_counts.get(&0), None);
        assert_eq!(b.dimension_load_counts[&2], 1);
    }

    #[test]
    fn test_player_scenario_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let p = Uuid::from_u128(0x1234_5678_9ABC_DEF0_0FED_CBA9_8765_4321);
        let mut tracker = loaded_tracker(tmp.path());

        tracker.increment_player_event(p, PlayerEvent::Join);
        tracker.increment_player_event(p, PlayerEvent::Death);
        tracker.increment_player_event(p, PlayerEvent::Death);
        tracker.increment_player_dimension_event(p, -1, DimensionEvent::Enter);
        tracker.save();

        let reloaded = loaded_tracker(tmp.path());
        assert_eq!(reloaded.player_event_count(&p, PlayerEvent::Join), 1);
        assert_eq!(reloaded.player_event_count(&p, PlayerEvent::Death), 2);
        assert_eq!(reloaded.player_event_count(&p, PlayerEvent::Quit), 0);
        assert_eq!(reloaded.player_dimension_event_count(&p, -1, DimensionEvent::Enter), 1);
        assert_eq!(reloaded.player_dimension_event_count(&p, -1, DimensionEvent::Leave), 0);
    }
}
