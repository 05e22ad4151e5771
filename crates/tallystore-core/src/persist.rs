//! Persistence: locating, reading and atomically replacing the tracker file.
//!
//! Files live under `<root>/<namespace>/`:
//!   data_tracker.nbt      canonical file
//!   data_tracker.nbt.tmp  staging file for the next commit
//!   dim_loads.nbt         legacy name, read-only fallback
//!
//! Writes use the atomic rename pattern:
//! 1. Encode the state and write it to the staging file
//! 2. durable_sync the staging file (optional)
//! 3. Rename staging over canonical
//! 4. Sync the directory so the rename itself is persisted (optional)
//!
//! If the process dies at any point:
//! - Before rename: canonical file untouched, staging file orphaned (harmless,
//!   the next commit truncates it)
//! - After rename: canonical file is the new complete state

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::codec;
use crate::error::{TrackerError, TrackerResult};
use crate::platform_durability::{durable_sync, sync_directory};
use crate::store::TrackerState;

/// Canonical tracker file name
pub const DATA_FILE_NAME: &str = "data_tracker.nbt";

/// Staging file name, always in the same directory as the canonical file
pub const TEMP_FILE_NAME: &str = "data_tracker.nbt.tmp";

/// File name used by older releases; read when the canonical file is missing
pub const LEGACY_FILE_NAME: &str = "dim_loads.nbt";

/// Which file `locate_existing` found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingFile {
    pub path: PathBuf,
    pub legacy: bool,
}

/// Result of a completed commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteStats {
    /// Canonical path now holding the state
    pub path: PathBuf,
    /// Compressed size in bytes
    pub bytes: u64,
}

/// Paths for one storage root + namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFiles {
    dir: PathBuf,
    compression_level: u32,
}

impl DataFiles {
    pub fn new(root: &Path, namespace: &str) -> Self {
        Self {
            dir: root.join(namespace),
            compression_level: codec::DEFAULT_COMPRESSION_LEVEL,
        }
    }

    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level;
        self
    }

    /// Directory holding all tracker files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn canonical_path(&self) -> PathBuf {
        self.dir.join(DATA_FILE_NAME)
    }

    pub fn temp_path(&self) -> PathBuf {
        self.dir.join(TEMP_FILE_NAME)
    }

    pub fn legacy_path(&self) -> PathBuf {
        self.dir.join(LEGACY_FILE_NAME)
    }

    /// The canonical file if it is a regular file, else the legacy file if
    /// that is, else `None` (first run).
    pub fn locate_existing(&self) -> Option<ExistingFile> {
        let canonical = self.canonical_path();
        if canonical.is_file() {
            return Some(ExistingFile { path: canonical, legacy: false });
        }
        let legacy = self.legacy_path();
        if legacy.is_file() {
            return Some(ExistingFile { path: legacy, legacy: true });
        }
        None
    }

    /// Create the tracker directory if needed.
    pub fn ensure_dir(&self) -> TrackerResult<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| TrackerError::io_at(&self.dir, &e, "Failed to create tracker directory"))
    }

    /// Encode `state` into the staging file and close it.
    ///
    /// Returns the staging path and its size. The canonical file is not
    /// touched; call [`DataFiles::commit_temp`] to publish.
    pub fn write_temp(&self, state: &TrackerState, durable: bool) -> TrackerResult<(PathBuf, u64)> {
        let temp = self.temp_path();
        let bytes = codec::to_bytes_with_level(state, self.compression_level).map_err(|e| with_path(e, &temp))?;

        let mut file = File::create(&temp)
            .map_err(|e| TrackerError::io_at(&temp, &e, "Failed to create staging file"))?;
        file.write_all(&bytes)
            .map_err(|e| TrackerError::io_at(&temp, &e, "Failed to write staging file"))?;
        file.flush()
            .map_err(|e| TrackerError::io_at(&temp, &e, "Failed to flush staging file"))?;
        if durable {
            durable_sync(&file)
                .map_err(|e| TrackerError::io_at(&temp, &e, "Failed to sync staging file"))?;
        }
        drop(file);

        Ok((temp, bytes.len() as u64))
    }

    /// Publish the staging file as the canonical file.
    ///
    /// `fs::rename` replaces an existing target atomically on unix and on
    /// Windows. Targets that refuse replacement are removed first and the
    /// rename retried.
    pub fn commit_temp(&self, durable: bool) -> TrackerResult<PathBuf> {
        let temp = self.temp_path();
        let canonical = self.canonical_path();

        if let Err(first) = fs::rename(&temp, &canonical) {
            if !canonical.exists() || !temp.is_file() {
                return Err(TrackerError::io_at(&canonical, &first, "Failed to rename staging file"));
            }
            match fs::remove_file(&canonical) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(TrackerError::io_at(&canonical, &e, "Failed to remove previous tracker file"));
                }
            }
            fs::rename(&temp, &canonical)
                .map_err(|e| TrackerError::io_at(&canonical, &e, "Failed to rename staging file"))?;
        }

        if durable {
            sync_directory(&self.dir)
                .map_err(|e| TrackerError::io_at(&self.dir, &e, "Failed to sync tracker directory"))?;
        }
        Ok(canonical)
    }

    /// Full write: ensure directory, stage, commit.
    ///
    /// On failure the staging file is removed (best effort) and the
    /// canonical file is left exactly as it was.
    pub fn write_atomic(&self, state: &TrackerState, durable: bool) -> TrackerResult<WriteStats> {
        self.ensure_dir()?;

        let result = self
            .write_temp(state, durable)
            .and_then(|(_, bytes)| self.commit_temp(durable).map(|path| WriteStats { path, bytes }));

        if result.is_err() {
            let _ = fs::remove_file(self.temp_path());
        }
        result
    }
}

/// Read and decode a tracker file.
pub fn read_state(path: &Path) -> TrackerResult<TrackerState> {
    let data = fs::read(path).map_err(|e| TrackerError::io_at(path, &e, "Failed to read tracker file"))?;
    codec::from_bytes(&data).map_err(|e| with_path(e, path))
}

/// Attach a file path to codec errors that were raised on a bare buffer.
fn with_path(err: TrackerError, path: &Path) -> TrackerError {
    match err {
        TrackerError::Compression { path: None, message } => TrackerError::Compression {
            path: Some(path.to_path_buf()),
            message,
        },
        TrackerError::Io { path: None, kind, message } => TrackerError::Io {
            path: Some(path.to_path_buf()),
            kind,
            message,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_state(starts: u32) -> TrackerState {
        let mut state = TrackerState::default();
        state.server_start_count = starts;
        state.dimension_load_counts.insert(0, starts * 2);
        state
    }

    #[test]
    fn test_paths() {
        let files = DataFiles::new(Path::new("/worlds/alpha"), "tallystore");
        assert_eq!(files.dir(), Path::new("/worlds/alpha/tallystore"));
        assert_eq!(files.canonical_path(), Path::new("/worlds/alpha/tallystore/data_tracker.nbt"));
        assert_eq!(files.temp_path(), Path::new("/worlds/alpha/tallystore/data_tracker.nbt.tmp"));
        assert_eq!(files.legacy_path(), Path::new("/worlds/alpha/tallystore/dim_loads.nbt"));
    }

    #[test]
    fn test_locate_prefers_canonical() {
        let tmp = TempDir::new().unwrap();
        let files = DataFiles::new(tmp.path(), "ns");
        assert_eq!(files.locate_existing(), None);

        files.ensure_dir().unwrap();
        fs::write(files.legacy_path(), b"legacy").unwrap();
        assert_eq!(
            files.locate_existing(),
            Some(ExistingFile { path: files.legacy_path(), legacy: true })
        );

        fs::write(files.canonical_path(), b"current").unwrap();
        assert_eq!(
            files.locate_existing(),
            Some(ExistingFile { path: files.canonical_path(), legacy: false })
        );
    }

    #[test]
    fn test_canonical_directory_is_not_a_file() {
        let tmp = TempDir::new().unwrap();
        let files = DataFiles::new(tmp.path(), "ns");
        fs::create_dir_all(files.canonical_path()).unwrap();
        fs::write(files.legacy_path(), b"legacy").unwrap();
        assert!(files.locate_existing().unwrap().legacy);
    }

    #[test]
    fn test_write_atomic_then_read() {
        let tmp = TempDir::new().unwrap();
        let files = DataFiles::new(tmp.path(), "ns");

        let stats = files.write_atomic(&sample_state(3), true).unwrap();
        assert_eq!(stats.path, files.canonical_path());
        assert_eq!(stats.bytes, fs::metadata(&stats.path).unwrap().len());
        assert!(!files.temp_path().exists());

        assert_eq!(read_state(&files.canonical_path()).unwrap(), sample_state(3));
    }

    #[test]
    fn test_commit_replaces_previous_file() {
        let tmp = TempDir::new().unwrap();
        let files = DataFiles::new(tmp.path(), "ns");

        files.write_atomic(&sample_state(1), false).unwrap();
        files.write_atomic(&sample_state(2), false).unwrap();
        assert_eq!(read_state(&files.canonical_path()).unwrap(), sample_state(2));
    }

    #[test]
    fn test_staged_but_uncommitted_leaves_canonical_intact() {
        let tmp = TempDir::new().unwrap();
        let files = DataFiles::new(tmp.path(), "ns");
        files.write_atomic(&sample_state(1), false).unwrap();
        let before = fs::read(files.canonical_path()).unwrap();

        // Process dies after the staging file is complete, before rename
        files.write_temp(&sample_state(99), true).unwrap();

        assert_eq!(fs::read(files.canonical_path()).unwrap(), before);
        assert_eq!(read_state(&files.canonical_path()).unwrap(), sample_state(1));
        assert_eq!(read_state(&files.temp_path()).unwrap(), sample_state(99));
    }

    #[test]
    fn test_orphaned_staging_file_is_overwritten() {
        let tmp = TempDir::new().unwrap();
        let files = DataFiles::new(tmp.path(), "ns");
        files.ensure_dir().unwrap();
        fs::write(files.temp_path(), vec![0xAB; 4096]).unwrap();

        files.write_atomic(&sample_state(5), false).unwrap();
        assert_eq!(read_state(&files.canonical_path()).unwrap(), sample_state(5));
        assert!(!files.temp_path().exists());
    }

    #[test]
    fn test_commit_without_staging_file_fails() {
        let tmp = TempDir::new().unwrap();
        let files = DataFiles::new(tmp.path(), "ns");
        files.ensure_dir().unwrap();
        assert!(matches!(files.commit_temp(false), Err(TrackerError::Io { .. })));
    }

    #[test]
    fn test_commit_fallback_fails_on_directory_target() {
        let tmp = TempDir::new().unwrap();
        let files = DataFiles::new(tmp.path(), "ns");
        fs::create_dir_all(files.canonical_path().join("occupied")).unwrap();

        // rename refuses the directory target and remove_file cannot clear it
        let err = files.write_atomic(&sample_state(4), false).unwrap_err();
        match err {
            TrackerError::Io { path, .. } => assert_eq!(path, Some(files.canonical_path())),
            other => panic!("Expected Io error, got {:?}", other),
        }
        assert!(files.canonical_path().join("occupied").is_dir());
        assert!(!files.temp_path().exists());
    }

    #[test]
    fn test_ensure_dir_fails_when_blocked_by_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("ns"), b"not a directory").unwrap();
        let files = DataFiles::new(tmp.path(), "ns");

        let err = files.write_atomic(&sample_state(1), false).unwrap_err();
        match err {
            TrackerError::Io { path, .. } => assert_eq!(path, Some(tmp.path().join("ns"))),
            other => panic!("Expected Io error, got {:?}", other),
        }
    }

    #[test]
    fn test_read_missing_file() {
        let tmp = TempDir::new().unwrap();
        let err = read_state(&tmp.path().join("nope.nbt")).unwrap_err();
        assert!(matches!(err, TrackerError::Io { kind: ErrorKind::NotFound, .. }));
    }

    #[test]
    fn test_read_corrupt_file_reports_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data_tracker.nbt");
        fs::write(&path, b"garbage").unwrap();

        match read_state(&path).unwrap_err() {
            TrackerError::Compression { path: Some(p), .. } => assert_eq!(p, path),
            other => panic!("Expected Compression error, got {:?}", other),
        }
    }
}
