//! Configuration for the data tracker
//!
//! The host's own config loader supplies these values; this module only
//! provides presets for common host shapes and validation.

use std::path::{Component, Path};
use std::time::Duration;

use crate::error::{TrackerError, TrackerResult};

/// Subdirectory used under the storage root when none is configured
pub const DEFAULT_NAMESPACE: &str = "tallystore";

/// Tracker configuration with host presets
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Gates both reading and writing the tracker file
    pub enable_data_tracking: bool,
    /// Subdirectory under the storage root holding the tracker file
    pub namespace: String,
    /// Sync the staged file and its directory on every commit
    pub durable_writes: bool,
    /// Gzip level, 0..=9
    pub compression_level: u32,
    /// Background save cadence; `None` leaves saving to the host
    pub autosave_interval: Option<Duration>,
}

impl TrackerConfig {
    /// Dedicated server: durable commits, autosave every 5 minutes
    pub fn dedicated_server() -> Self {
        Self {
            enable_data_tracking: true,
            namespace: DEFAULT_NAMESPACE.to_string(),
            durable_writes: true,
            compression_level: 6,
            autosave_interval: Some(Duration::from_secs(300)),
        }
    }

    /// Integrated (client-hosted) server: cheaper commits, saves more often
    pub fn integrated_server() -> Self {
        Self {
            enable_data_tracking: true,
            namespace: DEFAULT_NAMESPACE.to_string(),
            durable_writes: false,
            compression_level: 6,
            autosave_interval: Some(Duration::from_secs(60)),
        }
    }

    /// Tracking switched off: counters live in memory only
    pub fn disabled() -> Self {
        Self {
            enable_data_tracking: false,
            autosave_interval: None,
            ..Self::dedicated_server()
        }
    }

    /// Override the namespace directory.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> TrackerResult<()> {
        let mut components = Path::new(&self.namespace).components();
        let single_normal = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if self.namespace.is_empty() || !single_normal {
            return Err(TrackerError::Config(format!(
                "namespace must be a single directory name, got '{}'",
                self.namespace
            )));
        }
        if self.compression_level > 9 {
            return Err(TrackerError::Config(format!(
                "compression_level must be in [0, 9], got {}",
                self.compression_level
            )));
        }
        if let Some(interval) = self.autosave_interval {
            if interval.as_millis() == 0 {
                return Err(TrackerError::Config("autosave_interval must be > 0".into()));
            }
        }
        Ok(())
    }
}

impl Default for TrackerConfig {
    fn default() -> Self { Self::dedicated_server() }
}
