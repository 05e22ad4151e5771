//! Error types for TallyStore operations
//!
//! Every fallible operation at the I/O or decode boundary returns a
//! [`TrackerError`]. The tracker itself never lets one escape: it logs and
//! folds them into load/save outcomes.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// TallyStore error types with detailed context
#[derive(Debug, Clone, Error)]
pub enum TrackerError {
    /// I/O operation failed
    #[error("I/O error{}: {message} ({kind})", fmt_path(.path))]
    Io {
        /// The file path where the error occurred
        path: Option<PathBuf>,
        /// The underlying I/O error kind
        kind: std::io::ErrorKind,
        /// Human-readable description
        message: String,
    },

    /// Gzip stream could not be produced or decoded
    #[error("Compression error{}: {message}", fmt_path(.path))]
    Compression {
        /// File being read or written, if known
        path: Option<PathBuf>,
        /// Description from the codec
        message: String,
    },

    /// Input ended before a complete tag could be read
    #[error("Truncated tag data at offset {offset}: need {needed} bytes, only {available} available")]
    TruncatedInput {
        /// Bytes required by the current read
        needed: usize,
        /// Bytes left in the input
        available: usize,
        /// Offset where the read started
        offset: usize,
    },

    /// Tag id outside the known range
    #[error("Unknown tag id {id} at offset {offset}")]
    UnknownTag {
        /// The id byte found
        id: u8,
        /// Offset of the id byte
        offset: usize,
    },

    /// Compounds/lists nested deeper than the decoder allows
    #[error("Tag nesting exceeds depth limit of {limit}")]
    NestingTooDeep {
        /// Configured limit
        limit: usize,
    },

    /// Tag name or string payload is not valid UTF-8
    #[error("Invalid string data at offset {offset}")]
    InvalidString {
        /// Offset of the string payload
        offset: usize,
    },

    /// Array or list length prefix is negative
    #[error("Negative length {length} at offset {offset}")]
    NegativeLength {
        /// Length read from the input
        length: i32,
        /// Offset of the length prefix
        offset: usize,
    },

    /// A list contains tags of different types
    #[error("List element type mismatch: expected tag id {expected}, found {found}")]
    MixedList {
        /// Element type of the first item
        expected: u8,
        /// Element type of the offending item
        found: u8,
    },

    /// String or collection too large for its length prefix
    #[error("Tag {component} too large: {entry_size} exceeds limit of {max_size}")]
    OversizedEntry {
        /// Size of the oversized item
        entry_size: u64,
        /// Maximum the length prefix can express
        max_size: u64,
        /// Which part was oversized ("string", "list", "array")
        component: String,
    },

    /// The document root is not a compound tag
    #[error("Root tag must be a compound, found tag id {found}")]
    RootNotCompound {
        /// Tag id found at the root
        found: u8,
    },

    /// Bytes remain after the root tag was fully read
    #[error("{count} trailing bytes after root tag")]
    TrailingBytes {
        /// Number of unread bytes
        count: usize,
    },

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    Config(String),
}

fn fmt_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" in {}", path.display()),
        None => String::new(),
    }
}

impl TrackerError {
    /// Build an `Io` error carrying the path it happened on.
    pub fn io_at(path: &Path, err: &std::io::Error, what: &str) -> Self {
        TrackerError::Io {
            path: Some(path.to_path_buf()),
            kind: err.kind(),
            message: format!("{}: {}", what, err),
        }
    }

    /// True for errors raised while parsing a tag tree or gzip stream.
    pub fn is_decode_error(&self) -> bool {
        !matches!(self, TrackerError::Io { .. } | TrackerError::Config(_))
    }
}

/// Convert std::io::Error to TrackerError::Io
impl From<std::io::Error> for TrackerError {
    fn from(err: std::io::Error) -> Self {
        TrackerError::Io {
            path: None,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for TallyStore operations
pub type TrackerResult<T> = Result<T, TrackerError>;
