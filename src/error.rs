use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::upload::chunker::ChunkRange;

/// Errors produced while planning, writing, or joining chunks.
#[derive(Debug, Error)]
pub enum ChunkError {
    /// Rejected configuration, raised before any planning or I/O.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Malformed or unreadable source.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A filesystem operation failed.
    #[error("failed to {action} {path:?}: {source}")]
    FileSystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The source returned fewer bytes than the planned range holds.
    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: u64, actual: u64 },

    /// Operation invoked before the state it depends on exists.
    #[error("invalid state: {0}")]
    State(&'static str),

    /// Failure while processing a specific range of a run.
    #[error("chunk {range} failed: {source}")]
    AtRange {
        range: ChunkRange,
        #[source]
        source: Box<ChunkError>,
    },
}

impl ChunkError {
    pub(crate) fn fs(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        ChunkError::FileSystem {
            action,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn at_range(self, range: ChunkRange) -> Self {
        ChunkError::AtRange {
            range,
            source: Box::new(self),
        }
    }

    /// The range being processed when the run failed, if any.
    pub fn failed_range(&self) -> Option<ChunkRange> {
        match self {
            ChunkError::AtRange { range, .. } => Some(*range),
            _ => None,
        }
    }

    /// The underlying error with any range context removed.
    pub fn root(&self) -> &ChunkError {
        match self {
            ChunkError::AtRange { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, ChunkError>;
