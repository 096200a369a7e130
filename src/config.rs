use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::num::NonZeroU64;
use std::path::Path;

use crate::error::{ChunkError, Result};

pub const MIB: u64 = 1024 * 1024;

/// Chunk size used when none is configured (2 MiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 2 * MIB;

/// Files at or below this size are not chunked unless configured otherwise.
pub const DEFAULT_SMALL_FILE_THRESHOLD: u64 = 2 * MIB;

/// Maximum size of a single chunk in bytes. Always at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct ChunkSize(NonZeroU64);

impl ChunkSize {
    pub fn new(bytes: u64) -> Result<Self> {
        NonZeroU64::new(bytes).map(ChunkSize).ok_or_else(|| {
            ChunkError::InvalidConfiguration(format!("invalid chunk size: {bytes} bytes"))
        })
    }

    /// Chunk size given in mebibytes.
    pub fn from_mib(mib: u64) -> Result<Self> {
        let bytes = mib.checked_mul(MIB).ok_or_else(|| {
            ChunkError::InvalidConfiguration(format!("chunk size of {mib} MiB overflows"))
        })?;
        Self::new(bytes)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl Default for ChunkSize {
    fn default() -> Self {
        const DEFAULT: NonZeroU64 = match NonZeroU64::new(DEFAULT_CHUNK_SIZE) {
            Some(size) => size,
            None => panic!("default chunk size must be non-zero"),
        };
        ChunkSize(DEFAULT)
    }
}

impl TryFrom<u64> for ChunkSize {
    type Error = ChunkError;

    fn try_from(bytes: u64) -> Result<Self> {
        Self::new(bytes)
    }
}

impl From<ChunkSize> for u64 {
    fn from(size: ChunkSize) -> u64 {
        size.get()
    }
}

impl fmt::Display for ChunkSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes", self.get())
    }
}

/// What to do with a file that falls under the small-file threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmallFilePolicy {
    /// Write nothing and report the file as below threshold.
    #[default]
    Skip,
    /// Copy the whole file to the reconstructed path without artifacts.
    CopyWhole,
}

/// Settings for one chunking run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    pub chunk_size: ChunkSize,
    pub small_file_threshold: u64,
    pub small_file_policy: SmallFilePolicy,
    /// Replace artifacts that already exist instead of skipping them.
    pub overwrite: bool,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: ChunkSize::default(),
            small_file_threshold: DEFAULT_SMALL_FILE_THRESHOLD,
            small_file_policy: SmallFilePolicy::default(),
            overwrite: false,
        }
    }
}

impl ChunkConfig {
    pub fn with_chunk_size(mut self, chunk_size: ChunkSize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_small_file_threshold(mut self, threshold: u64) -> Self {
        self.small_file_threshold = threshold;
        self
    }

    pub fn with_small_file_policy(mut self, policy: SmallFilePolicy) -> Self {
        self.small_file_policy = policy;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read(path).map_err(|e| ChunkError::fs("read config", path, e))?;
        Self::from_json_slice(&raw)
    }

    pub fn from_json_slice(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw)
            .map_err(|e| ChunkError::InvalidConfiguration(format!("malformed config: {e}")))
    }
}
