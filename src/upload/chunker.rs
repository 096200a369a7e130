use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::config::{ChunkConfig, ChunkSize};
use crate::error::{ChunkError, Result};

/// Half-open byte range `[start, end)` of the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkRange {
    pub start: u64,
    pub end: u64,
}

impl ChunkRange {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// File name of the artifact holding this range.
    pub fn artifact_name(&self) -> String {
        format!("{}_{}", self.start, self.end)
    }
}

impl fmt::Display for ChunkRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Ordered, gap-free ranges covering a file.
///
/// Empty when the file is at or below the small-file threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    file_size: u64,
    chunk_size: ChunkSize,
    ranges: Vec<ChunkRange>,
}

impl ChunkPlan {
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn chunk_size(&self) -> ChunkSize {
        self.chunk_size
    }

    pub fn ranges(&self) -> &[ChunkRange] {
        &self.ranges
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Largest range in the plan, used to size read buffers.
    pub fn max_range_len(&self) -> u64 {
        self.ranges.iter().map(ChunkRange::len).max().unwrap_or(0)
    }
}

impl<'a> IntoIterator for &'a ChunkPlan {
    type Item = &'a ChunkRange;
    type IntoIter = std::slice::Iter<'a, ChunkRange>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranges.iter()
    }
}

/// Split `file_size` bytes into ranges of at most `chunk_size` bytes.
///
/// Files no larger than `small_file_threshold` produce an empty plan.
pub fn plan(file_size: u64, chunk_size: ChunkSize, small_file_threshold: u64) -> ChunkPlan {
    let step = chunk_size.get();
    let ranges = if file_size <= small_file_threshold {
        Vec::new()
    } else {
        let count = file_size.div_ceil(step);
        (0..count)
            .map(|i| {
                let start = step * i;
                let end = start.saturating_add(step).min(file_size);
                ChunkRange { start, end }
            })
            .collect()
    };

    ChunkPlan {
        file_size,
        chunk_size,
        ranges,
    }
}

/// Chunker bound to one source file. The plan is computed on demand and
/// queries that depend on it fail until it has been.
#[derive(Debug)]
pub struct FileChunker {
    file_size: u64,
    chunk_size: ChunkSize,
    small_file_threshold: u64,
    plan: Option<ChunkPlan>,
}

impl FileChunker {
    pub fn load<P: AsRef<Path>>(path: P, config: &ChunkConfig) -> Result<Self> {
        let path = path.as_ref();
        let metadata = fs::metadata(path).map_err(|e| {
            ChunkError::InvalidInput(format!("cannot read source {path:?}: {e}"))
        })?;
        if !metadata.is_file() {
            return Err(ChunkError::InvalidInput(format!(
                "source {path:?} is not a regular file"
            )));
        }

        Ok(Self {
            file_size: metadata.len(),
            chunk_size: config.chunk_size,
            small_file_threshold: config.small_file_threshold,
            plan: None,
        })
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn chunk_size(&self) -> ChunkSize {
        self.chunk_size
    }

    /// Replace the chunk size. Any previously computed plan is discarded.
    pub fn set_chunk_size(&mut self, chunk_size: ChunkSize) {
        self.chunk_size = chunk_size;
        self.plan = None;
    }

    pub fn plan(&mut self) -> &ChunkPlan {
        let plan = plan(self.file_size, self.chunk_size, self.small_file_threshold);
        self.plan.insert(plan)
    }

    pub fn current_plan(&self) -> Result<&ChunkPlan> {
        self.plan
            .as_ref()
            .ok_or(ChunkError::State("chunk plan requested before planning"))
    }

    pub fn chunk_count(&self) -> Result<usize> {
        self.current_plan().map(ChunkPlan::len)
    }
}
