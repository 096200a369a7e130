//! Chunk artifact storage.
//!
//! [`ChunkWriter`] performs one pass over a [`ChunkPlan`]: every range is read
//! from the source, written at its offset into the reconstructed file, and
//! stored as a standalone artifact named `<start>_<end>` in the destination
//! directory. Artifacts that already exist are treated as already uploaded
//! and left alone unless the writer runs in overwrite mode.

use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::chunker::{ChunkPlan, ChunkRange};
use super::file_operations;
use crate::error::{ChunkError, Result};

/// What happened to an artifact during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactAction {
    Written,
    /// Artifact already existed and was left untouched.
    Skipped,
    /// Artifact already existed and was deleted then recreated.
    Overwritten,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactRecord {
    pub range: ChunkRange,
    pub path: PathBuf,
    pub action: ArtifactAction,
}

/// Outcome of a completed write pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WriteSummary {
    pub artifacts: Vec<ArtifactRecord>,
    pub bytes_reconstructed: u64,
}

impl WriteSummary {
    pub fn count(&self, action: ArtifactAction) -> usize {
        self.artifacts.iter().filter(|a| a.action == action).count()
    }

    /// Paths of artifacts whose content was written during this run.
    pub fn written_paths(&self) -> impl Iterator<Item = &Path> {
        self.artifacts
            .iter()
            .filter(|a| a.action != ArtifactAction::Skipped)
            .map(|a| a.path.as_path())
    }
}

/// Writes chunk artifacts and the reconstructed copy for one source file.
#[derive(Debug, Clone)]
pub struct ChunkWriter {
    destination_dir: PathBuf,
    reconstructed_path: PathBuf,
    overwrite: bool,
}

impl ChunkWriter {
    pub fn new(
        destination_dir: impl Into<PathBuf>,
        reconstructed_path: impl Into<PathBuf>,
        overwrite: bool,
    ) -> Self {
        Self {
            destination_dir: destination_dir.into(),
            reconstructed_path: reconstructed_path.into(),
            overwrite,
        }
    }

    pub fn artifact_path(&self, range: ChunkRange) -> PathBuf {
        self.destination_dir.join(range.artifact_name())
    }

    /// Run the plan against `source`, in plan order.
    ///
    /// # Errors
    ///
    /// The first failure aborts the run. Failures inside the range loop are
    /// wrapped in [`ChunkError::AtRange`]. Artifacts and reconstructed bytes
    /// written before the failure stay on disk.
    pub fn write<P: AsRef<Path>>(&self, source: P, plan: &ChunkPlan) -> Result<WriteSummary> {
        let source = source.as_ref();
        file_operations::ensure_dir(&self.destination_dir)?;

        let mut source_file =
            File::open(source).map_err(|e| ChunkError::fs("open source", source, e))?;
        let mut output = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.reconstructed_path)
            .map_err(|e| ChunkError::fs("open destination", &self.reconstructed_path, e))?;

        info!(
            "Writing {} chunks of {:?} into {:?}",
            plan.len(),
            source,
            self.destination_dir
        );

        let capacity = usize::try_from(plan.max_range_len()).map_err(|_| {
            ChunkError::InvalidConfiguration(format!(
                "chunk of {} bytes does not fit in memory",
                plan.max_range_len()
            ))
        })?;
        let mut buffer = Vec::with_capacity(capacity);
        let mut summary = WriteSummary::default();

        for &range in plan {
            let record = self
                .write_range(source, &mut source_file, &mut output, range, &mut buffer)
                .map_err(|e| e.at_range(range))?;
            summary.bytes_reconstructed += range.len();
            summary.artifacts.push(record);
        }

        output
            .sync_all()
            .map_err(|e| ChunkError::fs("sync destination", &self.reconstructed_path, e))?;

        info!(
            "Finished {:?}: {} written, {} skipped, {} overwritten",
            source,
            summary.count(ArtifactAction::Written),
            summary.count(ArtifactAction::Skipped),
            summary.count(ArtifactAction::Overwritten)
        );
        Ok(summary)
    }

    fn write_range(
        &self,
        source: &Path,
        source_file: &mut File,
        output: &mut File,
        range: ChunkRange,
        buffer: &mut Vec<u8>,
    ) -> Result<ArtifactRecord> {
        debug!("Processing chunk {}", range);
        read_range(source_file, source, range, buffer)?;

        output
            .seek(SeekFrom::Start(range.start))
            .and_then(|_| output.write_all(buffer))
            .map_err(|e| ChunkError::fs("write destination", &self.reconstructed_path, e))?;

        let path = self.artifact_path(range);
        let action = store_artifact(&path, buffer, self.overwrite)?;
        match action {
            ArtifactAction::Skipped => debug!("Chunk {:?} already present, skipping", path),
            ArtifactAction::Overwritten => warn!("Replaced existing chunk {:?}", path),
            ArtifactAction::Written => {}
        }

        Ok(ArtifactRecord {
            range,
            path,
            action,
        })
    }
}

/// Fill `buffer` with exactly the bytes of `range`.
fn read_range(file: &mut File, path: &Path, range: ChunkRange, buffer: &mut Vec<u8>) -> Result<()> {
    buffer.clear();
    let actual = file
        .seek(SeekFrom::Start(range.start))
        .and_then(|_| Read::by_ref(file).take(range.len()).read_to_end(buffer))
        .map_err(|e| ChunkError::fs("read source", path, e))? as u64;

    if actual < range.len() {
        return Err(ChunkError::ShortRead {
            expected: range.len(),
            actual,
        });
    }
    Ok(())
}

/// Create the artifact at `path`. Exclusive creation doubles as the
/// existence check, so "already exists" is the skip signal.
fn store_artifact(path: &Path, data: &[u8], overwrite: bool) -> Result<ArtifactAction> {
    match create_artifact(path, data) {
        Ok(()) => Ok(ArtifactAction::Written),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            if !overwrite {
                return Ok(ArtifactAction::Skipped);
            }
            fs::remove_file(path).map_err(|e| ChunkError::fs("delete artifact", path, e))?;
            create_artifact(path, data).map_err(|e| ChunkError::fs("create artifact", path, e))?;
            Ok(ArtifactAction::Overwritten)
        }
        Err(e) => Err(ChunkError::fs("create artifact", path, e)),
    }
}

fn create_artifact(path: &Path, data: &[u8]) -> io::Result<()> {
    let file = OpenOptions::new().write(true).create_new(true).open(path)?;
    fill_artifact(path, file, data)
}

/// A partially written artifact is removed so a later run does not skip it.
fn fill_artifact<W: Write>(path: &Path, mut out: W, data: &[u8]) -> io::Result<()> {
    let written = out.write_all(data).and_then(|_| out.flush());
    if let Err(e) = written {
        drop(out);
        if let Err(cleanup) = fs::remove_file(path) {
            warn!("Could not remove partial chunk {:?}: {}", path, cleanup);
        }
        return Err(e);
    }
    Ok(())
}

/// Parse an artifact file name of the form `<start>_<end>`.
pub fn parse_artifact_name(name: &str) -> Option<ChunkRange> {
    let (start, end) = name.split_once('_')?;
    let range = ChunkRange {
        start: start.parse().ok()?,
        end: end.parse().ok()?,
    };
    // Only canonical names: no signs, padding or empty ranges.
    (range.start < range.end && range.artifact_name() == name).then_some(range)
}

/// Artifacts in `dir`, ascending by start offset.
pub fn list_artifacts<P: AsRef<Path>>(dir: P) -> Result<Vec<(ChunkRange, PathBuf)>> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir).map_err(|e| ChunkError::fs("list", dir, e))?;

    let mut artifacts = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ChunkError::fs("list", dir, e))?;
        let is_file = entry
            .file_type()
            .map_err(|e| ChunkError::fs("stat", entry.path(), e))?
            .is_file();
        if !is_file {
            continue;
        }
        if let Some(range) = entry.file_name().to_str().and_then(parse_artifact_name) {
            artifacts.push((range, entry.path()));
        }
    }

    artifacts.sort_by_key(|(range, _)| *range);
    Ok(artifacts)
}

/// Load a chunk by range from the specified directory.
pub fn load_chunk<P: AsRef<Path>>(dir: P, range: ChunkRange) -> Result<Vec<u8>> {
    let path = dir.as_ref().join(range.artifact_name());
    fs::read(&path).map_err(|e| ChunkError::fs("read artifact", path, e))
}

/// Concatenate every artifact in `dir`, in start order, into `output`.
/// Returns the number of bytes written.
pub fn join_artifacts<P: AsRef<Path>, Q: AsRef<Path>>(dir: P, output: Q) -> Result<u64> {
    let output = output.as_ref();
    let artifacts = list_artifacts(dir)?;
    let mut out = File::create(output).map_err(|e| ChunkError::fs("create", output, e))?;

    let mut total = 0;
    for (range, path) in &artifacts {
        let mut chunk = File::open(path).map_err(|e| ChunkError::fs("open artifact", path, e))?;
        total += io::copy(&mut chunk, &mut out)
            .map_err(|e| ChunkError::fs("copy artifact", path, e).at_range(*range))?;
    }
    out.flush().map_err(|e| ChunkError::fs("flush", output, e))?;

    debug!("Joined {} artifacts into {:?}", artifacts.len(), output);
    Ok(total)
}
