use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::{ChunkConfig, SmallFilePolicy};
use crate::error::{ChunkError, Result};

pub mod chunker;
pub mod file_operations;
pub mod storage_manager;
pub mod utils;

use chunker::FileChunker;
use storage_manager::{ArtifactRecord, ChunkWriter};

/// How a run treated the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadOutcome {
    /// Source was split into artifacts and reconstructed.
    Chunked,
    /// Source is at or below the small-file threshold; nothing was written.
    BelowThreshold,
    /// Source is at or below the small-file threshold and was copied whole.
    CopiedWhole,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadReport {
    pub source: PathBuf,
    pub destination_dir: PathBuf,
    pub reconstructed_path: PathBuf,
    pub content_hash: String,
    pub file_size: u64,
    pub chunk_size: u64,
    pub outcome: UploadOutcome,
    pub chunk_count: usize,
    pub artifacts: Vec<ArtifactRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// One upload of a source file into a content-addressed directory under
/// `save_root`.
#[derive(Debug)]
pub struct UploadSession {
    source: PathBuf,
    save_root: PathBuf,
    save_name: Option<String>,
    config: ChunkConfig,
}

impl UploadSession {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(
        source: P,
        save_root: Q,
        config: ChunkConfig,
    ) -> Result<Self> {
        let source = file_operations::resolve_source(source.as_ref())?;
        let save_root = save_root.as_ref();
        if !save_root.is_dir() {
            return Err(ChunkError::InvalidInput(format!(
                "save dir {save_root:?} does not exist"
            )));
        }

        Ok(Self {
            source,
            save_root: save_root.to_path_buf(),
            save_name: None,
            config,
        })
    }

    /// Use `name` for the reconstructed file instead of a generated one.
    pub fn with_save_name(mut self, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        file_operations::validate_save_name(&name)?;
        self.save_name = Some(name);
        Ok(self)
    }

    pub fn run(&self) -> Result<UploadReport> {
        let started_at = Utc::now();

        let content_hash = utils::hash_file(&self.source)?;
        let destination_dir = self.save_root.join(&content_hash);
        file_operations::ensure_dir(&destination_dir)?;

        let save_name = self
            .save_name
            .clone()
            .unwrap_or_else(|| file_operations::generate_save_name(&self.source));
        let reconstructed_path = destination_dir.join(save_name);

        let mut chunker = FileChunker::load(&self.source, &self.config)?;
        let plan = chunker.plan();
        info!(
            "Upload {:?} ({} bytes) -> {:?}, {} chunks of {}",
            self.source,
            plan.file_size(),
            destination_dir,
            plan.len(),
            plan.chunk_size()
        );

        let (outcome, artifacts) = if plan.is_empty() {
            match self.config.small_file_policy {
                SmallFilePolicy::Skip => {
                    warn!(
                        "{:?} is not larger than {} bytes, nothing written",
                        self.source, self.config.small_file_threshold
                    );
                    (UploadOutcome::BelowThreshold, Vec::new())
                }
                SmallFilePolicy::CopyWhole => {
                    fs::copy(&self.source, &reconstructed_path)
                        .map_err(|e| ChunkError::fs("copy", &reconstructed_path, e))?;
                    info!("Copied {:?} whole to {:?}", self.source, reconstructed_path);
                    (UploadOutcome::CopiedWhole, Vec::new())
                }
            }
        } else {
            let writer =
                ChunkWriter::new(&destination_dir, &reconstructed_path, self.config.overwrite);
            let summary = writer.write(&self.source, plan)?;
            (UploadOutcome::Chunked, summary.artifacts)
        };

        Ok(UploadReport {
            source: self.source.clone(),
            destination_dir,
            reconstructed_path,
            content_hash,
            file_size: chunker.file_size(),
            chunk_size: chunker.chunk_size().get(),
            outcome,
            chunk_count: chunker.chunk_count()?,
            artifacts,
            started_at,
            finished_at: Utc::now(),
        })
    }
}
