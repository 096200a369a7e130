//! Split large files into byte-range chunk artifacts and reconstruct them.
//!
//! A source file is divided into `[start, end)` ranges of a configured size.
//! Each range is stored as its own file named `<start>_<end>` inside a
//! directory derived from the source's SHA-256 digest, and written at its
//! offset into a reconstructed copy. Re-running an upload skips artifacts
//! that already exist, so an interrupted run can be resumed.

pub mod config;
pub mod error;
pub mod upload;

pub use config::{ChunkConfig, ChunkSize, SmallFilePolicy};
pub use error::{ChunkError, Result};
pub use upload::chunker::{plan, ChunkPlan, ChunkRange, FileChunker};
pub use upload::storage_manager::{ArtifactAction, ArtifactRecord, ChunkWriter, WriteSummary};
pub use upload::{UploadOutcome, UploadReport, UploadSession};
