use rand::Rng;
use std::fs;
use std::path::{Path, PathBuf};

use super::storage_manager::parse_artifact_name;
use crate::error::{ChunkError, Result};

/// Resolves the source path, ensuring it names a readable regular file.
pub fn resolve_source(path: &Path) -> Result<PathBuf> {
    let resolved = fs::canonicalize(path)
        .map_err(|e| ChunkError::InvalidInput(format!("upload file {path:?} does not exist: {e}")))?;
    if !resolved.is_file() {
        return Err(ChunkError::InvalidInput(format!(
            "upload file {path:?} is not a regular file"
        )));
    }
    Ok(resolved)
}

/// Creates `dir` (and parents) unless it is already a directory.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    if dir.exists() {
        return Err(ChunkError::fs(
            "create directory",
            dir,
            std::io::Error::new(std::io::ErrorKind::AlreadyExists, "path is not a directory"),
        ));
    }
    fs::create_dir_all(dir).map_err(|e| ChunkError::fs("create directory", dir, e))
}

/// Default name for the reconstructed copy: random hex that keeps the
/// source's extension.
pub fn generate_save_name(source: &Path) -> String {
    let id: u64 = rand::thread_rng().gen();
    match source.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{id:016x}.{ext}"),
        _ => format!("{id:016x}"),
    }
}

/// Rejects names that would escape the destination directory or collide
/// with a chunk artifact living beside the reconstructed copy.
pub fn validate_save_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    if !matches!(
        (components.next(), components.next()),
        (Some(std::path::Component::Normal(_)), None)
    ) {
        return Err(ChunkError::InvalidInput(format!(
            "save name {name:?} must be a plain file name"
        )));
    }
    if parse_artifact_name(name).is_some() {
        return Err(ChunkError::InvalidInput(format!(
            "save name {name:?} is reserved for chunk artifacts"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_name_keeps_extension() {
        let name = generate_save_name(Path::new("/tmp/setup.exe"));
        assert!(name.ends_with(".exe"));
        assert_eq!(name.len(), 16 + 4);

        let bare = generate_save_name(Path::new("/tmp/blob"));
        assert_eq!(bare.len(), 16);
    }

    #[test]
    fn test_validate_save_name() {
        assert!(validate_save_name("copy.bin").is_ok());
        assert!(validate_save_name("../copy.bin").is_err());
        assert!(validate_save_name("a/b").is_err());
        assert!(validate_save_name("").is_err());
        assert!(matches!(
            validate_save_name("0_100"),
            Err(ChunkError::InvalidInput(_))
        ));
        assert!(validate_save_name("0_100.bin").is_ok());
        assert!(validate_save_name("100_0").is_ok());
    }

    #[test]
    fn test_resolve_source() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.bin");
        fs::write(&file, b"x").unwrap();

        assert!(resolve_source(&file).is_ok());
        assert!(matches!(
            resolve_source(dir.path()),
            Err(ChunkError::InvalidInput(_))
        ));
        assert!(matches!(
            resolve_source(&dir.path().join("missing")),
            Err(ChunkError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_ensure_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
        ensure_dir(&nested).unwrap();

        let file = dir.path().join("f");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(ensure_dir(&file), Err(ChunkError::FileSystem { .. })));
    }
}
