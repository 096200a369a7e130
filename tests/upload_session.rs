use range_chunker::upload::storage_manager::{join_artifacts, list_artifacts};
use range_chunker::upload::utils::hash_data;
use range_chunker::{
    ArtifactAction, ChunkConfig, ChunkError, ChunkSize, SmallFilePolicy, UploadOutcome,
    UploadSession,
};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const MIB: usize = 1024 * 1024;

fn setup(len: usize) -> (TempDir, PathBuf, PathBuf, Vec<u8>) {
    let dir = tempfile::tempdir().unwrap();
    let data: Vec<u8> = (0..len).map(|i| (i % 253) as u8).collect();
    let source = dir.path().join("setup.exe");
    fs::write(&source, &data).unwrap();
    let save_root = dir.path().join("uploads");
    fs::create_dir(&save_root).unwrap();
    (dir, source, save_root, data)
}

#[test]
fn test_ten_mib_file_in_five_mib_chunks() {
    let (_dir, source, save_root, data) = setup(10 * MIB);
    let config = ChunkConfig::default().with_chunk_size(ChunkSize::from_mib(5).unwrap());

    let report = UploadSession::new(&source, &save_root, config)
        .unwrap()
        .with_save_name("copy.exe")
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(report.outcome, UploadOutcome::Chunked);
    assert_eq!(report.chunk_count, 2);
    assert_eq!(report.content_hash, hash_data(&data));
    assert_eq!(report.destination_dir, save_root.join(hash_data(&data)));

    let first = report.destination_dir.join("0_5242880");
    let second = report.destination_dir.join("5242880_10485760");
    assert_eq!(fs::metadata(&first).unwrap().len(), 5_242_880);
    assert_eq!(fs::metadata(&second).unwrap().len(), 5_242_880);

    assert_eq!(report.reconstructed_path, report.destination_dir.join("copy.exe"));
    assert_eq!(fs::read(&report.reconstructed_path).unwrap(), data);
}

#[test]
fn test_small_file_writes_nothing() {
    let (_dir, source, save_root, _data) = setup(MIB);
    let config = ChunkConfig::default().with_chunk_size(ChunkSize::new(1).unwrap());

    let report = UploadSession::new(&source, &save_root, config)
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(report.outcome, UploadOutcome::BelowThreshold);
    assert_eq!(report.chunk_count, 0);
    assert!(report.artifacts.is_empty());
    assert!(list_artifacts(&report.destination_dir).unwrap().is_empty());
    assert!(!report.reconstructed_path.exists());
}

#[test]
fn test_small_file_copied_whole() {
    let (_dir, source, save_root, data) = setup(64 * 1024);
    let config = ChunkConfig::default().with_small_file_policy(SmallFilePolicy::CopyWhole);

    let report = UploadSession::new(&source, &save_root, config)
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(report.outcome, UploadOutcome::CopiedWhole);
    assert!(report.artifacts.is_empty());
    assert_eq!(
        report.reconstructed_path.extension().and_then(|e| e.to_str()),
        Some("exe")
    );
    assert_eq!(fs::read(&report.reconstructed_path).unwrap(), data);
}

#[test]
fn test_rerun_leaves_artifacts_untouched() {
    let (_dir, source, save_root, _data) = setup(300_000);
    let config = ChunkConfig::default()
        .with_chunk_size(ChunkSize::new(64 * 1024).unwrap())
        .with_small_file_threshold(0);

    let session = UploadSession::new(&source, &save_root, config)
        .unwrap()
        .with_save_name("copy.bin")
        .unwrap();
    let first = session.run().unwrap();
    assert!(first
        .artifacts
        .iter()
        .all(|a| a.action == ArtifactAction::Written));

    let before: Vec<_> = list_artifacts(&first.destination_dir)
        .unwrap()
        .into_iter()
        .map(|(range, path)| (range, fs::read(path).unwrap()))
        .collect();

    let second = session.run().unwrap();
    assert_eq!(second.destination_dir, first.destination_dir);
    assert!(second
        .artifacts
        .iter()
        .all(|a| a.action == ArtifactAction::Skipped));

    let after: Vec<_> = list_artifacts(&second.destination_dir)
        .unwrap()
        .into_iter()
        .map(|(range, path)| (range, fs::read(path).unwrap()))
        .collect();
    assert_eq!(before, after);
}

#[test]
fn test_overwrite_repairs_artifact() {
    let (_dir, source, save_root, data) = setup(3 * MIB);
    let config = ChunkConfig::default().with_chunk_size(ChunkSize::from_mib(1).unwrap());

    let first = UploadSession::new(&source, &save_root, config.clone())
        .unwrap()
        .run()
        .unwrap();
    let corrupted = first.destination_dir.join("1048576_2097152");
    fs::write(&corrupted, b"garbage").unwrap();

    let second = UploadSession::new(&source, &save_root, config.with_overwrite(true))
        .unwrap()
        .run()
        .unwrap();
    assert!(second
        .artifacts
        .iter()
        .all(|a| a.action == ArtifactAction::Overwritten));
    assert_eq!(fs::read(&corrupted).unwrap(), &data[MIB..2 * MIB]);
}

#[test]
fn test_artifacts_concatenate_to_source() {
    let (dir, source, save_root, data) = setup(2 * MIB + 12_345);
    let config = ChunkConfig::default().with_chunk_size(ChunkSize::new(700_000).unwrap());

    let report = UploadSession::new(&source, &save_root, config)
        .unwrap()
        .with_save_name("copy.bin")
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(report.chunk_count, 4);

    let joined = dir.path().join("joined.bin");
    join_artifacts(&report.destination_dir, &joined).unwrap();
    assert_eq!(fs::read(&joined).unwrap(), data);
}

#[test]
fn test_invalid_inputs() {
    let (dir, source, save_root, _data) = setup(10);

    let err = UploadSession::new(dir.path().join("missing"), &save_root, ChunkConfig::default())
        .unwrap_err();
    assert!(matches!(err, ChunkError::InvalidInput(_)));

    let err = UploadSession::new(&source, dir.path().join("nowhere"), ChunkConfig::default())
        .unwrap_err();
    assert!(matches!(err, ChunkError::InvalidInput(_)));

    let err = UploadSession::new(&source, &save_root, ChunkConfig::default())
        .unwrap()
        .with_save_name("../escape")
        .unwrap_err();
    assert!(matches!(err, ChunkError::InvalidInput(_)));
}

#[test]
fn test_save_name_cannot_shadow_artifact() {
    let (_dir, source, save_root, data) = setup(300);
    let config = ChunkConfig::default()
        .with_chunk_size(ChunkSize::new(100).unwrap())
        .with_small_file_threshold(0);

    let err = UploadSession::new(&source, &save_root, config.clone())
        .unwrap()
        .with_save_name("0_100")
        .unwrap_err();
    assert!(matches!(err, ChunkError::InvalidInput(_)));

    let report = UploadSession::new(&source, &save_root, config)
        .unwrap()
        .with_save_name("copy.bin")
        .unwrap()
        .run()
        .unwrap();
    assert!(report
        .artifacts
        .iter()
        .all(|a| a.action == ArtifactAction::Written));
    assert_eq!(
        fs::read(report.destination_dir.join("0_100")).unwrap(),
        &data[..100]
    );
}

#[test]
fn test_zero_chunk_size_rejected_before_planning() {
    assert!(matches!(
        ChunkSize::new(0),
        Err(ChunkError::InvalidConfiguration(_))
    ));
    assert!(matches!(
        ChunkConfig::from_json_slice(br#"{"chunk_size": 0, "overwrite": true}"#),
        Err(ChunkError::InvalidConfiguration(_))
    ));
}
