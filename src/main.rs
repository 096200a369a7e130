use clap::{Parser, Subcommand};
use range_chunker::upload::storage_manager;
use range_chunker::{ChunkConfig, ChunkSize, SmallFilePolicy, UploadOutcome, UploadSession};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Split a file into chunk artifacts and write a reconstructed copy
    Split {
        /// File to upload
        source: PathBuf,

        /// Directory under which the content-addressed save dir is created
        save_root: Option<PathBuf>,

        /// Chunk size in MiB
        #[clap(long, conflicts_with = "chunk_bytes")]
        chunk_mib: Option<u64>,

        /// Chunk size in bytes
        #[clap(long)]
        chunk_bytes: Option<u64>,

        /// Files at or below this many bytes are not chunked
        #[clap(long)]
        threshold: Option<u64>,

        /// Copy files under the threshold whole instead of skipping them
        #[clap(long)]
        copy_small_files: bool,

        /// Replace chunk artifacts that already exist
        #[clap(long)]
        overwrite: bool,

        /// File name for the reconstructed copy
        #[clap(long)]
        save_name: Option<String>,

        /// JSON config file; flags override its values
        #[clap(long)]
        config: Option<PathBuf>,

        /// Print the run report as JSON
        #[clap(long)]
        json: bool,
    },
    /// Concatenate chunk artifacts back into a single file
    Join {
        /// Directory holding `<start>_<end>` artifacts
        chunk_dir: PathBuf,

        /// Output file
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    match args.command {
        Command::Split {
            source,
            save_root,
            chunk_mib,
            chunk_bytes,
            threshold,
            copy_small_files,
            overwrite,
            save_name,
            config,
            json,
        } => {
            let mut chunk_config = match config {
                Some(path) => ChunkConfig::from_json_file(path)?,
                None => ChunkConfig::default(),
            };
            if let Some(mib) = chunk_mib {
                chunk_config = chunk_config.with_chunk_size(ChunkSize::from_mib(mib)?);
            }
            if let Some(bytes) = chunk_bytes {
                chunk_config = chunk_config.with_chunk_size(ChunkSize::new(bytes)?);
            }
            if let Some(threshold) = threshold {
                chunk_config = chunk_config.with_small_file_threshold(threshold);
            }
            if copy_small_files {
                chunk_config = chunk_config.with_small_file_policy(SmallFilePolicy::CopyWhole);
            }
            if overwrite {
                chunk_config = chunk_config.with_overwrite(true);
            }

            let save_root = match save_root {
                Some(dir) => dir,
                None => default_save_root()?,
            };

            let mut session = UploadSession::new(&source, &save_root, chunk_config)?;
            if let Some(name) = save_name {
                session = session.with_save_name(name)?;
            }
            let report = session.run()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for artifact in &report.artifacts {
                    println!("{:?} {}", artifact.action, artifact.path.display());
                }
                println!("Reconstructed file: {}", report.reconstructed_path.display());
            }

            if report.outcome == UploadOutcome::BelowThreshold {
                return Err(format!(
                    "{} is below the small-file threshold, no chunks written",
                    source.display()
                )
                .into());
            }
            Ok(())
        }
        Command::Join { chunk_dir, output } => {
            let bytes = storage_manager::join_artifacts(&chunk_dir, &output)?;
            info!("Wrote {} bytes to {:?}", bytes, output);
            Ok(())
        }
    }
}

fn default_save_root() -> Result<PathBuf, Box<dyn Error>> {
    let root = dirs::data_local_dir()
        .ok_or("no local data directory on this platform")?
        .join("range_chunker");
    std::fs::create_dir_all(&root)?;
    Ok(root)
}
