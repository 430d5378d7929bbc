use clap::Parser;
use cloudmask_tiler::cli::{Cli, Commands};
use cloudmask_tiler::error::{Result, TilerError};
use cloudmask_tiler::reference::{sensor_metadata, DatasetMetadata};
use cloudmask_tiler::{io, pipeline, verify};
use env_logger::Env;
use log::{info, warn};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    if let Some(n_threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .build_global()?;
        info!("Using {} threads", n_threads);
    } else {
        info!("Using all available threads");
    }

    match cli.command {
        Commands::Process(args) => {
            let config = args.into_config()?;
            info!(
                "Tile size: {}x{}, georeferencing: {:?}",
                config.tile_size.height(),
                config.tile_size.width(),
                config.georeferencing
            );

            let summary = pipeline::run(&config)?;
            info!(
                "Done: {} processed, {} failed, {} without mask",
                summary.processed, summary.failed, summary.skipped
            );
            if summary.failed > 0 {
                warn!("{} pairs failed, see errors above", summary.failed);
            }
        }
        Commands::Verify(args) => {
            let report = verify::verify_outputs(&args.into_config()?)?;
            if !report.is_clean() {
                return Err(TilerError::VerificationFailed(report.problems()));
            }
            info!("All {} tiles verified", report.tiles_checked);
        }
        Commands::DatasetMetadata { output_dir } => {
            io::write_dataset_metadata(&output_dir, &DatasetMetadata::new())?;
        }
        Commands::Bands { sensor } => {
            let metadata = sensor_metadata(&sensor)?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }
    }

    Ok(())
}
