use crate::error::Result;
use crate::io::{Compression, GeoTiffOptions, SampleType};
use crate::pipeline::{OutputDirs, PipelineConfig};
use crate::scene::Georeferencing;
use crate::tiling::TileSize;
use crate::verify::{VerifyConfig, DEFAULT_COVERAGE_TOLERANCE};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cloudmask-tiler")]
#[command(about = "Tile Sentinel-2 subscenes and cloud masks into ML training samples")]
#[command(version)]
pub struct Cli {
    /// Number of threads (default: all available)
    #[arg(short, long, global = true, value_name = "N")]
    pub threads: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Tile every subscene/mask pair and write tiles plus metadata
    Process(ProcessArgs),

    /// Check written tiles against their source subscenes and metadata
    Verify(VerifyArgs),

    /// Write dataset_metadata.json (sensor bands and class mapping)
    DatasetMetadata {
        /// Output directory
        #[arg(short, long, env = "OUTPUT_METADATA_DIR", value_name = "DIR")]
        output_dir: PathBuf,
    },

    /// Print the band table of a Sentinel-2 sensor as JSON
    Bands {
        /// Sensor label (S2A or S2B)
        #[arg(value_name = "SENSOR")]
        sensor: String,
    },
}

#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Directory of subscene arrays (*.npy, height x width x bands)
    #[arg(long, env = "INPUT_SUBSCENE_DIR", value_name = "DIR")]
    pub subscene_dir: PathBuf,

    /// Directory of one-hot mask arrays (*.npy, height x width x 3)
    #[arg(long, env = "INPUT_MASK_DIR", value_name = "DIR")]
    pub mask_dir: PathBuf,

    /// Classification tags CSV with a "scene" column
    #[arg(long, env = "INPUT_CLASSIF_TAGS", value_name = "FILE")]
    pub classification_tags: PathBuf,

    /// Root of the per-scene reference shapefiles; omit to skip georeferencing
    #[arg(long, env = "SHAPEFILE_DIR", value_name = "DIR")]
    pub shapefile_dir: Option<PathBuf>,

    /// Tile height in pixels
    #[arg(long, env = "TILE_SIZE_X", default_value_t = 512, value_name = "PIXELS")]
    pub tile_height: usize,

    /// Tile width in pixels
    #[arg(long, env = "TILE_SIZE_Y", default_value_t = 512, value_name = "PIXELS")]
    pub tile_width: usize,

    /// Only process the first N pairs
    #[arg(long, env = "FIRST_N", value_name = "N")]
    pub first_n: Option<usize>,

    /// Output directory for image tiles
    #[arg(long, env = "OUTPUT_SUBSCENE_DIR", value_name = "DIR")]
    pub output_subscene_dir: PathBuf,

    /// Output directory for mask tiles
    #[arg(long, env = "OUTPUT_MASKS_DIR", value_name = "DIR")]
    pub output_mask_dir: PathBuf,

    /// Output directory for per-scene metadata
    #[arg(long, env = "OUTPUT_METADATA_SUBSCENES_DIR", value_name = "DIR")]
    pub output_scene_metadata_dir: PathBuf,

    /// Output directory for dataset_metadata.json
    #[arg(long, env = "OUTPUT_METADATA_DIR", value_name = "DIR")]
    pub output_metadata_dir: PathBuf,

    /// Sample type of the image tiles
    #[arg(long, value_enum, default_value_t = SampleType::U16)]
    pub image_dtype: SampleType,

    /// GeoTIFF compression of the image tiles
    #[arg(long, value_enum, default_value_t = Compression::None)]
    pub compression: Compression,

    /// Stop at the first failing pair instead of skipping it
    #[arg(long)]
    pub fail_fast: bool,
}

impl ProcessArgs {
    pub fn into_config(self) -> Result<PipelineConfig> {
        let tile_size = TileSize::new(self.tile_height, self.tile_width)?;
        let georeferencing = match self.shapefile_dir {
            Some(dir) => Georeferencing::Shapefile(dir),
            None => Georeferencing::Disabled,
        };

        Ok(PipelineConfig {
            subscene_dir: self.subscene_dir,
            mask_dir: self.mask_dir,
            classification_tags: self.classification_tags,
            georeferencing,
            tile_size,
            first_n: self.first_n,
            output: OutputDirs {
                subscenes: self.output_subscene_dir,
                masks: self.output_mask_dir,
                scene_metadata: self.output_scene_metadata_dir,
                dataset_metadata: self.output_metadata_dir,
            },
            geotiff: GeoTiffOptions {
                sample_type: self.image_dtype,
                compression: self.compression,
            },
            fail_fast: self.fail_fast,
        })
    }
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Directory of per-scene metadata files
    #[arg(long, env = "OUTPUT_METADATA_SUBSCENES_DIR", value_name = "DIR")]
    pub metadata_dir: PathBuf,

    /// Directory of the source subscene arrays
    #[arg(long, env = "INPUT_SUBSCENE_DIR", value_name = "DIR")]
    pub subscene_dir: PathBuf,

    /// Directory of the written image tiles
    #[arg(long, env = "OUTPUT_SUBSCENE_DIR", value_name = "DIR")]
    pub image_tile_dir: PathBuf,

    /// Directory of the written mask tiles
    #[arg(long, env = "OUTPUT_MASKS_DIR", value_name = "DIR")]
    pub mask_tile_dir: PathBuf,

    /// Tile height the tiles were written with
    #[arg(long, env = "TILE_SIZE_X", default_value_t = 512, value_name = "PIXELS")]
    pub tile_height: usize,

    /// Tile width the tiles were written with
    #[arg(long, env = "TILE_SIZE_Y", default_value_t = 512, value_name = "PIXELS")]
    pub tile_width: usize,

    /// Sample type the image tiles were written with
    #[arg(long, value_enum, default_value_t = SampleType::U16)]
    pub image_dtype: SampleType,

    /// Allowed difference between recorded and recomputed cloud coverage
    #[arg(long, default_value_t = DEFAULT_COVERAGE_TOLERANCE, value_name = "VALUE")]
    pub coverage_tolerance: f64,
}

impl VerifyArgs {
    pub fn into_config(self) -> Result<VerifyConfig> {
        Ok(VerifyConfig {
            metadata_dir: self.metadata_dir,
            subscene_dir: self.subscene_dir,
            image_tile_dir: self.image_tile_dir,
            mask_tile_dir: self.mask_tile_dir,
            tile_size: TileSize::new(self.tile_height, self.tile_width)?,
            sample_type: self.image_dtype,
            coverage_tolerance: self.coverage_tolerance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROCESS: &[&str] = &[
        "cloudmask-tiler",
        "process",
        "--subscene-dir",
        "in/subscenes",
        "--mask-dir",
        "in/masks",
        "--classification-tags",
        "in/tags.csv",
        "--output-subscene-dir",
        "out/subscenes",
        "--output-mask-dir",
        "out/masks",
        "--output-scene-metadata-dir",
        "out/metadata/subscenes",
        "--output-metadata-dir",
        "out/metadata",
    ];

    fn process_args(extra: &[&str]) -> ProcessArgs {
        let argv: Vec<&str> = PROCESS.iter().chain(extra).copied().collect();
        match Cli::parse_from(argv).command {
            Commands::Process(args) => args,
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_process_defaults() {
        let config = process_args(&[]).into_config().unwrap();
        assert_eq!(config.tile_size, TileSize::default());
        assert_eq!(config.georeferencing, Georeferencing::Disabled);
        assert_eq!(config.geotiff, GeoTiffOptions::default());
        assert_eq!(config.first_n, None);
        assert!(!config.fail_fast);
        assert_eq!(config.output.masks, PathBuf::from("out/masks"));
    }

    #[test]
    fn test_process_options() {
        let config = process_args(&[
            "--tile-height",
            "256",
            "--tile-width",
            "128",
            "--shapefile-dir",
            "shapes",
            "--image-dtype",
            "f32",
            "--compression",
            "deflate",
            "--first-n",
            "3",
        ])
        .into_config()
        .unwrap();

        assert_eq!(config.tile_size, TileSize::new(256, 128).unwrap());
        assert_eq!(
            config.georeferencing,
            Georeferencing::Shapefile(PathBuf::from("shapes"))
        );
        assert_eq!(config.geotiff.sample_type, SampleType::F32);
        assert_eq!(config.geotiff.compression, Compression::Deflate);
        assert_eq!(config.first_n, Some(3));
    }

    #[test]
    fn test_zero_tile_size_is_rejected() {
        assert!(process_args(&["--tile-height", "0"]).into_config().is_err());
    }

    #[test]
    fn test_verify_tile_size() {
        let cli = Cli::parse_from([
            "cloudmask-tiler",
            "verify",
            "--metadata-dir",
            "out/metadata/subscenes",
            "--subscene-dir",
            "in/subscenes",
            "--image-tile-dir",
            "out/subscenes",
            "--mask-tile-dir",
            "out/masks",
            "--tile-height",
            "256",
        ]);
        let config = match cli.command {
            Commands::Verify(args) => args.into_config().unwrap(),
            other => panic!("unexpected command {:?}", other),
        };
        assert_eq!(config.tile_size, TileSize::new(256, 512).unwrap());
        assert_eq!(config.sample_type, SampleType::U16);
    }

    #[test]
    fn test_bands_command() {
        let cli = Cli::parse_from(["cloudmask-tiler", "-v", "bands", "S2B"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Bands { ref sensor } if sensor == "S2B"));
    }
}
