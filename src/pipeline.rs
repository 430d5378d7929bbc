use crate::classification::ClassificationTable;
use crate::error::{Result, TilerError};
use crate::io::{self, GeoTiffOptions};
use crate::metadata;
use crate::reference::DatasetMetadata;
use crate::scene::{entity_id, Georeferencing, Mask, Subscene};
use crate::tiling::TileSize;
use log::{debug, error, info, warn};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

const INPUT_EXTENSION: &str = "npy";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDirs {
    pub subscenes: PathBuf,
    pub masks: PathBuf,
    pub scene_metadata: PathBuf,
    pub dataset_metadata: PathBuf,
}

impl OutputDirs {
    fn create_all(&self) -> Result<()> {
        for dir in [
            &self.subscenes,
            &self.masks,
            &self.scene_metadata,
            &self.dataset_metadata,
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub subscene_dir: PathBuf,
    pub mask_dir: PathBuf,
    pub classification_tags: PathBuf,
    pub georeferencing: Georeferencing,
    pub tile_size: TileSize,
    pub first_n: Option<usize>,
    pub output: OutputDirs,
    pub geotiff: GeoTiffOptions,
    pub fail_fast: bool,
}

/// A subscene file and the mask file sharing its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenePair {
    pub subscene: PathBuf,
    pub mask: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub failed: usize,
    /// Subscenes without a matching mask.
    pub skipped: usize,
}

/// Match subscene and mask files by id. Returns the pairs in id order and the
/// subscenes left without a mask.
pub fn pair_by_id(subscenes: &[PathBuf], masks: &[PathBuf]) -> Result<(Vec<ScenePair>, Vec<PathBuf>)> {
    let mut masks_by_id = BTreeMap::new();
    for mask in masks {
        masks_by_id.insert(entity_id(mask)?, mask.clone());
    }

    let mut pairs = Vec::new();
    let mut unmatched = Vec::new();
    for subscene in subscenes {
        match masks_by_id.get(&entity_id(subscene)?) {
            Some(mask) => pairs.push(ScenePair {
                subscene: subscene.clone(),
                mask: mask.clone(),
            }),
            None => unmatched.push(subscene.clone()),
        }
    }

    Ok((pairs, unmatched))
}

pub fn discover_pairs(subscene_dir: &Path, mask_dir: &Path) -> Result<(Vec<ScenePair>, Vec<PathBuf>)> {
    let subscenes = io::list_files(subscene_dir, INPUT_EXTENSION)?;
    let masks = io::list_files(mask_dir, INPUT_EXTENSION)?;
    debug!(
        "Found {} subscene and {} mask arrays",
        subscenes.len(),
        masks.len()
    );
    pair_by_id(&subscenes, &masks)
}

/// Tile one subscene/mask pair and write its tiles and metadata.
/// Returns the number of tiles written.
pub fn process_pair(
    pair: &ScenePair,
    classification: &ClassificationTable,
    config: &PipelineConfig,
) -> Result<usize> {
    let subscene = Subscene::load(
        &pair.subscene,
        config.tile_size,
        classification,
        &config.georeferencing,
    )?;
    let mask = Mask::load(&pair.mask, config.tile_size)?;

    // Validate pairing before anything is written.
    let scene_metadata = metadata::assemble(&subscene, &mask)?;

    io::write_image_tiles(&config.output.subscenes, &subscene, &config.geotiff)?;
    io::write_mask_tiles(&config.output.masks, &mask)?;
    io::write_scene_metadata(&config.output.scene_metadata, &scene_metadata)?;

    Ok(scene_metadata.tiles.len())
}

pub fn run(config: &PipelineConfig) -> Result<RunSummary> {
    info!("----- Processing Sentinel-2 catalogue -----");

    let (mut pairs, unmatched) = discover_pairs(&config.subscene_dir, &config.mask_dir)?;
    for subscene in &unmatched {
        warn!("No mask found for {}, skipping", subscene.display());
    }
    if let Some(n) = config.first_n {
        pairs.truncate(n);
    }

    let classification = ClassificationTable::from_path(&config.classification_tags)?;

    config.output.create_all()?;
    io::write_dataset_metadata(&config.output.dataset_metadata, &DatasetMetadata::new())?;

    let total = pairs.len();
    info!("Processing {} subscenes and masks", total);

    let done = AtomicUsize::new(0);
    let report_progress = |pair: &ScenePair, tiles: usize| {
        let n = done.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            "Processed {}/{} ({:.2}%): {} ({} tiles)",
            n,
            total,
            n as f64 / total as f64 * 100.0,
            pair.subscene.display(),
            tiles
        );
    };

    let mut summary = RunSummary {
        skipped: unmatched.len(),
        ..RunSummary::default()
    };

    if config.fail_fast {
        pairs.par_iter().try_for_each(|pair| {
            let tiles = process_pair(pair, &classification, config)?;
            report_progress(pair, tiles);
            Ok::<(), TilerError>(())
        })?;
        summary.processed = total;
    } else {
        let outcomes: Vec<Result<usize>> = pairs
            .par_iter()
            .map(|pair| {
                let outcome = process_pair(pair, &classification, config);
                match &outcome {
                    Ok(tiles) => report_progress(pair, *tiles),
                    Err(e) => error!("Failed to process {}: {}", pair.subscene.display(), e),
                }
                outcome
            })
            .collect();

        summary.processed = outcomes.iter().filter(|o| o.is_ok()).count();
        summary.failed = outcomes.len() - summary.processed;
    }

    info!("----- Processing finished -----");
    info!("Subscenes saved to {}", config.output.subscenes.display());
    info!("Masks saved to {}", config.output.masks.display());
    info!("Metadata saved to {}", config.output.scene_metadata.display());

    Ok(summary)
}
