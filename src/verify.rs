use crate::coverage;
use crate::error::Result;
use crate::georef::GeospatialBounds;
use crate::io::{self, ImageTile, SampleType, DATASET_METADATA_FILE};
use crate::metadata::{SceneMetadata, IMAGE_TILE_EXTENSION, MASK_TILE_EXTENSION};
use crate::tiling::{first_coordinate_mismatch, TileSize};
use log::{debug, info, warn};
use ndarray::Array3;
use ndarray_npy::read_npy;
use std::path::{Path, PathBuf};

pub const DEFAULT_COVERAGE_TOLERANCE: f64 = 1e-4;

/// Relative tolerance for world coordinates read back from GeoTIFF headers.
const GEO_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct VerifyConfig {
    pub metadata_dir: PathBuf,
    pub subscene_dir: PathBuf,
    pub image_tile_dir: PathBuf,
    pub mask_tile_dir: PathBuf,
    pub tile_size: TileSize,
    pub sample_type: SampleType,
    pub coverage_tolerance: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub scenes: usize,
    pub tiles_checked: usize,
    pub image_files: usize,
    pub mask_files: usize,
    pub missing_files: usize,
    pub dimension_mismatches: usize,
    pub coordinate_mismatches: usize,
    pub georeference_mismatches: usize,
    pub coverage_mismatches: usize,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.problems() == 0
    }

    /// Per-tile problems, plus one when image and mask tile counts differ.
    pub fn problems(&self) -> usize {
        let file_count_mismatch = usize::from(self.image_files != self.mask_files);
        self.missing_files
            + self.dimension_mismatches
            + self.coordinate_mismatches
            + self.georeference_mismatches
            + self.coverage_mismatches
            + file_count_mismatch
    }

    fn merge(&mut self, other: VerifyReport) {
        self.scenes += other.scenes;
        self.tiles_checked += other.tiles_checked;
        self.image_files += other.image_files;
        self.mask_files += other.mask_files;
        self.missing_files += other.missing_files;
        self.dimension_mismatches += other.dimension_mismatches;
        self.coordinate_mismatches += other.coordinate_mismatches;
        self.georeference_mismatches += other.georeference_mismatches;
        self.coverage_mismatches += other.coverage_mismatches;
    }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= GEO_TOLERANCE * a.abs().max(b.abs()).max(1.0)
}

/// Whether a read-back tile has the full tile shape and the scene's band count.
pub fn tile_shape_matches(dims: (usize, usize, usize), tile_size: TileSize, channels: usize) -> bool {
    dims == (tile_size.height(), tile_size.width(), channels)
}

/// Whether a tile's GeoTIFF header agrees with its recorded bounds: a tile is
/// georeferenced exactly when bounds were recorded, and then its transform is
/// anchored at the bounds' top-left corner and spans them over the tile size.
pub fn georeference_matches(
    bounds: Option<&GeospatialBounds>,
    tile: &ImageTile,
    tile_size: TileSize,
) -> bool {
    match (bounds, &tile.geo_transform, &tile.crs) {
        (None, None, None) => true,
        (Some(b), Some(gt), Some(_)) => {
            close(gt[0], b.minx)
                && close(gt[3], b.maxy)
                && gt[2] == 0.0
                && gt[4] == 0.0
                && close(b.minx + tile_size.width() as f64 * gt[1], b.maxx)
                && close(b.maxy + tile_size.height() as f64 * gt[5], b.miny)
        }
        _ => false,
    }
}

/// World extent of the unpadded scene, derived from the bounds of its first
/// (top-left) tile.
pub fn scene_extent(
    first: &GeospatialBounds,
    tile_size: TileSize,
    height: usize,
    width: usize,
) -> GeospatialBounds {
    let a = (first.maxx - first.minx) / tile_size.width() as f64;
    let e = (first.miny - first.maxy) / tile_size.height() as f64;
    GeospatialBounds {
        minx: first.minx,
        maxx: first.minx + width as f64 * a,
        miny: first.maxy + height as f64 * e,
        maxy: first.maxy,
    }
}

/// Whether a tile's top-left corner lies inside the scene extent.
pub fn top_left_within(bounds: &GeospatialBounds, extent: &GeospatialBounds) -> bool {
    bounds.minx >= extent.minx
        && bounds.minx < extent.maxx
        && bounds.maxy <= extent.maxy
        && bounds.maxy > extent.miny
}

fn check_file(path: &Path, report: &mut VerifyReport) -> bool {
    if path.exists() {
        true
    } else {
        warn!("Missing file: {}", path.display());
        report.missing_files += 1;
        false
    }
}

/// Check every tile of one scene against its source subscene and mask tiles.
pub fn verify_scene(metadata: &SceneMetadata, config: &VerifyConfig) -> Result<VerifyReport> {
    let mut report = VerifyReport {
        scenes: 1,
        ..VerifyReport::default()
    };

    let scene_path = config.subscene_dir.join(format!("{}.npy", metadata.id));
    if !check_file(&scene_path, &mut report) {
        return Ok(report);
    }
    let scene = io::read_scene_array(&scene_path)?;
    let (height, width, channels) = scene.dim();
    // Scene samples as the tiles store them.
    let expected = scene.mapv(|v| config.sample_type.cast(v));

    let extent = metadata
        .tiles
        .first()
        .and_then(|record| record.geospatial_bounds.as_ref())
        .map(|first| scene_extent(first, config.tile_size, height, width));
    let mut scene_crs: Option<String> = None;

    for record in &metadata.tiles {
        report.tiles_checked += 1;

        let image_path = config.image_tile_dir.join(&record.image_filename);
        if check_file(&image_path, &mut report) {
            let tile = io::read_image_tile(&image_path)?;

            if !tile_shape_matches(tile.pixels.dim(), config.tile_size, channels) {
                warn!(
                    "{}: tile shape {:?}, expected {}x{}x{}",
                    record.id,
                    tile.pixels.shape(),
                    config.tile_size.height(),
                    config.tile_size.width(),
                    channels
                );
                report.dimension_mismatches += 1;
            } else if first_coordinate_mismatch(
                &expected,
                [(&tile.pixels, &record.original_coords)],
            )
            .is_some()
            {
                warn!(
                    "{}: pixels do not match scene region {:?}",
                    record.id, record.original_coords
                );
                report.coordinate_mismatches += 1;
            }

            let mut georeferenced =
                georeference_matches(record.geospatial_bounds.as_ref(), &tile, config.tile_size);
            if let (Some(bounds), Some(extent)) = (&record.geospatial_bounds, &extent) {
                georeferenced &= top_left_within(bounds, extent);
            }
            // All tiles of a scene share one CRS.
            if let Some(crs) = &tile.crs {
                let first = scene_crs.get_or_insert_with(|| crs.clone());
                georeferenced &= first == crs;
            }
            if !georeferenced {
                warn!(
                    "{}: georeference {:?} / {:?} disagrees with bounds {:?}",
                    record.id, tile.geo_transform, tile.crs, record.geospatial_bounds
                );
                report.georeference_mismatches += 1;
            }
        }

        let mask_path = config.mask_tile_dir.join(&record.mask_filename);
        if check_file(&mask_path, &mut report) {
            let mask: Array3<u8> = read_npy(&mask_path)?;
            let recomputed = coverage::cloud_coverage(&mask.view())?;
            if (recomputed - record.cloud_coverage).abs() > config.coverage_tolerance {
                warn!(
                    "{}: recorded cloud coverage {:.6}, recomputed {:.6}",
                    record.id, record.cloud_coverage, recomputed
                );
                report.coverage_mismatches += 1;
            }
        }
    }

    debug!("Verified {}: {:?}", metadata.id, report);
    Ok(report)
}

pub fn verify_outputs(config: &VerifyConfig) -> Result<VerifyReport> {
    let mut report = VerifyReport {
        image_files: io::list_files(&config.image_tile_dir, IMAGE_TILE_EXTENSION)?.len(),
        mask_files: io::list_files(&config.mask_tile_dir, MASK_TILE_EXTENSION)?.len(),
        ..VerifyReport::default()
    };
    if report.image_files != report.mask_files {
        warn!(
            "{} image tiles but {} mask tiles",
            report.image_files, report.mask_files
        );
    }

    for path in io::list_files(&config.metadata_dir, "json")? {
        if path.file_name().map_or(false, |name| name == DATASET_METADATA_FILE) {
            continue;
        }
        let metadata: SceneMetadata = io::read_json(&path)?;
        report.merge(verify_scene(&metadata, config)?);
    }

    info!(
        "Verified {} scenes, {} tiles: {} missing files, {} wrong shapes, {} coordinate mismatches, {} georeference mismatches, {} coverage mismatches",
        report.scenes,
        report.tiles_checked,
        report.missing_files,
        report.dimension_mismatches,
        report.coordinate_mismatches,
        report.georeference_mismatches,
        report.coverage_mismatches
    );

    Ok(report)
}
