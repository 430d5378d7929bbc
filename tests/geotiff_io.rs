use cloudmask_tiler::classification::{ClassificationRecord, ClassificationTable};
use cloudmask_tiler::coverage::{CLEAR, CLOUD};
use cloudmask_tiler::georef::{BoundingBox, Georeference, ReferenceGeometry};
use cloudmask_tiler::io::{self, Compression, GeoTiffOptions, SampleType};
use cloudmask_tiler::pipeline::{process_pair, OutputDirs, PipelineConfig, ScenePair};
use cloudmask_tiler::scene::{Georeferencing, Subscene};
use cloudmask_tiler::tiling::TileSize;
use cloudmask_tiler::verify::{verify_outputs, VerifyConfig, DEFAULT_COVERAGE_TOLERANCE};
use cloudmask_tiler::TilerError;
use gdal::Dataset;
use ndarray::{s, Array3, Axis};
use ndarray_npy::write_npy;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SCENE_ID: &str = "S2A_MSIL1C_20180611T102021";

fn scene_array(height: usize, width: usize, bands: usize) -> Array3<f32> {
    Array3::from_shape_fn((height, width, bands), |(i, j, k)| {
        (i * 1000 + j * 10 + k) as f32
    })
}

fn record() -> ClassificationRecord {
    let mut tags = BTreeMap::new();
    tags.insert("scene".to_string(), SCENE_ID.to_string());
    ClassificationRecord::new(tags).unwrap()
}

fn georeference() -> Georeference {
    // 6x5 scene with 10 m pixels.
    let geometry = ReferenceGeometry {
        bounds: BoundingBox {
            minx: 500_000.0,
            miny: 4_999_940.0,
            maxx: 500_050.0,
            maxy: 5_000_000.0,
        },
        crs: "EPSG:32633".to_string(),
    };
    Georeference::resolve(&geometry, 5, 6).unwrap()
}

fn assert_bands_match(path: &Path, expected: &Array3<f32>) {
    let dataset = Dataset::open(path).unwrap();
    let (height, width, bands) = expected.dim();
    assert_eq!(dataset.raster_size(), (width, height));
    assert_eq!(dataset.raster_count() as usize, bands);

    for c in 0..bands {
        let band = dataset.rasterband(c + 1).unwrap();
        let buffer = band
            .read_as::<f64>((0, 0), (width, height), (width, height), None)
            .unwrap();
        let values: Vec<f64> = buffer.into_iter().collect();
        let plane: Vec<f64> = expected
            .index_axis(Axis(2), c)
            .iter()
            .map(|&v| v as f64)
            .collect();
        assert_eq!(values, plane, "band {} differs from channel {}", c + 1, c);
    }
}

#[test]
fn test_georeferenced_tile_header() {
    let dir = TempDir::new().unwrap();
    let georef = georeference();
    let subscene = Subscene::from_parts(
        SCENE_ID,
        scene_array(6, 5, 3),
        TileSize::new(4, 4).unwrap(),
        record(),
        Some(georef.clone()),
    )
    .unwrap();

    let tile = &subscene.tiles()[3];
    let path = io::write_image_tile(
        dir.path(),
        tile,
        Some(&georef.transform),
        &GeoTiffOptions::default(),
    )
    .unwrap();
    assert_eq!(path, dir.path().join(format!("{}.tif", tile.id)));

    let dataset = Dataset::open(&path).unwrap();
    let gt = dataset.geo_transform().unwrap();
    let bounds = tile.bounds.unwrap();
    assert_eq!(gt, [bounds.minx, 10.0, 0.0, bounds.maxy, 0.0, -10.0]);
    assert_eq!(gt[0], 500_040.0);
    assert_eq!(gt[3], 4_999_960.0);

    let spatial_ref = dataset.spatial_ref().unwrap();
    assert_eq!(spatial_ref.auth_code().unwrap(), 32633);

    // Padded edge tile: full 4x4 block, zeros outside the valid 2x1 region.
    assert_bands_match(&path, &tile.pixels);

    let read_back = io::read_image_tile(&path).unwrap();
    assert_eq!(read_back.geo_transform, Some(gt));
    assert_eq!(read_back.crs.as_deref(), Some("EPSG:32633"));
}

#[test]
fn test_plain_tile_has_no_georeference() {
    let dir = TempDir::new().unwrap();
    let subscene = Subscene::from_parts(
        SCENE_ID,
        scene_array(6, 5, 3),
        TileSize::new(4, 4).unwrap(),
        record(),
        None,
    )
    .unwrap();

    let options = GeoTiffOptions {
        sample_type: SampleType::F32,
        compression: Compression::Deflate,
    };
    let tile = &subscene.tiles()[0];
    let path = io::write_image_tile(dir.path(), tile, None, &options).unwrap();

    let dataset = Dataset::open(&path).unwrap();
    assert!(dataset.geo_transform().is_err());
    assert!(dataset.spatial_ref().is_err());
    assert_bands_match(&path, &tile.pixels);

    let read_back = io::read_image_tile(&path).unwrap();
    assert_eq!(read_back.geo_transform, None);
    assert_eq!(read_back.crs, None);
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new(scene: &Array3<f32>, mask: &Array3<bool>) -> Self {
        let dir = TempDir::new().unwrap();
        for sub in [
            "in/subscenes",
            "in/masks",
            "out/subscenes",
            "out/masks",
            "out/metadata/subscenes",
            "out/metadata",
        ] {
            fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        write_npy(dir.path().join(format!("in/subscenes/{}.npy", SCENE_ID)), scene).unwrap();
        write_npy(dir.path().join(format!("in/masks/{}.npy", SCENE_ID)), mask).unwrap();
        fs::write(
            dir.path().join("in/tags.csv"),
            format!("scene,clouds\n{},1\n", SCENE_ID),
        )
        .unwrap();
        Self { dir }
    }

    fn path(&self, sub: &str) -> PathBuf {
        self.dir.path().join(sub)
    }

    fn pair(&self) -> ScenePair {
        ScenePair {
            subscene: self.path(&format!("in/subscenes/{}.npy", SCENE_ID)),
            mask: self.path(&format!("in/masks/{}.npy", SCENE_ID)),
        }
    }

    fn pipeline_config(&self, tile_size: TileSize) -> PipelineConfig {
        PipelineConfig {
            subscene_dir: self.path("in/subscenes"),
            mask_dir: self.path("in/masks"),
            classification_tags: self.path("in/tags.csv"),
            georeferencing: Georeferencing::Disabled,
            tile_size,
            first_n: None,
            output: OutputDirs {
                subscenes: self.path("out/subscenes"),
                masks: self.path("out/masks"),
                scene_metadata: self.path("out/metadata/subscenes"),
                dataset_metadata: self.path("out/metadata"),
            },
            geotiff: GeoTiffOptions::default(),
            fail_fast: true,
        }
    }

    fn verify_config(&self, tile_size: TileSize) -> VerifyConfig {
        VerifyConfig {
            metadata_dir: self.path("out/metadata/subscenes"),
            subscene_dir: self.path("in/subscenes"),
            image_tile_dir: self.path("out/subscenes"),
            mask_tile_dir: self.path("out/masks"),
            tile_size,
            sample_type: SampleType::U16,
            coverage_tolerance: DEFAULT_COVERAGE_TOLERANCE,
        }
    }

    fn table(&self) -> ClassificationTable {
        ClassificationTable::from_path(&self.path("in/tags.csv")).unwrap()
    }

    fn is_empty(&self, sub: &str) -> bool {
        fs::read_dir(self.path(sub)).unwrap().next().is_none()
    }
}

fn cloud_mask(height: usize, width: usize) -> Array3<bool> {
    let mut mask = Array3::from_elem((height, width, 3), false);
    mask.slice_mut(s![.., ..width / 2, CLOUD]).fill(true);
    mask.slice_mut(s![.., width / 2.., CLEAR]).fill(true);
    mask
}

#[test]
fn test_mismatched_pair_writes_nothing() {
    // 8x8 scene gives 4 tiles, 12x4 mask gives 3.
    let ws = Workspace::new(&scene_array(8, 8, 2), &cloud_mask(12, 4));
    let size = TileSize::new(4, 4).unwrap();

    let result = process_pair(&ws.pair(), &ws.table(), &ws.pipeline_config(size));
    assert!(matches!(result, Err(TilerError::PairingMismatch { .. })));

    assert!(ws.is_empty("out/subscenes"));
    assert!(ws.is_empty("out/masks"));
    assert!(ws.is_empty("out/metadata/subscenes"));
}

#[test]
fn test_processed_pair_verifies_clean() {
    let ws = Workspace::new(&scene_array(10, 7, 4), &cloud_mask(10, 7));
    let size = TileSize::new(4, 4).unwrap();

    let tiles = process_pair(&ws.pair(), &ws.table(), &ws.pipeline_config(size)).unwrap();
    assert_eq!(tiles, 6);

    let report = verify_outputs(&ws.verify_config(size)).unwrap();
    assert!(report.is_clean(), "{:?}", report);
    assert_eq!(report.scenes, 1);
    assert_eq!(report.tiles_checked, 6);
    assert_eq!(report.image_files, 6);
    assert_eq!(report.mask_files, 6);
}

#[test]
fn test_verification_reports_damaged_outputs() {
    let ws = Workspace::new(&scene_array(10, 7, 4), &cloud_mask(10, 7));
    let size = TileSize::new(4, 4).unwrap();
    process_pair(&ws.pair(), &ws.table(), &ws.pipeline_config(size)).unwrap();

    // Clear the first mask tile, recorded as 12/16 cloudy.
    let first_mask = ws.path(&format!("out/masks/{}_TL_RS0_RE4_CS0_CE4.npy", SCENE_ID));
    let mut clear = Array3::<u8>::zeros((4, 4, 3));
    clear.index_axis_mut(Axis(2), CLEAR).fill(1);
    write_npy(&first_mask, &clear).unwrap();

    // Drop the last image tile.
    fs::remove_file(ws.path(&format!("out/subscenes/{}_TL_RS8_RE10_CS4_CE7.tif", SCENE_ID)))
        .unwrap();

    let report = verify_outputs(&ws.verify_config(size)).unwrap();
    assert_eq!(report.coverage_mismatches, 1);
    assert_eq!(report.missing_files, 1);
    assert_eq!(report.image_files, 5);
    assert_eq!(report.mask_files, 6);
    assert!(!report.is_clean());
}

#[test]
fn test_verification_rejects_wrong_tile_size() {
    let ws = Workspace::new(&scene_array(10, 7, 4), &cloud_mask(10, 7));
    process_pair(&ws.pair(), &ws.table(), &ws.pipeline_config(TileSize::new(4, 4).unwrap()))
        .unwrap();

    let report = verify_outputs(&ws.verify_config(TileSize::new(5, 4).unwrap())).unwrap();
    assert_eq!(report.dimension_mismatches, 6);
}
