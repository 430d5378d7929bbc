use crate::crs;
use crate::error::{Result, TilerError};
use crate::georef::{AffineTransform, BoundingBox, ReferenceGeometry};
use crate::metadata::{tile_filename, SceneMetadata, IMAGE_TILE_EXTENSION, MASK_TILE_EXTENSION};
use crate::raster::Tile;
use crate::reference::DatasetMetadata;
use crate::scene::{Mask, Subscene};
use clap::ValueEnum;
use gdal::cpl::CslStringList;
use gdal::raster::{Buffer, GdalType};
use gdal::vector::LayerAccess;
use gdal::{Dataset, DriverManager};
use log::{debug, info};
use ndarray::{Array2, Array3, Axis};
use ndarray_npy::{read_npy, write_npy, ReadNpyError, ReadableElement};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

pub const DATASET_METADATA_FILE: &str = "dataset_metadata.json";

/// Sample type of the written image tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SampleType {
    U16,
    F32,
}

impl SampleType {
    /// Value a scene sample takes once stored with this sample type.
    pub fn cast(&self, value: f32) -> f64 {
        match self {
            SampleType::U16 => (value as u16) as f64,
            SampleType::F32 => value as f64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Compression {
    None,
    Deflate,
    Lzw,
    Zstd,
}

impl Compression {
    pub fn gdal_name(&self) -> &'static str {
        match self {
            Compression::None => "NONE",
            Compression::Deflate => "DEFLATE",
            Compression::Lzw => "LZW",
            Compression::Zstd => "ZSTD",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeoTiffOptions {
    pub sample_type: SampleType,
    pub compression: Compression,
}

impl Default for GeoTiffOptions {
    fn default() -> Self {
        Self {
            sample_type: SampleType::U16,
            compression: Compression::None,
        }
    }
}

/// GTiff creation options for an internally tiled output.
pub fn creation_options(options: &GeoTiffOptions) -> Vec<String> {
    vec![
        "TILED=YES".to_string(),
        format!("COMPRESS={}", options.compression.gdal_name()),
    ]
}

// ---------------------------------------------------------------------------
// npy arrays

/// Read a 3-D npy array of element type `T`, converting it to `U`.
/// Returns `None` when the file stores a different element type.
fn read_npy_as<T, U>(path: &Path, convert: impl Fn(T) -> U) -> Result<Option<Array3<U>>>
where
    T: ReadableElement + Copy,
{
    match read_npy::<_, Array3<T>>(path) {
        Ok(array) => Ok(Some(array.mapv(convert))),
        Err(ReadNpyError::WrongDescriptor(descr)) => {
            debug!("{}: element type {:?} skipped", path.display(), descr);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Read a (height, width, bands) scene array as `f32`.
pub fn read_scene_array(path: &Path) -> Result<Array3<f32>> {
    info!("Reading scene array: {}", path.display());

    let array = match read_npy_as::<f32, f32>(path, |v| v)? {
        Some(array) => array,
        None => match read_npy_as::<f64, f32>(path, |v| v as f32)? {
            Some(array) => array,
            None => match read_npy_as::<u16, f32>(path, f32::from)? {
                Some(array) => array,
                None => read_npy_as::<u8, f32>(path, f32::from)?
                    .ok_or_else(|| TilerError::UnsupportedSampleType(path.to_path_buf()))?,
            },
        },
    };

    debug!("Scene array shape: {:?}", array.shape());
    Ok(array)
}

/// Float mask sample as a one-hot flag; anything but exact 0 or 1 is rejected.
pub fn one_hot_value(value: f32) -> Option<u8> {
    if value == 0.0 {
        Some(0)
    } else if value == 1.0 {
        Some(1)
    } else {
        None
    }
}

/// Read a (height, width, 3) one-hot mask array as `u8`.
pub fn read_mask_array(path: &Path) -> Result<Array3<u8>> {
    info!("Reading mask array: {}", path.display());

    let array = match read_npy_as::<bool, u8>(path, u8::from)? {
        Some(array) => array,
        None => match read_npy_as::<u8, u8>(path, |v| v)? {
            Some(array) => array,
            None => {
                let values = read_npy_as::<f32, Option<u8>>(path, one_hot_value)?
                    .ok_or_else(|| TilerError::UnsupportedSampleType(path.to_path_buf()))?;
                if values.iter().any(Option::is_none) {
                    return Err(TilerError::InvalidMaskValue(path.to_path_buf()));
                }
                values.mapv(Option::unwrap_or_default)
            }
        },
    };

    debug!("Mask array shape: {:?}", array.shape());
    Ok(array)
}

/// Write one mask tile as a raw `u8` npy array.
pub fn write_mask_tile(output_dir: &Path, tile: &Tile<u8>) -> Result<PathBuf> {
    let path = output_dir.join(tile_filename(&tile.id, MASK_TILE_EXTENSION));
    write_npy(&path, &tile.pixels)?;
    debug!("Wrote mask tile {}", path.display());
    Ok(path)
}

pub fn write_mask_tiles(output_dir: &Path, mask: &Mask) -> Result<usize> {
    for mask_tile in mask.tiles() {
        write_mask_tile(output_dir, &mask_tile.tile)?;
    }
    info!("Wrote {} mask tiles for {}", mask.tiles().len(), mask.id());
    Ok(mask.tiles().len())
}

// ---------------------------------------------------------------------------
// Reference geometry

pub fn reference_geometry_path(shapefile_dir: &Path, scene_id: &str) -> PathBuf {
    shapefile_dir
        .join(scene_id)
        .join(format!("{}.shp", scene_id))
}

/// Envelope of the first feature in the scene's shapefile plus the layer CRS.
pub fn read_reference_geometry(shapefile_dir: &Path, scene_id: &str) -> Result<ReferenceGeometry> {
    let path = reference_geometry_path(shapefile_dir, scene_id);
    if !path.exists() {
        return Err(TilerError::NotFound(path));
    }

    debug!("Opening reference geometry: {}", path.display());
    let dataset = Dataset::open(&path)?;
    let mut layer = dataset.layer(0)?;

    let spatial_ref = layer
        .spatial_ref()
        .ok_or_else(|| TilerError::MissingCrs(path.clone()))?;
    let crs = crs::crs_string(&spatial_ref)?;

    let mut features = layer.features();
    let feature = features
        .next()
        .ok_or_else(|| TilerError::MissingGeometry(path.clone()))?;
    let geometry = feature
        .geometry()
        .ok_or_else(|| TilerError::MissingGeometry(path.clone()))?;
    let envelope = geometry.envelope();

    let bounds = BoundingBox {
        minx: envelope.MinX,
        miny: envelope.MinY,
        maxx: envelope.MaxX,
        maxy: envelope.MaxY,
    };

    info!(
        "Reference geometry for {}: x=[{:.3}, {:.3}], y=[{:.3}, {:.3}], crs={}",
        scene_id, bounds.minx, bounds.maxx, bounds.miny, bounds.maxy, crs
    );

    Ok(ReferenceGeometry { bounds, crs })
}

// ---------------------------------------------------------------------------
// GeoTIFF tiles

fn write_tile_bands<T: GdalType + Copy>(
    path: &Path,
    tile: &Tile<f32>,
    transform: Option<&AffineTransform>,
    options: &GeoTiffOptions,
    convert: impl Fn(f32) -> T,
) -> Result<()> {
    let (height, width, bands) = tile.pixels.dim();

    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut gdal_options = CslStringList::new();
    for opt in creation_options(options) {
        gdal_options.add_string(&opt)?;
    }

    let mut dataset = driver.create_with_band_type_with_options::<T, _>(
        path,
        width,
        height,
        bands,
        &gdal_options,
    )?;

    // Tiles without georeferencing are written without transform and CRS.
    if let (Some(transform), Some(bounds), Some(crs)) = (transform, &tile.bounds, &tile.crs) {
        dataset.set_geo_transform(&transform.for_tile(bounds).to_geo_transform())?;
        dataset.set_spatial_ref(&crs::spatial_ref_from_crs(crs)?)?;
    }

    for band_idx in 0..bands {
        let band_data: Vec<T> = tile
            .pixels
            .index_axis(Axis(2), band_idx)
            .iter()
            .map(|&v| convert(v))
            .collect();
        let mut buffer = Buffer::new((width, height), band_data);

        let mut raster_band = dataset.rasterband(band_idx + 1)?;
        raster_band.write((0, 0), (width, height), &mut buffer)?;
    }

    Ok(())
}

/// Write one image tile as a multi-band GeoTIFF (channel `c` → band `c + 1`).
pub fn write_image_tile(
    output_dir: &Path,
    tile: &Tile<f32>,
    transform: Option<&AffineTransform>,
    options: &GeoTiffOptions,
) -> Result<PathBuf> {
    let path = output_dir.join(tile_filename(&tile.id, IMAGE_TILE_EXTENSION));

    match options.sample_type {
        SampleType::U16 => write_tile_bands::<u16>(&path, tile, transform, options, |v| v as u16)?,
        SampleType::F32 => write_tile_bands::<f32>(&path, tile, transform, options, |v| v)?,
    }

    debug!("Wrote image tile {}", path.display());
    Ok(path)
}

pub fn write_image_tiles(
    output_dir: &Path,
    subscene: &Subscene,
    options: &GeoTiffOptions,
) -> Result<usize> {
    let transform = subscene.georeference().map(|g| &g.transform);
    for tile in subscene.tiles() {
        write_image_tile(output_dir, tile, transform, options)?;
    }
    info!("Wrote {} image tiles for {}", subscene.tiles().len(), subscene.id());
    Ok(subscene.tiles().len())
}

/// A GeoTIFF tile read back from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTile {
    /// (height, width, bands), band `b + 1` in channel `b`.
    pub pixels: Array3<f64>,
    pub geo_transform: Option<[f64; 6]>,
    pub crs: Option<String>,
}

pub fn read_image_tile(path: &Path) -> Result<ImageTile> {
    let dataset = Dataset::open(path)?;
    let (width, height) = dataset.raster_size();
    let bands = dataset.raster_count() as usize;

    if width == 0 || height == 0 {
        return Err(TilerError::InvalidDimensions(height, width));
    }

    let mut pixels = Array3::<f64>::zeros((height, width, bands));
    for band_idx in 0..bands {
        let rasterband = dataset.rasterband(band_idx + 1)?;
        let buffer = rasterband.read_as::<f64>((0, 0), (width, height), (width, height), None)?;
        let data_vec: Vec<f64> = buffer.into_iter().collect();
        let plane = Array2::from_shape_vec((height, width), data_vec)?;
        pixels.index_axis_mut(Axis(2), band_idx).assign(&plane);
    }

    // GDAL reports a missing transform or CRS as an error.
    let geo_transform = dataset.geo_transform().ok();
    let crs = match dataset.spatial_ref() {
        Ok(spatial_ref) => Some(crs::crs_string(&spatial_ref)?),
        Err(_) => None,
    };

    Ok(ImageTile {
        pixels,
        geo_transform,
        crs,
    })
}

// ---------------------------------------------------------------------------
// JSON metadata

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

pub fn write_scene_metadata(output_dir: &Path, metadata: &SceneMetadata) -> Result<PathBuf> {
    let path = output_dir.join(format!("{}.json", metadata.id));
    write_json(&path, metadata)?;
    debug!("Wrote scene metadata {}", path.display());
    Ok(path)
}

pub fn write_dataset_metadata(output_dir: &Path, metadata: &DatasetMetadata) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(DATASET_METADATA_FILE);
    write_json(&path, metadata)?;
    info!("Dataset metadata saved to {}", path.display());
    Ok(path)
}

/// Sorted `*.{extension}` files directly inside `dir`.
pub fn list_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().map_or(false, |ext| ext == extension) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
