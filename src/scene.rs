use crate::classification::{ClassificationRecord, ClassificationTable};
use crate::coverage::{self, MASK_CHANNELS};
use crate::error::{Result, TilerError};
use crate::georef::Georeference;
use crate::io;
use crate::raster::{Tile, TileableRaster};
use crate::tiling::TileSize;
use log::info;
use ndarray::Array3;
use std::path::{Path, PathBuf};

/// Where a subscene's georeferencing comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Georeferencing {
    /// Tiles carry no bounds and no CRS.
    Disabled,
    /// Per-scene shapefiles at `{dir}/{scene_id}/{scene_id}.shp`.
    Shapefile(PathBuf),
}

/// Entity id of a raster file: the file name up to its first dot.
pub fn entity_id(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('.').next())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| TilerError::InvalidFileName(path.to_path_buf()))
}

/// A satellite scene, its classification record and its eagerly computed tiles.
#[derive(Debug)]
pub struct Subscene {
    raster: TileableRaster<f32>,
    georeference: Option<Georeference>,
    classification: ClassificationRecord,
    tiles: Vec<Tile<f32>>,
}

impl Subscene {
    pub fn load(
        path: &Path,
        tile_size: TileSize,
        classification: &ClassificationTable,
        georeferencing: &Georeferencing,
    ) -> Result<Self> {
        let id = entity_id(path)?;
        let record = classification.record_for(&id)?.clone();
        let data = io::read_scene_array(path)?;
        let (height, width, _) = data.dim();

        let georeference = match georeferencing {
            Georeferencing::Disabled => None,
            Georeferencing::Shapefile(dir) => {
                let geometry = io::read_reference_geometry(dir, &id)?;
                Some(Georeference::resolve(&geometry, width, height)?)
            }
        };

        Self::from_parts(id, data, tile_size, record, georeference)
    }

    pub fn from_parts(
        id: impl Into<String>,
        data: Array3<f32>,
        tile_size: TileSize,
        classification: ClassificationRecord,
        georeference: Option<Georeference>,
    ) -> Result<Self> {
        let raster = TileableRaster::new(id, data, tile_size)?;
        let tiles = raster.tiles(georeference.as_ref())?;

        info!(
            "Subscene {}: {}x{}x{} → {} tiles{}",
            raster.id(),
            raster.height(),
            raster.width(),
            raster.channels(),
            tiles.len(),
            if georeference.is_some() { " (georeferenced)" } else { "" }
        );

        Ok(Self {
            raster,
            georeference,
            classification,
            tiles,
        })
    }

    pub fn id(&self) -> &str {
        self.raster.id()
    }

    pub fn raster(&self) -> &TileableRaster<f32> {
        &self.raster
    }

    pub fn georeference(&self) -> Option<&Georeference> {
        self.georeference.as_ref()
    }

    pub fn classification(&self) -> &ClassificationRecord {
        &self.classification
    }

    pub fn product_id(&self) -> &str {
        self.classification.product_id()
    }

    pub fn tiles(&self) -> &[Tile<f32>] {
        &self.tiles
    }
}

/// A mask tile annotated with its cloud coverage.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskTile {
    pub tile: Tile<u8>,
    pub cloud_coverage: f64,
}

impl MaskTile {
    pub fn annotate(tile: Tile<u8>) -> Result<Self> {
        let cloud_coverage = coverage::cloud_coverage(&tile.pixels.view())?;
        Ok(Self {
            tile,
            cloud_coverage,
        })
    }

    pub fn id(&self) -> &str {
        &self.tile.id
    }
}

/// One-hot cloud mask co-registered with a subscene.
#[derive(Debug)]
pub struct Mask {
    raster: TileableRaster<u8>,
    tiles: Vec<MaskTile>,
}

impl Mask {
    pub fn load(path: &Path, tile_size: TileSize) -> Result<Self> {
        let id = entity_id(path)?;
        let data = io::read_mask_array(path)?;
        Self::from_parts(id, data, tile_size)
    }

    pub fn from_parts(id: impl Into<String>, data: Array3<u8>, tile_size: TileSize) -> Result<Self> {
        let channels = data.dim().2;
        if channels != MASK_CHANNELS {
            return Err(TilerError::InvalidMaskShape(channels));
        }

        let raster = TileableRaster::new(id, data, tile_size)?;
        let tiles = raster
            .tiles(None)?
            .into_iter()
            .map(MaskTile::annotate)
            .collect::<Result<Vec<_>>>()?;

        info!(
            "Mask {}: {}x{} → {} tiles",
            raster.id(),
            raster.height(),
            raster.width(),
            tiles.len()
        );

        Ok(Self { raster, tiles })
    }

    pub fn id(&self) -> &str {
        self.raster.id()
    }

    pub fn raster(&self) -> &TileableRaster<u8> {
        &self.raster
    }

    pub fn tiles(&self) -> &[MaskTile] {
        &self.tiles
    }
}
