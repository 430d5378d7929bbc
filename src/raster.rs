use crate::error::{Result, TilerError};
use crate::georef::{GeospatialBounds, Georeference};
use crate::tiling::{self, PaddingInfo, TileCoordinates, TileSize};
use log::debug;
use ndarray::Array3;
use num_traits::Zero;

/// One grid cell cut from a raster. Never mutated after tiling.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile<T> {
    pub id: String,
    pub pixels: Array3<T>,
    pub coords: TileCoordinates,
    pub bounds: Option<GeospatialBounds>,
    pub crs: Option<String>,
}

/// A (height, width, channels) raster bound to a fixed tile size.
#[derive(Debug, Clone)]
pub struct TileableRaster<T> {
    id: String,
    data: Array3<T>,
    tile_size: TileSize,
}

impl<T: Clone + Zero> TileableRaster<T> {
    pub fn new(id: impl Into<String>, data: Array3<T>, tile_size: TileSize) -> Result<Self> {
        let (height, width, channels) = data.dim();
        if height == 0 || width == 0 || channels == 0 {
            return Err(TilerError::InvalidDimensions(height, width));
        }

        Ok(Self {
            id: id.into(),
            data,
            tile_size,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn data(&self) -> &Array3<T> {
        &self.data
    }

    pub fn tile_size(&self) -> TileSize {
        self.tile_size
    }

    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    pub fn channels(&self) -> usize {
        self.data.dim().2
    }

    pub fn pad(&self) -> (Array3<T>, PaddingInfo) {
        tiling::pad(&self.data, self.tile_size)
    }

    /// Pad, slice and label every tile. Bounds and CRS are attached only when
    /// a georeference is given.
    pub fn tiles(&self, georeference: Option<&Georeference>) -> Result<Vec<Tile<T>>> {
        let (padded, padding) = self.pad();
        let blocks = tiling::tile(&padded, self.tile_size, self.height(), self.width())?;

        debug!(
            "{}: {} tiles from {}x{} raster (padding {}x{})",
            self.id,
            blocks.len(),
            self.height(),
            self.width(),
            padding.pad_height,
            padding.pad_width
        );

        let tiles = blocks
            .into_iter()
            .map(|(window, pixels)| {
                let bounds = georeference.map(|g| {
                    g.transform
                        .tile_bounds(window.row_offset, window.col_offset, self.tile_size)
                });
                Tile {
                    id: tiling::tile_id(&self.id, &window.coords),
                    pixels,
                    coords: window.coords,
                    bounds,
                    crs: georeference.map(|g| g.crs.clone()),
                }
            })
            .collect();

        Ok(tiles)
    }
}
