use crate::error::{Result, TilerError};
use crate::tiling::TileSize;
use log::debug;
use serde::{Deserialize, Serialize};

/// Bounding box of the scene's reference polygon in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
}

/// Reference polygon extent plus the CRS it is expressed in.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceGeometry {
    pub bounds: BoundingBox,
    pub crs: String,
}

/// World-coordinate footprint of one tile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeospatialBounds {
    pub minx: f64,
    pub maxx: f64,
    pub miny: f64,
    pub maxy: f64,
}

/// North-up pixel→world mapping: `x = x0 + col*a`, `y = y0 + row*e`, `e < 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
    pub x0: f64,
    pub y0: f64,
    pub a: f64,
    pub e: f64,
}

impl AffineTransform {
    /// Stretch the unpadded raster over the reference bounding box, origin at
    /// the top-left corner.
    pub fn from_bounds(bounds: &BoundingBox, width: usize, height: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(TilerError::InvalidDimensions(height, width));
        }

        let a = (bounds.maxx - bounds.minx) / width as f64;
        let e = -(bounds.maxy - bounds.miny) / height as f64;

        debug!(
            "Affine transform: origin=({:.6}, {:.6}), pixel size=({:.6}, {:.6})",
            bounds.minx, bounds.maxy, a, e
        );

        Ok(Self {
            x0: bounds.minx,
            y0: bounds.maxy,
            a,
            e,
        })
    }

    /// Footprint of the tile at raw padded-grid offset `(row_offset, col_offset)`.
    ///
    /// Edge tiles reach into the padded region: the bounds always cover the
    /// full tile, not only its valid pixels.
    pub fn tile_bounds(
        &self,
        row_offset: usize,
        col_offset: usize,
        tile_size: TileSize,
    ) -> GeospatialBounds {
        let minx = self.x0 + col_offset as f64 * self.a;
        let maxx = minx + tile_size.width() as f64 * self.a;
        let maxy = self.y0 + row_offset as f64 * self.e;
        let miny = maxy + tile_size.height() as f64 * self.e;

        GeospatialBounds {
            minx,
            maxx,
            miny,
            maxy,
        }
    }

    /// Same pixel size, re-anchored at a tile's top-left corner.
    pub fn for_tile(&self, bounds: &GeospatialBounds) -> Self {
        Self {
            x0: bounds.minx,
            y0: bounds.maxy,
            ..*self
        }
    }

    /// GDAL geotransform ordering.
    pub fn to_geo_transform(&self) -> [f64; 6] {
        [self.x0, self.a, 0.0, self.y0, 0.0, self.e]
    }
}

/// Resolved scene-level georeferencing shared by all tiles of a subscene.
#[derive(Debug, Clone, PartialEq)]
pub struct Georeference {
    pub transform: AffineTransform,
    pub crs: String,
}

impl Georeference {
    pub fn resolve(geometry: &ReferenceGeometry, width: usize, height: usize) -> Result<Self> {
        Ok(Self {
            transform: AffineTransform::from_bounds(&geometry.bounds, width, height)?,
            crs: geometry.crs.clone(),
        })
    }
}
