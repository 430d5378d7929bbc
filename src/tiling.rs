use crate::error::{Result, TilerError};
use log::debug;
use ndarray::{s, Array3, ArrayView3};
use num_traits::Zero;
use serde::{Deserialize, Serialize};

/// Height and width of one grid cell, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileSize {
    height: usize,
    width: usize,
}

impl TileSize {
    pub fn new(height: usize, width: usize) -> Result<Self> {
        if height == 0 || width == 0 {
            return Err(TilerError::InvalidTileSize(height, width));
        }
        Ok(Self { height, width })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn area(&self) -> usize {
        self.height * self.width
    }
}

impl Default for TileSize {
    fn default() -> Self {
        Self {
            height: 512,
            width: 512,
        }
    }
}

/// Zero rows/columns appended at the bottom/right to reach a tile multiple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaddingInfo {
    pub pad_height: usize,
    pub pad_width: usize,
}

impl PaddingInfo {
    pub fn for_dims(height: usize, width: usize, tile_size: TileSize) -> Self {
        Self {
            pad_height: (tile_size.height - height % tile_size.height) % tile_size.height,
            pad_width: (tile_size.width - width % tile_size.width) % tile_size.width,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.pad_height == 0 && self.pad_width == 0
    }
}

/// Extent of a tile in original (unpadded) pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileCoordinates {
    pub row_start: usize,
    pub row_end: usize,
    pub col_start: usize,
    pub col_end: usize,
    pub is_padded: bool,
}

impl TileCoordinates {
    pub fn valid_height(&self) -> usize {
        self.row_end - self.row_start
    }

    pub fn valid_width(&self) -> usize {
        self.col_end - self.col_start
    }
}

/// Deterministic tile id built from the clipped coordinates.
pub fn tile_id(entity_id: &str, coords: &TileCoordinates) -> String {
    format!(
        "{}_TL_RS{}_RE{}_CS{}_CE{}",
        entity_id, coords.row_start, coords.row_end, coords.col_start, coords.col_end
    )
}

/// Zero-pad a (height, width, channels) raster at the bottom/right so both
/// spatial axes become multiples of the tile size.
pub fn pad<T: Clone + Zero>(raster: &Array3<T>, tile_size: TileSize) -> (Array3<T>, PaddingInfo) {
    let (height, width, channels) = raster.dim();
    let padding = PaddingInfo::for_dims(height, width, tile_size);

    debug!(
        "Padding {}x{}x{} raster by {} rows, {} cols",
        height, width, channels, padding.pad_height, padding.pad_width
    );

    if padding.is_zero() {
        return (raster.clone(), padding);
    }

    let mut padded = Array3::zeros((
        height + padding.pad_height,
        width + padding.pad_width,
        channels,
    ));
    padded.slice_mut(s![..height, ..width, ..]).assign(raster);

    (padded, padding)
}

/// Placement of a single tile: its raw offset in the padded grid and its
/// clipped extent in the original raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileWindow {
    pub row_offset: usize,
    pub col_offset: usize,
    pub coords: TileCoordinates,
}

pub struct TileGrid {
    tile_size: TileSize,
    original_height: usize,
    original_width: usize,
    pub num_tiles_y: usize,
    pub num_tiles_x: usize,
    pub total_tiles: usize,
}

impl TileGrid {
    pub fn new(original_height: usize, original_width: usize, tile_size: TileSize) -> Self {
        // Ceiling division, equal to padded size / tile size
        let num_tiles_y = (original_height + tile_size.height - 1) / tile_size.height;
        let num_tiles_x = (original_width + tile_size.width - 1) / tile_size.width;
        let total_tiles = num_tiles_y * num_tiles_x;

        debug!(
            "TileGrid: {}x{} raster, tile={}x{} → {}x{} tiles ({} total)",
            original_height,
            original_width,
            tile_size.height,
            tile_size.width,
            num_tiles_y,
            num_tiles_x,
            total_tiles
        );

        Self {
            tile_size,
            original_height,
            original_width,
            num_tiles_y,
            num_tiles_x,
            total_tiles,
        }
    }

    pub fn padded_height(&self) -> usize {
        self.num_tiles_y * self.tile_size.height
    }

    pub fn padded_width(&self) -> usize {
        self.num_tiles_x * self.tile_size.width
    }

    pub fn iter(&self) -> TileIterator<'_> {
        TileIterator::new(self)
    }

    /// Window of the tile at a row-major linear index.
    pub fn window(&self, tile_idx: usize) -> TileWindow {
        let row_offset = (tile_idx / self.num_tiles_x) * self.tile_size.height;
        let col_offset = (tile_idx % self.num_tiles_x) * self.tile_size.width;

        let row_end_padded = row_offset + self.tile_size.height;
        let col_end_padded = col_offset + self.tile_size.width;

        let coords = TileCoordinates {
            row_start: row_offset,
            row_end: row_end_padded.min(self.original_height),
            col_start: col_offset,
            col_end: col_end_padded.min(self.original_width),
            is_padded: row_end_padded > self.original_height
                || col_end_padded > self.original_width,
        };

        TileWindow {
            row_offset,
            col_offset,
            coords,
        }
    }
}

pub struct TileIterator<'a> {
    grid: &'a TileGrid,
    current_idx: usize,
}

impl<'a> TileIterator<'a> {
    fn new(grid: &'a TileGrid) -> Self {
        Self {
            grid,
            current_idx: 0,
        }
    }
}

impl<'a> Iterator for TileIterator<'a> {
    type Item = TileWindow;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_idx < self.grid.total_tiles {
            let window = self.grid.window(self.current_idx);
            self.current_idx += 1;
            Some(window)
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.grid.total_tiles - self.current_idx;
        (remaining, Some(remaining))
    }
}

/// Slice a padded raster into row-major, full-size tiles.
///
/// The stored pixel block always has the full tile shape, even for edge
/// tiles; the valid part is only recorded in the returned coordinates.
pub fn tile<T: Clone>(
    padded: &Array3<T>,
    tile_size: TileSize,
    original_height: usize,
    original_width: usize,
) -> Result<Vec<(TileWindow, Array3<T>)>> {
    let grid = TileGrid::new(original_height, original_width, tile_size);

    let (padded_height, padded_width, _) = padded.dim();
    if padded_height != grid.padded_height() || padded_width != grid.padded_width() {
        return Err(TilerError::InvalidDimensions(padded_height, padded_width));
    }

    let tiles = grid
        .iter()
        .map(|window| {
            let block = padded
                .slice(s![
                    window.row_offset..window.row_offset + tile_size.height,
                    window.col_offset..window.col_offset + tile_size.width,
                    ..
                ])
                .to_owned();
            (window, block)
        })
        .collect();

    Ok(tiles)
}

/// View of the non-padded part of a tile block.
pub fn crop_valid<'a, T>(block: &'a Array3<T>, coords: &TileCoordinates) -> ArrayView3<'a, T> {
    block.slice(s![..coords.valid_height(), ..coords.valid_width(), ..])
}

/// Compare every tile's valid region with the original raster region named by
/// its coordinates. Returns the index of the first tile that does not match.
pub fn first_coordinate_mismatch<'a, T, I>(original: &Array3<T>, tiles: I) -> Option<usize>
where
    T: PartialEq + 'a,
    I: IntoIterator<Item = (&'a Array3<T>, &'a TileCoordinates)>,
{
    for (idx, (block, coords)) in tiles.into_iter().enumerate() {
        let (height, width, _) = original.dim();
        if coords.row_end > height || coords.col_end > width {
            debug!("Tile {} coordinates {:?} exceed raster {}x{}", idx, coords, height, width);
            return Some(idx);
        }
        let (block_height, block_width, _) = block.dim();
        if coords.valid_height() > block_height || coords.valid_width() > block_width {
            debug!("Tile {} block {:?} is smaller than {:?}", idx, block.shape(), coords);
            return Some(idx);
        }

        let original_region = original.slice(s![
            coords.row_start..coords.row_end,
            coords.col_start..coords.col_end,
            ..
        ]);
        let tile_region = crop_valid(block, coords);

        if original_region != tile_region {
            debug!(
                "Mismatch for tile {}: coordinates {:?}, original {:?}, tile {:?}",
                idx,
                coords,
                original_region.shape(),
                tile_region.shape()
            );
            return Some(idx);
        }
    }
    None
}
