use crate::classification::ClassificationRecord;
use crate::error::{Result, TilerError};
use crate::georef::GeospatialBounds;
use crate::scene::{Mask, Subscene};
use crate::tiling::TileCoordinates;
use log::debug;
use serde::{Deserialize, Serialize};

pub const IMAGE_TILE_EXTENSION: &str = "tif";
pub const MASK_TILE_EXTENSION: &str = "npy";

pub fn tile_filename(tile_id: &str, extension: &str) -> String {
    format!("{}.{}", tile_id, extension)
}

/// Pairing of one image tile with the mask tile at the same grid position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileMetadataRecord {
    pub id: String,
    pub image_filename: String,
    pub mask_filename: String,
    pub product_id: String,
    pub original_coords: TileCoordinates,
    pub geospatial_bounds: Option<GeospatialBounds>,
    pub cloud_coverage: f64,
}

/// Per-scene envelope written as `{scene_id}.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneMetadata {
    pub id: String,
    pub product_id: String,
    pub classification_tags: ClassificationRecord,
    pub tiles: Vec<TileMetadataRecord>,
}

/// Positional pairing is only valid for grids of equal length, equal tile size
/// and equal original dimensions.
pub fn check_pairing(subscene: &Subscene, mask: &Mask) -> Result<()> {
    let mismatch = |detail: String| TilerError::PairingMismatch {
        scene: subscene.id().to_string(),
        detail,
    };

    if subscene.tiles().len() != mask.tiles().len() {
        return Err(mismatch(format!(
            "subscene has {} tiles, mask {} has {}",
            subscene.tiles().len(),
            mask.id(),
            mask.tiles().len()
        )));
    }

    let image_size = subscene.raster().tile_size();
    let mask_size = mask.raster().tile_size();
    if image_size != mask_size {
        return Err(mismatch(format!(
            "tile size {}x{} differs from mask tile size {}x{}",
            image_size.height(),
            image_size.width(),
            mask_size.height(),
            mask_size.width()
        )));
    }

    let image_dims = (subscene.raster().height(), subscene.raster().width());
    let mask_dims = (mask.raster().height(), mask.raster().width());
    if image_dims != mask_dims {
        return Err(mismatch(format!(
            "raster is {}x{} but mask is {}x{}",
            image_dims.0, image_dims.1, mask_dims.0, mask_dims.1
        )));
    }

    Ok(())
}

/// Build the scene metadata by pairing tiles index by index.
pub fn assemble(subscene: &Subscene, mask: &Mask) -> Result<SceneMetadata> {
    check_pairing(subscene, mask)?;

    let product_id = subscene.product_id().to_string();
    let tiles = subscene
        .tiles()
        .iter()
        .zip(mask.tiles())
        .map(|(image_tile, mask_tile)| TileMetadataRecord {
            id: image_tile.id.clone(),
            image_filename: tile_filename(&image_tile.id, IMAGE_TILE_EXTENSION),
            mask_filename: tile_filename(mask_tile.id(), MASK_TILE_EXTENSION),
            product_id: product_id.clone(),
            original_coords: image_tile.coords,
            geospatial_bounds: image_tile.bounds,
            cloud_coverage: mask_tile.cloud_coverage,
        })
        .collect::<Vec<_>>();

    debug!("Assembled {} tile records for {}", tiles.len(), subscene.id());

    Ok(SceneMetadata {
        id: subscene.id().to_string(),
        product_id,
        classification_tags: subscene.classification().clone(),
        tiles,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::CLOUD;
    use crate::georef::{BoundingBox, Georeference, ReferenceGeometry};
    use crate::tiling::TileSize;
    use ndarray::{s, Array3};
    use std::collections::BTreeMap;

    fn record(scene: &str) -> ClassificationRecord {
        let mut tags = BTreeMap::new();
        tags.insert("scene".to_string(), scene.to_string());
        tags.insert("clouds".to_string(), "1".to_string());
        ClassificationRecord::new(tags).unwrap()
    }

    fn subscene(height: usize, width: usize, tile_size: TileSize) -> Subscene {
        let data = Array3::<f32>::zeros((height, width, 2));
        Subscene::from_parts("scene", data, tile_size, record("scene"), None).unwrap()
    }

    fn mask(height: usize, width: usize, tile_size: TileSize) -> Mask {
        let mut data = Array3::<u8>::zeros((height, width, 3));
        data.slice_mut(s![.., .., CLOUD]).fill(1);
        Mask::from_parts("scene", data, tile_size).unwrap()
    }

    #[test]
    fn test_tile_count_mismatch_is_rejected() {
        let size = TileSize::new(4, 4).unwrap();
        let image = subscene(8, 8, size); // 4 tiles
        let mask = mask(12, 4, size); // 3 tiles

        let result = assemble(&image, &mask);
        assert!(matches!(result, Err(TilerError::PairingMismatch { .. })));
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let size = TileSize::new(4, 4).unwrap();
        // Same tile count, different original extent.
        let image = subscene(8, 8, size);
        let mask = mask(7, 8, size);

        let err = assemble(&image, &mask).unwrap_err();
        assert!(err.to_string().contains("7x8"));
    }

    #[test]
    fn test_tile_size_mismatch_is_rejected() {
        // Both grids hold 4 tiles over 8x8 rasters, cut at different sizes.
        let image = subscene(8, 8, TileSize::new(8, 2).unwrap());
        let cloud_mask = mask(8, 8, TileSize::new(4, 4).unwrap());

        let err = check_pairing(&image, &cloud_mask).unwrap_err();
        assert!(err.to_string().contains("tile size 8x2"));
    }

    #[test]
    fn test_records_follow_tiling_order() {
        let size = TileSize::new(4, 4).unwrap();
        let image = subscene(6, 6, size);
        let mask = mask(6, 6, size);

        let metadata = assemble(&image, &mask).unwrap();
        assert_eq!(metadata.id, "scene");
        assert_eq!(metadata.product_id, "scene");
        assert_eq!(metadata.tiles.len(), 4);

        let first = &metadata.tiles[0];
        assert_eq!(first.id, "scene_TL_RS0_RE4_CS0_CE4");
        assert_eq!(first.image_filename, "scene_TL_RS0_RE4_CS0_CE4.tif");
        assert_eq!(first.mask_filename, "scene_TL_RS0_RE4_CS0_CE4.npy");
        assert_eq!(first.cloud_coverage, 1.0);
        assert!(first.geospatial_bounds.is_none());

        let last = &metadata.tiles[3];
        assert!(last.original_coords.is_padded);
        assert!((last.cloud_coverage - 4.0 / 16.0).abs() < 1e-12);
    }

    #[test]
    fn test_json_layout() {
        let size = TileSize::new(4, 4).unwrap();
        let data = Array3::<f32>::zeros((4, 4, 1));
        let geometry = ReferenceGeometry {
            bounds: BoundingBox {
                minx: 0.0,
                miny: 0.0,
                maxx: 40.0,
                maxy: 40.0,
            },
            crs: "EPSG:32633".to_string(),
        };
        let georef = Georeference::resolve(&geometry, 4, 4).unwrap();
        let image = Subscene::from_parts("scene", data, size, record("scene"), Some(georef)).unwrap();
        let mask = mask(4, 4, size);

        let json = serde_json::to_value(assemble(&image, &mask).unwrap()).unwrap();
        assert_eq!(json["classification_tags"]["clouds"], "1");

        let tile = &json["tiles"][0];
        assert_eq!(tile["original_coords"]["row_end"], 4);
        assert_eq!(tile["original_coords"]["is_padded"], false);
        assert_eq!(tile["geospatial_bounds"]["maxy"], 40.0);
        assert_eq!(tile["geospatial_bounds"]["miny"], 0.0);
        assert_eq!(tile["cloud_coverage"], 1.0);
    }
}
