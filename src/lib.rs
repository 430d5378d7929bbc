// Library exports for testing and reuse

pub mod classification;
pub mod cli;
pub mod coverage;
pub mod crs;
pub mod error;
pub mod georef;
pub mod io;
pub mod metadata;
pub mod pipeline;
pub mod raster;
pub mod reference;
pub mod scene;
pub mod tiling;
pub mod verify;

// Re-export commonly used types
pub use classification::{ClassificationRecord, ClassificationTable};
pub use coverage::cloud_coverage;
pub use error::{Result, TilerError};
pub use georef::{AffineTransform, GeospatialBounds, Georeference};
pub use metadata::{assemble, SceneMetadata, TileMetadataRecord};
pub use pipeline::{run, PipelineConfig, RunSummary};
pub use raster::{Tile, TileableRaster};
pub use scene::{Georeferencing, Mask, MaskTile, Subscene};
pub use tiling::{TileCoordinates, TileSize};
