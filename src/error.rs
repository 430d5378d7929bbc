use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TilerError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Failed to read npy array: {0}")]
    ReadNpy(#[from] ndarray_npy::ReadNpyError),

    #[error("Failed to write npy array: {0}")]
    WriteNpy(#[from] ndarray_npy::WriteNpyError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("No classification record matches scene '{0}'")]
    DataIntegrity(String),

    #[error("Cannot pair tiles of scene '{scene}': {detail}")]
    PairingMismatch { scene: String, detail: String },

    #[error("Invalid sensor type '{0}', choose 'S2A' or 'S2B'")]
    InvalidArgument(String),

    #[error("Invalid tile size: {0}x{1} (both dimensions must be positive)")]
    InvalidTileSize(usize, usize),

    #[error("Raster has invalid dimensions: {0}x{1}")]
    InvalidDimensions(usize, usize),

    #[error("Mask must have 3 one-hot channels, found {0}")]
    InvalidMaskShape(usize),

    #[error("Reference geometry has no features: {}", .0.display())]
    MissingGeometry(PathBuf),

    #[error("Reference geometry has no coordinate reference system: {}", .0.display())]
    MissingCrs(PathBuf),

    #[error("Classification table is missing the '{0}' column")]
    MissingColumn(String),

    #[error("Cannot derive an id from file name: {}", .0.display())]
    InvalidFileName(PathBuf),

    #[error("Mask values must be 0 or 1: {}", .0.display())]
    InvalidMaskValue(PathBuf),

    #[error("Unsupported npy sample type in {}", .0.display())]
    UnsupportedSampleType(PathBuf),

    #[error("Failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Output verification failed for {0} tiles")]
    VerificationFailed(usize),
}

pub type Result<T> = std::result::Result<T, TilerError>;
