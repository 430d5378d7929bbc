//! Static Sentinel-2 reference data shared by the whole dataset.
//!
//! Band tables follow the MSI instrument description published by NASA
//! Earthdata for the S2A and S2B platforms.

use crate::coverage::{CLEAR, CLOUD, CLOUD_SHADOW};
use crate::error::{Result, TilerError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Spectral band of the MSI instrument.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandInfo {
    pub band_id: &'static str,
    pub name: &'static str,
    /// Nanometres.
    pub center_wavelength: f64,
    /// Nanometres.
    pub bandwidth: u32,
    /// Ground sampling distance in metres.
    #[serde(rename = "GSD")]
    pub gsd: u32,
}

const fn band(
    band_id: &'static str,
    name: &'static str,
    center_wavelength: f64,
    bandwidth: u32,
    gsd: u32,
) -> BandInfo {
    BandInfo {
        band_id,
        name,
        center_wavelength,
        bandwidth,
        gsd,
    }
}

pub static S2A_BANDS: [BandInfo; 13] = [
    band("B01", "Coastal aerosol", 442.7, 20, 60),
    band("B02", "Blue", 492.7, 65, 10),
    band("B03", "Green", 559.8, 35, 10),
    band("B04", "Red", 664.6, 30, 10),
    band("B05", "Vegetation Red Edge", 704.1, 14, 20),
    band("B06", "Vegetation Red Edge", 740.5, 14, 20),
    band("B07", "Vegetation Red Edge", 782.8, 19, 20),
    band("B08", "NIR", 832.8, 105, 10),
    band("B08A", "Vegetation Red Edge", 864.7, 21, 20),
    band("B09", "Water vapour", 945.1, 19, 60),
    band("B10", "SWIR - Cirrus", 1373.5, 29, 60),
    band("B11", "SWIR", 1613.7, 90, 20),
    band("B12", "SWIR", 2202.4, 174, 20),
];

pub static S2B_BANDS: [BandInfo; 13] = [
    band("B01", "Coastal aerosol", 442.3, 20, 60),
    band("B02", "Blue", 492.3, 65, 10),
    band("B03", "Green", 558.9, 35, 10),
    band("B04", "Red", 664.9, 31, 10),
    band("B05", "Vegetation Red Edge", 703.8, 15, 20),
    band("B06", "Vegetation Red Edge", 739.1, 13, 20),
    band("B07", "Vegetation Red Edge", 779.7, 19, 20),
    band("B08", "NIR", 832.9, 104, 10),
    band("B08A", "Vegetation Red Edge", 864.0, 21, 20),
    band("B09", "Water vapour", 943.2, 20, 60),
    band("B10", "SWIR - Cirrus", 1376.9, 29, 60),
    band("B11", "SWIR", 1610.4, 94, 20),
    band("B12", "SWIR", 2185.7, 184, 20),
];

/// Mask channel index to class label.
pub static CLASS_MAPPING: [(usize, &str); 3] = [
    (CLEAR, "CLEAR"),
    (CLOUD, "CLOUD"),
    (CLOUD_SHADOW, "CLOUD_SHADOW"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Sensor {
    S2A,
    S2B,
}

impl Sensor {
    pub const ALL: [Sensor; 2] = [Sensor::S2A, Sensor::S2B];

    pub fn bands(&self) -> &'static [BandInfo] {
        match self {
            Sensor::S2A => &S2A_BANDS,
            Sensor::S2B => &S2B_BANDS,
        }
    }
}

impl FromStr for Sensor {
    type Err = TilerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "S2A" => Ok(Sensor::S2A),
            "S2B" => Ok(Sensor::S2B),
            other => Err(TilerError::InvalidArgument(other.to_string())),
        }
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sensor::S2A => write!(f, "S2A"),
            Sensor::S2B => write!(f, "S2B"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorMetadata {
    pub bands: &'static [BandInfo],
}

/// Band tables for a sensor label such as `"S2A"`.
pub fn sensor_metadata(label: &str) -> Result<SensorMetadata> {
    let sensor: Sensor = label.parse()?;
    Ok(SensorMetadata {
        bands: sensor.bands(),
    })
}

/// Contents of `dataset_metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetMetadata {
    pub sensors: BTreeMap<String, SensorMetadata>,
    pub class_mapping: BTreeMap<usize, &'static str>,
}

impl DatasetMetadata {
    pub fn new() -> Self {
        let sensors = Sensor::ALL
            .iter()
            .map(|sensor| {
                let metadata = SensorMetadata {
                    bands: sensor.bands(),
                };
                (sensor.to_string(), metadata)
            })
            .collect();

        Self {
            sensors,
            class_mapping: CLASS_MAPPING.iter().copied().collect(),
        }
    }
}

impl Default for DatasetMetadata {
    fn default() -> Self {
        Self::new()
    }
}
