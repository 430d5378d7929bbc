use crate::error::Result;
use gdal::spatial_ref::SpatialRef;
use log::{debug, warn};

/// Compact CRS identifier for a spatial reference: `AUTHORITY:CODE` when the
/// reference can be identified, otherwise its WKT.
pub fn crs_string(spatial_ref: &SpatialRef) -> Result<String> {
    let mut spatial_ref = spatial_ref.clone();

    // Shapefile .prj files rarely carry an authority node.
    if let Err(e) = spatial_ref.auto_identify_epsg() {
        debug!("Could not identify EPSG code: {}", e);
    }

    match (spatial_ref.auth_name(), spatial_ref.auth_code()) {
        (Ok(name), Ok(code)) => {
            let crs = authority_string(&name, code);
            debug!("CRS identified as {}", crs);
            Ok(crs)
        }
        _ => {
            warn!("CRS has no authority code, falling back to WKT");
            Ok(spatial_ref.to_wkt()?)
        }
    }
}

pub fn authority_string(name: &str, code: i32) -> String {
    format!("{}:{}", name.to_uppercase(), code)
}

/// Parse a CRS identifier produced by [`crs_string`] (or any definition GDAL
/// accepts) back into a spatial reference.
pub fn spatial_ref_from_crs(crs: &str) -> Result<SpatialRef> {
    Ok(SpatialRef::from_definition(crs)?)
}
