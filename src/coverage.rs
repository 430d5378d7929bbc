use crate::error::{Result, TilerError};
use ndarray::{ArrayView3, Axis};

/// One-hot channel order of the cloud masks.
pub const CLEAR: usize = 0;
pub const CLOUD: usize = 1;
pub const CLOUD_SHADOW: usize = 2;
pub const MASK_CHANNELS: usize = 3;

/// Fraction of the tile area whose `class` channel is set.
///
/// The denominator is the full block area, so zero padding at the scene edge
/// counts as "no class" and dilutes the fraction.
fn class_fraction(block: &ArrayView3<u8>, class: usize) -> Result<f64> {
    let (height, width, channels) = block.dim();
    if channels != MASK_CHANNELS {
        return Err(TilerError::InvalidMaskShape(channels));
    }
    if height == 0 || width == 0 {
        return Err(TilerError::InvalidDimensions(height, width));
    }

    let class_pixels = block
        .index_axis(Axis(2), class)
        .iter()
        .filter(|&&v| v != 0)
        .count();

    Ok(class_pixels as f64 / (height * width) as f64)
}

/// Cloud coverage in `[0, 1]` of a one-hot `[CLEAR, CLOUD, CLOUD_SHADOW]` block.
///
/// Counting set CLOUD pixels equals summing the channel for one-hot masks.
pub fn cloud_coverage(block: &ArrayView3<u8>) -> Result<f64> {
    class_fraction(block, CLOUD)
}
