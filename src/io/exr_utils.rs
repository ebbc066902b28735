/* Copyright 2020 @TwoCookingMice */

use crate::core::error::{Result, VolumeError};
use crate::core::slice::Slice;
use crate::math::constants::Float;

use exr::prelude::*;

/// Map sampled values to grey levels in [0, 1]. Misses become black.
pub fn normalize_slice(slice: &Slice) -> Vec<Float> {
    let (lo, hi) = slice.value_range().unwrap_or((0.0, 1.0));
    let scale = if hi > lo { 1.0 / (hi - lo) } else { 1.0 };
    slice
        .values
        .iter()
        .map(|v| if v.is_nan() { 0.0 } else { ((v - lo) * scale).clamp(0.0, 1.0) })
        .collect()
}

// Write a sampled slice as a grey EXR image
pub fn write_slice_exr(slice: &Slice, file_path: &str) -> Result<()> {
    log::info!("Starting writing openexr images: {}.", file_path);

    let width = slice.width;
    let grey = normalize_slice(slice);
    write_rgb_file(file_path, width, slice.height, |x, y| {
        let v = grey[y * width + x];
        (v, v, v)
    })
    .map_err(|e| VolumeError::Format(format!("EXR written error: {}", e)))?;

    log::info!("EXR written to: {}.", file_path);
    Ok(())
}
