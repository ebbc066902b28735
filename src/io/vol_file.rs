// Copyright @yucwang 2026

use std::fs;
use std::path::Path;

use crate::core::error::{Result, VolumeError};
use crate::math::aabb::AABB;
use crate::math::constants::{Float, Vector3f, Vector3i};

const VOL_HEADER_SIZE: usize = 48;

/// Header of a `.vol` grid file: "VOL", version 3, float32 encoding.
#[derive(Clone, Debug, PartialEq)]
pub struct VolHeader {
    pub dims: Vector3i,
    pub channels: usize,
    pub bbox: AABB,
}

impl VolHeader {
    pub fn voxel_count(&self) -> usize {
        self.dims.iter().map(|d| *d as usize).product::<usize>() * self.channels
    }

    /// Spacing that places the first and last voxel on the bbox faces.
    pub fn grid_spacing(&self) -> Vector3f {
        let diag = self.bbox.diagnal();
        Vector3f::new(
            axis_spacing(diag.x, self.dims.x),
            axis_spacing(diag.y, self.dims.y),
            axis_spacing(diag.z, self.dims.z),
        )
    }
}

fn axis_spacing(extent: Float, res: i32) -> Float {
    if res > 1 && extent > 0.0 {
        extent / (res - 1) as Float
    } else {
        1.0
    }
}

/// Parse the header, returning it with the byte offset of the voxel data.
pub fn read_vol_header(bytes: &[u8]) -> Result<(VolHeader, usize)> {
    if bytes.len() < 4 {
        return Err(VolumeError::Format("vol file too small".to_string()));
    }
    if &bytes[0..3] != b"VOL" {
        return Err(VolumeError::Format("invalid vol header".to_string()));
    }
    let version = bytes[3];
    if version != 3 {
        return Err(VolumeError::Format(format!("unsupported vol version: {}", version)));
    }

    let mut cursor = 4usize;
    let encoding = read_i32(bytes, &mut cursor)?;
    let xres = read_i32(bytes, &mut cursor)?;
    let yres = read_i32(bytes, &mut cursor)?;
    let zres = read_i32(bytes, &mut cursor)?;
    let channels = read_i32(bytes, &mut cursor)?;

    if encoding != 1 {
        return Err(VolumeError::Format(format!("unsupported vol encoding: {}", encoding)));
    }
    if xres <= 0 || yres <= 0 || zres <= 0 || channels <= 0 {
        return Err(VolumeError::Format("vol dimensions must be positive".to_string()));
    }

    let mut corners = [0.0 as Float; 6];
    for c in corners.iter_mut() {
        *c = read_f32(bytes, &mut cursor)?;
    }
    let bbox = AABB::new(
        Vector3f::new(corners[0], corners[1], corners[2]),
        Vector3f::new(corners[3], corners[4], corners[5]),
    );

    let header = VolHeader {
        dims: Vector3i::new(xres, yres, zres),
        channels: channels as usize,
        bbox,
    };
    Ok((header, cursor))
}

/// Write a single-channel `.vol` file with x varying fastest.
pub fn write_vol_file<P: AsRef<Path>>(path: P, dims: &Vector3i, bbox: &AABB, values: &[Float]) -> Result<()> {
    let expected = dims.iter().map(|d| (*d).max(0) as usize).product::<usize>();
    if values.len() != expected {
        return Err(VolumeError::RegionSizeMismatch { expected, actual: values.len() });
    }

    let mut bytes = Vec::with_capacity(VOL_HEADER_SIZE + values.len() * 4);
    bytes.extend_from_slice(b"VOL");
    bytes.push(3);
    for v in [1, dims.x, dims.y, dims.z, 1] {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    for v in bbox.p_min.iter().chain(bbox.p_max.iter()) {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    for v in values {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    fs::write(path, bytes)?;
    Ok(())
}

fn read_i32(bytes: &[u8], cursor: &mut usize) -> Result<i32> {
    if *cursor + 4 > bytes.len() {
        return Err(VolumeError::Format("unexpected eof while reading i32".to_string()));
    }
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[*cursor..*cursor + 4]);
    *cursor += 4;
    Ok(i32::from_le_bytes(buf))
}

fn read_f32(bytes: &[u8], cursor: &mut usize) -> Result<Float> {
    if *cursor + 4 > bytes.len() {
        return Err(VolumeError::Format("unexpected eof while reading f32".to_string()));
    }
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[*cursor..*cursor + 4]);
    *cursor += 4;
    Ok(Float::from_le_bytes(buf))
}
