// Copyright @yucwang 2026

use crate::core::error::{Result, VolumeError};
use crate::math::constants::Float;

/// Encoding of voxels handed to `set_region`, all little-endian.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoxelType {
    UChar,
    Short,
    UShort,
    Int,
    Float,
    Double,
}

impl VoxelType {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "uchar" => Ok(VoxelType::UChar),
            "short" => Ok(VoxelType::Short),
            "ushort" => Ok(VoxelType::UShort),
            "int" => Ok(VoxelType::Int),
            "float" => Ok(VoxelType::Float),
            "double" => Ok(VoxelType::Double),
            other => Err(VolumeError::InvalidParameter {
                name: "voxelType".to_string(),
                reason: format!("unsupported voxel type '{}'", other),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VoxelType::UChar => "uchar",
            VoxelType::Short => "short",
            VoxelType::UShort => "ushort",
            VoxelType::Int => "int",
            VoxelType::Float => "float",
            VoxelType::Double => "double",
        }
    }

    pub fn size(&self) -> usize {
        match self {
            VoxelType::UChar => 1,
            VoxelType::Short | VoxelType::UShort => 2,
            VoxelType::Int | VoxelType::Float => 4,
            VoxelType::Double => 8,
        }
    }

    /// Decode one voxel; `bytes` must hold exactly `size()` bytes.
    pub fn decode(&self, bytes: &[u8]) -> Float {
        match self {
            VoxelType::UChar => bytes[0] as Float,
            VoxelType::Short => i16::from_le_bytes([bytes[0], bytes[1]]) as Float,
            VoxelType::UShort => u16::from_le_bytes([bytes[0], bytes[1]]) as Float,
            VoxelType::Int => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(bytes);
                i32::from_le_bytes(buf) as Float
            }
            VoxelType::Float => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(bytes);
                f32::from_le_bytes(buf)
            }
            VoxelType::Double => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(bytes);
                f64::from_le_bytes(buf) as Float
            }
        }
    }
}

/// Encode floats as little-endian `float` voxels.
pub fn float_bytes(values: &[Float]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 4);
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}
