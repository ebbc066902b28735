// Copyright @yucwang 2026

pub mod const_volume;
pub mod distributed_volume;
pub mod structured_volume;
pub mod voxel;

use crate::core::error::{Result, VolumeError};
use crate::core::registry::{Registrar, VolumeModule};
use self::const_volume::ConstantVolume;
use self::distributed_volume::DataDistributedVolume;
use self::structured_volume::StructuredVolume;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VolumeFilterMode {
    Nearest,
    Trilinear,
}

impl VolumeFilterMode {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "nearest" => Ok(VolumeFilterMode::Nearest),
            "trilinear" => Ok(VolumeFilterMode::Trilinear),
            other => Err(VolumeError::InvalidParameter {
                name: "filterMode".to_string(),
                reason: format!("unknown filter mode '{}'", other),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VolumeFilterMode::Nearest => "nearest",
            VolumeFilterMode::Trilinear => "trilinear",
        }
    }
}

/// The variants shipped with the crate.
pub struct BuiltinVolumes;

impl VolumeModule for BuiltinVolumes {
    fn name(&self) -> &str {
        "builtin"
    }

    fn register(&self, registrar: &mut Registrar<'_>) {
        registrar.register(StructuredVolume::TYPE_NAME, || Box::new(StructuredVolume::new()));
        registrar.register(ConstantVolume::TYPE_NAME, || Box::new(ConstantVolume::new()));
        registrar.register(DataDistributedVolume::TYPE_NAME, || Box::new(DataDistributedVolume::new()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_mode_names() {
        for mode in [VolumeFilterMode::Nearest, VolumeFilterMode::Trilinear] {
            assert_eq!(VolumeFilterMode::from_name(mode.name()).unwrap(), mode);
        }
        assert!(VolumeFilterMode::from_name("cubic").is_err());
    }
}
