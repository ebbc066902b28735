// Copyright @yucwang 2026

use crate::core::error::{Result, VolumeError};
use crate::core::volume::{RegionPolicy, Volume, VolumeBase, SAMPLE_MISS};
use crate::math::aabb::AABB;
use crate::math::constants::{Float, Vector3f, Vector3i};
use std::any::Any;

/// A volume with the same value everywhere, optionally limited to a box.
pub struct ConstantVolume {
    base: VolumeBase,
    value: Float,
    bbox: Option<AABB>,
}

impl ConstantVolume {
    pub const TYPE_NAME: &'static str = "constant";
    const EDITABLE: &'static [&'static str] = &["value"];

    pub fn new() -> Self {
        Self {
            base: VolumeBase::new(Self::TYPE_NAME, Self::EDITABLE),
            value: 0.0,
            bbox: None,
        }
    }

    pub fn value(&self) -> Float {
        self.value
    }
}

impl Default for ConstantVolume {
    fn default() -> Self {
        Self::new()
    }
}

impl Volume for ConstantVolume {
    fn base(&self) -> &VolumeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut VolumeBase {
        &mut self.base
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn bbox(&self) -> Option<AABB> {
        self.bbox
    }

    fn region_policy(&self) -> RegionPolicy {
        RegionPolicy::Never
    }

    fn finish(&mut self) -> Result<()> {
        let params = self.base.params();
        self.bbox = match (params.get_vec3f("boundsMin")?, params.get_vec3f("boundsMax")?) {
            (Some(lo), Some(hi)) => Some(AABB::new(lo, hi)),
            (None, None) => None,
            (Some(_), None) => return Err(VolumeError::MissingParameter("boundsMax".to_string())),
            (None, Some(_)) => return Err(VolumeError::MissingParameter("boundsMin".to_string())),
        };
        self.update_editable_parameters()
    }

    fn update_editable_parameters(&mut self) -> Result<()> {
        self.value = self.base.params().get_float("value")?.unwrap_or(0.0);
        Ok(())
    }

    fn write_region(&mut self, _source: &[u8], _index: &Vector3i, _count: &Vector3i) -> Result<()> {
        Err(VolumeError::RegionNotWritable(self.base.type_name().to_string()))
    }

    fn sample(&self, p_world: &Vector3f) -> Float {
        match &self.bbox {
            Some(bbox) if !bbox.contains_point(p_world) => SAMPLE_MISS,
            _ => self.value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::params::ParamValue;

    #[test]
    fn constant_volume_unbounded() {
        let mut vol = ConstantVolume::new();
        vol.set_param("value", ParamValue::Float(2.0)).unwrap();
        vol.commit().unwrap();
        assert!(vol.bbox().is_none());
        let mut out = [0.0; 2];
        vol.compute_samples(&mut out, &[Vector3f::new(0.1, 0.2, 0.3), Vector3f::new(-1e6, 0.0, 1e6)]);
        assert_eq!(out, [2.0, 2.0]);
    }

    #[test]
    fn constant_volume_bounded_and_editable() {
        let mut vol = ConstantVolume::new();
        vol.set_param("boundsMin", ParamValue::Vec3f(Vector3f::new(-1.0, 0.0, 1.0))).unwrap();
        vol.set_param("boundsMax", ParamValue::Vec3f(Vector3f::new(2.0, 3.0, 4.0))).unwrap();
        vol.set_param("value", ParamValue::Float(1.0)).unwrap();
        vol.commit().unwrap();
        assert_eq!(vol.sample(&Vector3f::new(-0.5, 1.0, 2.0)), 1.0);
        assert!(vol.sample(&Vector3f::new(5.0, 1.0, 2.0)).is_nan());

        vol.set_param("value", ParamValue::Float(3.0)).unwrap();
        vol.commit().unwrap();
        assert_eq!(vol.sample(&Vector3f::new(-0.5, 1.0, 2.0)), 3.0);
        assert!(vol.set_param("boundsMin", ParamValue::Vec3f(Vector3f::zeros())).is_err());

        let out = vol.bbox().unwrap();
        assert_eq!(out.p_min, Vector3f::new(-1.0, 0.0, 1.0));
        assert_eq!(out.p_max, Vector3f::new(2.0, 3.0, 4.0));
    }

    #[test]
    fn constant_volume_rejects_regions() {
        let mut vol = ConstantVolume::new();
        assert!(!vol.set_region(&[0u8; 4], &Vector3i::zeros(), &Vector3i::new(1, 1, 1)));
    }

    #[test]
    fn half_specified_bounds_fail_commit() {
        let mut vol = ConstantVolume::new();
        vol.set_param("boundsMin", ParamValue::Vec3f(Vector3f::zeros())).unwrap();
        assert!(matches!(vol.commit(), Err(VolumeError::MissingParameter(_))));
    }
}
