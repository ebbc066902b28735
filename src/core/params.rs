// Copyright @yucwang 2026

use crate::core::error::{Result, VolumeError};
use crate::math::constants::{Float, Int, Vector3f, Vector3i};
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    Int(Int),
    Float(Float),
    Bool(bool),
    String(String),
    Vec3i(Vector3i),
    Vec3f(Vector3f),
}

impl ParamValue {
    pub fn kind(&self) -> &'static str {
        match self {
            ParamValue::Int(_) => "integer",
            ParamValue::Float(_) => "float",
            ParamValue::Bool(_) => "boolean",
            ParamValue::String(_) => "string",
            ParamValue::Vec3i(_) => "vec3i",
            ParamValue::Vec3f(_) => "vec3f",
        }
    }
}

impl From<Int> for ParamValue {
    fn from(v: Int) -> Self {
        ParamValue::Int(v)
    }
}

impl From<Float> for ParamValue {
    fn from(v: Float) -> Self {
        ParamValue::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::String(v.to_string())
    }
}

impl From<Vector3i> for ParamValue {
    fn from(v: Vector3i) -> Self {
        ParamValue::Vec3i(v)
    }
}

impl From<Vector3f> for ParamValue {
    fn from(v: Vector3f) -> Self {
        ParamValue::Vec3f(v)
    }
}

/// Named, typed parameters of a volume.
///
/// Typed getters return `Ok(None)` for absent parameters and an
/// `InvalidParameter` error when the stored value has another type.
/// Integers are accepted where a float is requested.
#[derive(Clone, Debug, Default)]
pub struct ParamSet {
    values: HashMap<String, ParamValue>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<V: Into<ParamValue>>(&mut self, name: &str, value: V) {
        self.values.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.values.iter()
    }

    pub fn get_int(&self, name: &str) -> Result<Option<Int>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(ParamValue::Int(v)) => Ok(Some(*v)),
            Some(other) => Err(type_mismatch(name, "integer", other)),
        }
    }

    pub fn get_float(&self, name: &str) -> Result<Option<Float>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(ParamValue::Float(v)) => Ok(Some(*v)),
            Some(ParamValue::Int(v)) => Ok(Some(*v as Float)),
            Some(other) => Err(type_mismatch(name, "float", other)),
        }
    }

    pub fn get_bool(&self, name: &str) -> Result<Option<bool>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(ParamValue::Bool(v)) => Ok(Some(*v)),
            Some(other) => Err(type_mismatch(name, "boolean", other)),
        }
    }

    pub fn get_string(&self, name: &str) -> Result<Option<&str>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(ParamValue::String(v)) => Ok(Some(v.as_str())),
            Some(other) => Err(type_mismatch(name, "string", other)),
        }
    }

    pub fn get_vec3i(&self, name: &str) -> Result<Option<Vector3i>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(ParamValue::Vec3i(v)) => Ok(Some(*v)),
            Some(other) => Err(type_mismatch(name, "vec3i", other)),
        }
    }

    pub fn get_vec3f(&self, name: &str) -> Result<Option<Vector3f>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(ParamValue::Vec3f(v)) => Ok(Some(*v)),
            Some(ParamValue::Vec3i(v)) => Ok(Some(Vector3f::new(v.x as Float, v.y as Float, v.z as Float))),
            Some(other) => Err(type_mismatch(name, "vec3f", other)),
        }
    }

    pub fn require_vec3i(&self, name: &str) -> Result<Vector3i> {
        self.get_vec3i(name)?
            .ok_or_else(|| VolumeError::MissingParameter(name.to_string()))
    }
}

fn type_mismatch(name: &str, expected: &str, found: &ParamValue) -> VolumeError {
    VolumeError::InvalidParameter {
        name: name.to_string(),
        reason: format!("expected {}, found {}", expected, found.kind()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_getters() {
        let mut params = ParamSet::new();
        params.set("dimensions", Vector3i::new(4, 5, 6));
        params.set("samplingRate", 0.5 as Float);
        params.set("ghostCells", 2);
        params.set("voxelType", "uchar");
        params.set("strictIngest", true);

        assert_eq!(params.get_vec3i("dimensions").unwrap(), Some(Vector3i::new(4, 5, 6)));
        assert_eq!(params.get_float("samplingRate").unwrap(), Some(0.5));
        assert_eq!(params.get_float("ghostCells").unwrap(), Some(2.0));
        assert_eq!(params.get_int("ghostCells").unwrap(), Some(2));
        assert_eq!(params.get_string("voxelType").unwrap(), Some("uchar"));
        assert_eq!(params.get_bool("strictIngest").unwrap(), Some(true));
        assert_eq!(params.get_vec3f("dimensions").unwrap(), Some(Vector3f::new(4.0, 5.0, 6.0)));
        assert_eq!(params.get_int("missing").unwrap(), None);
        assert_eq!(params.len(), 5);
    }

    #[test]
    fn type_mismatch_is_reported() {
        let mut params = ParamSet::new();
        params.set("dimensions", "4 4 4");
        match params.get_vec3i("dimensions") {
            Err(VolumeError::InvalidParameter { name, .. }) => assert_eq!(name, "dimensions"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(matches!(params.require_vec3i("other"), Err(VolumeError::MissingParameter(_))));
    }
}
