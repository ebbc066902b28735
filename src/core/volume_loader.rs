// Copyright @yucwang 2026

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::core::error::{Result, VolumeError};
use crate::core::params::ParamValue;
use crate::core::registry::create_instance;
use crate::core::volume::Volume;
use crate::math::constants::{Float, Int, Vector3f, Vector3i};

/// Where the voxels of a described volume come from.
#[derive(Clone, Debug, PartialEq)]
pub enum DataSource {
    /// A `.vol` grid file covering the whole volume.
    VolFile(PathBuf),
    /// Raw voxels in the volume's `voxelType`, written at `offset`.
    /// Without `count` the file covers the full `dimensions`.
    Raw { path: PathBuf, offset: Vector3i, count: Option<Vector3i> },
}

pub struct VolumeDescription {
    pub volume: Box<dyn Volume>,
    pub sources: Vec<DataSource>,
}

/// Load a volume description such as
///
/// ```xml
/// <volume type="structured_regular">
///     <default name="res" value="64"/>
///     <vec3i name="dimensions" value="$res, $res, $res"/>
///     <float name="samplingRate" value="0.25"/>
///     <data filename="density.vol"/>
/// </volume>
/// ```
///
/// The volume is created through the factory with its parameters set but
/// neither populated nor committed.
pub fn load_volume_description<P: AsRef<Path>>(path: P) -> Result<VolumeDescription> {
    let path = path.as_ref();
    log::info!("Loading volume description from: {}.", path.display());
    let xml = fs::read_to_string(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    parse_volume_description(&xml, base_dir)
}

pub fn parse_volume_description(xml: &str, base_dir: &Path) -> Result<VolumeDescription> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();

    let mut defaults: HashMap<String, String> = HashMap::new();
    let mut volume: Option<Box<dyn Volume>> = None;
    let mut sources = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let mut attrs: HashMap<Vec<u8>, String> = HashMap::new();
                for attr in e.attributes().flatten() {
                    let value = attr.unescape_value().unwrap_or_default();
                    attrs.insert(attr.key.as_ref().to_vec(), resolve_value(&value, &defaults));
                }
                let attr = |key: &[u8]| attrs.get(key).cloned();

                match e.name().as_ref() {
                    b"default" => {
                        if let (Some(k), Some(v)) = (attr(b"name"), attr(b"value")) {
                            defaults.insert(k, v);
                        }
                    }
                    b"volume" => {
                        if volume.is_some() {
                            return Err(VolumeError::Format("only one volume per description".to_string()));
                        }
                        let type_name = attr(b"type")
                            .ok_or_else(|| VolumeError::Format("volume.type is missing".to_string()))?;
                        volume = Some(create_instance(&type_name)?);
                    }
                    b"data" => {
                        let filename = attr(b"filename")
                            .ok_or_else(|| VolumeError::Format("data.filename is missing".to_string()))?;
                        let path = resolve_path(&filename, base_dir);
                        let is_vol = path.extension().map_or(false, |ext| ext == "vol");
                        if is_vol {
                            sources.push(DataSource::VolFile(path));
                        } else {
                            let offset = match attr(b"offset") {
                                Some(v) => parse_vec3i(&v)?,
                                None => Vector3i::zeros(),
                            };
                            let count = match attr(b"count") {
                                Some(v) => Some(parse_vec3i(&v)?),
                                None => None,
                            };
                            sources.push(DataSource::Raw { path, offset, count });
                        }
                    }
                    tag => {
                        let kind = String::from_utf8_lossy(tag).to_string();
                        let name = attr(b"name")
                            .ok_or_else(|| VolumeError::Format(format!("{}.name is missing", kind)))?;
                        let raw = attr(b"value")
                            .ok_or_else(|| VolumeError::Format(format!("{}.value is missing", kind)))?;
                        let value = parse_param(&kind, &raw)?;
                        let target = volume
                            .as_mut()
                            .ok_or_else(|| VolumeError::Format(format!("parameter '{}' outside of <volume>", name)))?;
                        target.set_param(&name, value)?;
                    }
                }
            }
            Err(e) => {
                return Err(VolumeError::Format(e.to_string()));
            }
            _ => {}
        }

        buf.clear();
    }

    let volume = volume.ok_or_else(|| VolumeError::Format("no <volume> element found".to_string()))?;
    log::info!("Described {} with {} data source(s).", volume.base().label(), sources.len());
    Ok(VolumeDescription { volume, sources })
}

fn resolve_path(filename: &str, base_dir: &Path) -> PathBuf {
    if Path::new(filename).is_absolute() {
        PathBuf::from(filename)
    } else {
        base_dir.join(filename)
    }
}

fn resolve_value(raw: &str, defaults: &HashMap<String, String>) -> String {
    let mut out = raw.to_string();
    for (k, v) in defaults {
        out = out.replace(&format!("${}", k), v);
    }
    out
}

fn parse_param(kind: &str, value: &str) -> Result<ParamValue> {
    match kind {
        "integer" => Ok(ParamValue::Int(parse_int(value)?)),
        "float" => Ok(ParamValue::Float(parse_float(value)?)),
        "boolean" => match value {
            "true" => Ok(ParamValue::Bool(true)),
            "false" => Ok(ParamValue::Bool(false)),
            other => Err(VolumeError::Format(format!("invalid boolean: {}", other))),
        },
        "string" => Ok(ParamValue::String(value.to_string())),
        "vec3i" => Ok(ParamValue::Vec3i(parse_vec3i(value)?)),
        "vec3f" => Ok(ParamValue::Vec3f(parse_vec3f(value)?)),
        other => Err(VolumeError::Format(format!("unknown parameter kind: {}", other))),
    }
}

fn parse_float(value: &str) -> Result<Float> {
    value.parse::<Float>().map_err(|_| VolumeError::Format(format!("invalid float: {}", value)))
}

fn parse_int(value: &str) -> Result<Int> {
    value.parse::<Int>().map_err(|_| VolumeError::Format(format!("invalid integer: {}", value)))
}

fn split_vec3(value: &str) -> Result<[&str; 3]> {
    let parts: Vec<&str> = value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect();
    if parts.len() != 3 {
        return Err(VolumeError::Format(format!("invalid vec3: {}", value)));
    }
    Ok([parts[0], parts[1], parts[2]])
}

fn parse_vec3f(value: &str) -> Result<Vector3f> {
    let [x, y, z] = split_vec3(value)?;
    Ok(Vector3f::new(parse_float(x)?, parse_float(y)?, parse_float(z)?))
}

fn parse_vec3i(value: &str) -> Result<Vector3i> {
    let [x, y, z] = split_vec3(value)?;
    Ok(Vector3i::new(parse_int(x)?, parse_int(y)?, parse_int(z)?))
}
