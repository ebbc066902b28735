// Copyright @yucwang 2026

use std::fs;
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};

use crate::core::error::{Result, VolumeError};
use crate::core::params::ParamValue;
use crate::core::volume::Volume;
use crate::core::volume_loader::DataSource;
use crate::io::vol_file::read_vol_header;
use crate::math::constants::Vector3i;
use crate::volumes::voxel::VoxelType;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub regions: usize,
    pub failed: usize,
}

impl IngestReport {
    fn merge(&mut self, other: IngestReport) {
        self.regions += other.regions;
        self.failed += other.failed;
    }
}

// Files are streamed one z-slab at a time through `set_region`, so failed
// slabs land in the volume's partial-ingest bookkeeping.
pub fn ingest_sources(volume: &mut dyn Volume, sources: &[DataSource], show_progress: bool) -> Result<IngestReport> {
    let mut report = IngestReport::default();
    for source in sources {
        let part = match source {
            DataSource::VolFile(path) => ingest_vol_file(volume, path, show_progress)?,
            DataSource::Raw { path, offset, count } => {
                ingest_raw_file(volume, path, offset, count.as_ref(), show_progress)?
            }
        };
        report.merge(part);
    }
    Ok(report)
}

/// Ingest a single-channel `.vol` file covering the whole volume.
///
/// `dimensions`, `gridOrigin` and `gridSpacing` are taken from the header
/// when the volume does not define them yet. Voxels are float32.
pub fn ingest_vol_file(volume: &mut dyn Volume, path: &Path, show_progress: bool) -> Result<IngestReport> {
    log::info!("Ingesting vol file: {}.", path.display());
    let bytes = fs::read(path)?;
    let (header, data_offset) = read_vol_header(&bytes)?;
    if header.channels != 1 {
        return Err(VolumeError::Format(format!(
            "only single-channel vol files can be ingested, got {} channels", header.channels)));
    }
    let expected = data_offset + header.voxel_count() * 4;
    if bytes.len() < expected {
        return Err(VolumeError::Format(format!(
            "vol data truncated: expected {} bytes, found {}", expected, bytes.len())));
    }

    match volume.base().params().get_vec3i("dimensions")? {
        Some(dims) if dims != header.dims => {
            return Err(VolumeError::InvalidParameter {
                name: "dimensions".to_string(),
                reason: format!("volume has {:?} but {} holds {:?}",
                                [dims.x, dims.y, dims.z], path.display(),
                                [header.dims.x, header.dims.y, header.dims.z]),
            });
        }
        Some(_) => {}
        None => volume.set_param("dimensions", ParamValue::Vec3i(header.dims))?,
    }
    match volume.base().params().get_string("voxelType")? {
        Some("float") => {}
        Some(other) => {
            return Err(VolumeError::InvalidParameter {
                name: "voxelType".to_string(),
                reason: format!("vol files hold float voxels, volume expects '{}'", other),
            });
        }
        None => volume.set_param("voxelType", ParamValue::from("float"))?,
    }
    if !volume.base().params().contains("gridOrigin") {
        volume.set_param("gridOrigin", ParamValue::Vec3f(header.bbox.p_min))?;
    }
    if !volume.base().params().contains("gridSpacing") {
        volume.set_param("gridSpacing", ParamValue::Vec3f(header.grid_spacing()))?;
    }

    let data = &bytes[data_offset..expected];
    Ok(write_slabs(volume, data, &Vector3i::zeros(), &header.dims, 4, show_progress))
}

/// Ingest raw voxels in the volume's `voxelType`, x varying fastest.
/// Without `count` the file must cover the whole volume.
pub fn ingest_raw_file(volume: &mut dyn Volume,
                       path: &Path,
                       offset: &Vector3i,
                       count: Option<&Vector3i>,
                       show_progress: bool) -> Result<IngestReport> {
    log::info!("Ingesting raw voxels: {}.", path.display());
    let params = volume.base().params();
    let voxel_type = VoxelType::from_name(params.get_string("voxelType")?.unwrap_or("float"))?;
    let count = match count {
        Some(c) => *c,
        None => params.require_vec3i("dimensions")?,
    };
    if count.iter().any(|c| *c <= 0) {
        return Err(VolumeError::Format(format!("invalid raw region size {:?}", [count.x, count.y, count.z])));
    }

    let bytes = fs::read(path)?;
    let expected = count.iter().map(|c| *c as usize).product::<usize>() * voxel_type.size();
    if bytes.len() != expected {
        return Err(VolumeError::RegionSizeMismatch { expected, actual: bytes.len() });
    }
    Ok(write_slabs(volume, &bytes, offset, &count, voxel_type.size(), show_progress))
}

fn write_slabs(volume: &mut dyn Volume,
               data: &[u8],
               offset: &Vector3i,
               count: &Vector3i,
               voxel_size: usize,
               show_progress: bool) -> IngestReport {
    let slab_count = Vector3i::new(count.x, count.y, 1);
    let slab_bytes = count.x as usize * count.y as usize * voxel_size;

    let progress = if show_progress {
        let bar = ProgressBar::new(count.z as u64);
        bar.set_style(
            ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} slabs")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar
    } else {
        ProgressBar::hidden()
    };

    let mut report = IngestReport::default();
    for (z, slab) in data.chunks_exact(slab_bytes).enumerate() {
        let index = Vector3i::new(offset.x, offset.y, offset.z + z as i32);
        report.regions += 1;
        if !volume.set_region(slab, &index, &slab_count) {
            report.failed += 1;
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    if report.failed > 0 {
        log::warn!("{} of {} slab(s) could not be written into {}.",
                   report.failed, report.regions, volume.base().label());
    } else {
        log::debug!("Wrote {} slab(s) into {}.", report.regions, volume.base().label());
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::create_instance;
    use crate::io::vol_file::write_vol_file;
    use crate::math::aabb::AABB;
    use crate::math::constants::{Float, Vector3f};
    use crate::volumes::structured_volume::StructuredVolume;
    use crate::volumes::voxel::float_bytes;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("meringue_{}_{}", std::process::id(), name))
    }

    #[test]
    fn vol_file_defines_grid_and_data() {
        let path = temp_path("ramp.vol");
        let dims = Vector3i::new(4, 3, 2);
        let bbox = AABB::new(Vector3f::new(1.0, 0.0, 0.0), Vector3f::new(4.0, 2.0, 2.0));
        let values: Vec<Float> = (0..24).map(|v| v as Float).collect();
        write_vol_file(&path, &dims, &bbox, &values).unwrap();

        let mut volume = create_instance("structured_regular").unwrap();
        let report = ingest_vol_file(volume.as_mut(), &path, false).unwrap();
        assert_eq!(report, IngestReport { regions: 2, failed: 0 });
        volume.commit().unwrap();

        let grid = volume.as_any().downcast_ref::<StructuredVolume>().unwrap();
        assert_eq!(grid.dimensions(), dims);
        assert_eq!(grid.voxel(3, 2, 1), 23.0);
        assert_eq!(volume.bbox(), Some(bbox));
        // voxel (1, 1, 1) sits at origin + (1, 1, 2)
        assert_eq!(volume.sample(&Vector3f::new(2.0, 1.0, 2.0)), 17.0);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn vol_file_must_match_declared_dimensions() {
        let path = temp_path("mismatch.vol");
        let bbox = AABB::new(Vector3f::zeros(), Vector3f::new(1.0, 1.0, 1.0));
        write_vol_file(&path, &Vector3i::new(2, 2, 2), &bbox, &[0.0; 8]).unwrap();

        let mut volume = create_instance("structured_regular").unwrap();
        volume.set_param("dimensions", ParamValue::Vec3i(Vector3i::new(4, 4, 4))).unwrap();
        assert!(matches!(ingest_vol_file(volume.as_mut(), &path, false),
                         Err(VolumeError::InvalidParameter { .. })));

        let mut ushort = create_instance("structured_regular").unwrap();
        ushort.set_param("voxelType", ParamValue::from("ushort")).unwrap();
        assert!(ingest_vol_file(ushort.as_mut(), &path, false).is_err());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn raw_brick_at_offset() {
        let path = temp_path("brick.raw");
        fs::write(&path, vec![7u8; 8]).unwrap();

        let mut volume = create_instance("structured_regular").unwrap();
        volume.set_param("dimensions", ParamValue::Vec3i(Vector3i::new(4, 4, 4))).unwrap();
        volume.set_param("voxelType", ParamValue::from("uchar")).unwrap();
        let sources = vec![DataSource::Raw {
            path: path.clone(),
            offset: Vector3i::new(2, 2, 2),
            count: Some(Vector3i::new(2, 2, 2)),
        }];
        let report = ingest_sources(volume.as_mut(), &sources, false).unwrap();
        assert_eq!(report, IngestReport { regions: 2, failed: 0 });
        volume.commit().unwrap();
        assert_eq!(volume.sample(&Vector3f::new(3.0, 3.0, 3.0)), 7.0);
        assert_eq!(volume.sample(&Vector3f::new(0.0, 0.0, 0.0)), 0.0);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn raw_brick_outside_volume_is_a_partial_ingest() {
        let path = temp_path("outside.raw");
        fs::write(&path, vec![1u8; 8]).unwrap();

        let mut volume = create_instance("structured_regular").unwrap();
        volume.set_param("dimensions", ParamValue::Vec3i(Vector3i::new(2, 2, 2))).unwrap();
        volume.set_param("voxelType", ParamValue::from("uchar")).unwrap();
        volume.set_param("strictIngest", ParamValue::Bool(true)).unwrap();
        let report = ingest_raw_file(volume.as_mut(), &path, &Vector3i::new(0, 0, 1),
                                     Some(&Vector3i::new(2, 2, 2)), false).unwrap();
        assert_eq!(report, IngestReport { regions: 2, failed: 1 });
        assert!(matches!(volume.commit(), Err(VolumeError::PartialIngest { failed: 1 })));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn vol_file_cannot_redefine_an_allocated_grid() {
        let raw = temp_path("first.raw");
        let vol = temp_path("second.vol");
        fs::write(&raw, float_bytes(&[2.0; 8])).unwrap();
        let bbox = AABB::new(Vector3f::new(5.0, 5.0, 5.0), Vector3f::new(9.0, 9.0, 9.0));
        write_vol_file(&vol, &Vector3i::new(2, 2, 2), &bbox, &[3.0; 8]).unwrap();

        let mut volume = create_instance("structured_regular").unwrap();
        volume.set_param("dimensions", ParamValue::Vec3i(Vector3i::new(2, 2, 2))).unwrap();
        let sources = vec![
            DataSource::Raw { path: raw.clone(), offset: Vector3i::zeros(), count: None },
            DataSource::VolFile(vol.clone()),
        ];
        assert!(matches!(ingest_sources(volume.as_mut(), &sources, false),
                         Err(VolumeError::NonEditableParameter(_))));
        assert!(!volume.base().params().contains("gridOrigin"));

        volume.commit().unwrap();
        assert_eq!(volume.bbox(), Some(AABB::new(Vector3f::zeros(), Vector3f::new(1.0, 1.0, 1.0))));
        assert_eq!(volume.sample(&Vector3f::zeros()), 2.0);
        let _ = fs::remove_file(&raw);
        let _ = fs::remove_file(&vol);
    }

    #[test]
    fn raw_file_size_is_checked() {
        let path = temp_path("short.raw");
        fs::write(&path, vec![0u8; 5]).unwrap();

        let mut volume = create_instance("structured_regular").unwrap();
        volume.set_param("dimensions", ParamValue::Vec3i(Vector3i::new(2, 2, 2))).unwrap();
        assert!(matches!(ingest_raw_file(volume.as_mut(), &path, &Vector3i::zeros(), None, false),
                         Err(VolumeError::RegionSizeMismatch { expected: 32, actual: 5 })));
        let _ = fs::remove_file(&path);
    }
}
