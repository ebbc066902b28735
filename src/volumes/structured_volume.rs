// Copyright @yucwang 2026

use crate::core::error::{Result, VolumeError};
use crate::core::volume::{check_region, RegionPolicy, Volume, VolumeBase, SAMPLE_MISS};
use crate::math::aabb::AABB;
use crate::math::constants::{Float, MatrixXF, Vector3f, Vector3i, EPSILON};
use crate::volumes::voxel::VoxelType;
use crate::volumes::VolumeFilterMode;
use std::any::Any;

/// Regular grid of scalar voxels. Voxel `(i, j, k)` sits at
/// `grid_origin + (i, j, k) * grid_spacing`.
pub struct StructuredVolume {
    base: VolumeBase,
    // Row `z * yres + y`, column `x`.
    data: MatrixXF,
    xres: usize,
    yres: usize,
    zres: usize,
    voxel_type: VoxelType,
    grid_origin: Vector3f,
    grid_spacing: Vector3f,
    filter_mode: VolumeFilterMode,
    sampling_rate: Float,
    value_range: (Float, Float),
}

impl StructuredVolume {
    pub const TYPE_NAME: &'static str = "structured_regular";
    const EDITABLE: &'static [&'static str] = &["filterMode", "samplingRate"];
    /// Read once when storage is allocated, fixed afterwards.
    pub const LAYOUT: &'static [&'static str] = &["dimensions", "voxelType", "gridOrigin", "gridSpacing"];

    pub fn new() -> Self {
        Self {
            base: VolumeBase::new(Self::TYPE_NAME, Self::EDITABLE),
            data: MatrixXF::zeros(0, 0),
            xres: 0,
            yres: 0,
            zres: 0,
            voxel_type: VoxelType::Float,
            grid_origin: Vector3f::zeros(),
            grid_spacing: Vector3f::new(1.0, 1.0, 1.0),
            filter_mode: VolumeFilterMode::Trilinear,
            sampling_rate: 0.125,
            value_range: (0.0, 0.0),
        }
    }

    pub fn dimensions(&self) -> Vector3i {
        Vector3i::new(self.xres as i32, self.yres as i32, self.zres as i32)
    }

    pub fn filter_mode(&self) -> VolumeFilterMode {
        self.filter_mode
    }

    pub fn sampling_rate(&self) -> Float {
        self.sampling_rate
    }

    /// Minimum and maximum voxel value, valid after commit.
    pub fn value_range(&self) -> (Float, Float) {
        self.value_range
    }

    pub fn voxel(&self, x: usize, y: usize, z: usize) -> Float {
        self.fetch(x, y, z)
    }

    fn is_allocated(&self) -> bool {
        !self.data.is_empty()
    }

    /// Size storage from the committed-so-far parameters.
    fn allocate(&mut self) -> Result<()> {
        let params = self.base.params();
        let dims = params.require_vec3i("dimensions")?;
        if dims.iter().any(|d| *d <= 0) {
            return Err(VolumeError::InvalidParameter {
                name: "dimensions".to_string(),
                reason: format!("all dimensions must be positive, got {:?}", [dims.x, dims.y, dims.z]),
            });
        }
        let voxel_type = VoxelType::from_name(params.get_string("voxelType")?.unwrap_or("float"))?;
        let grid_origin = params.get_vec3f("gridOrigin")?.unwrap_or_else(Vector3f::zeros);
        let grid_spacing = params.get_vec3f("gridSpacing")?.unwrap_or_else(|| Vector3f::new(1.0, 1.0, 1.0));
        if grid_spacing.iter().any(|s| *s <= 0.0) {
            return Err(VolumeError::InvalidParameter {
                name: "gridSpacing".to_string(),
                reason: "spacing must be positive".to_string(),
            });
        }

        let xres = dims.x as usize;
        let yres = dims.y as usize;
        let zres = dims.z as usize;
        let rows = yres
            .checked_mul(zres)
            .ok_or_else(|| VolumeError::Format("volume dimensions overflow".to_string()))?;

        self.data = MatrixXF::zeros(rows, xres);
        self.xres = xres;
        self.yres = yres;
        self.zres = zres;
        self.voxel_type = voxel_type;
        self.grid_origin = grid_origin;
        self.grid_spacing = grid_spacing;
        self.base.freeze_params(Self::LAYOUT);
        log::debug!("Allocated {} with {}x{}x{} {} voxels.",
                    self.base.label(), xres, yres, zres, voxel_type.name());
        Ok(())
    }

    fn fetch(&self, x: usize, y: usize, z: usize) -> Float {
        self.data[(z * self.yres + y, x)]
    }

    fn update_value_range(&mut self) {
        self.value_range = if self.is_allocated() {
            (self.data.min(), self.data.max())
        } else {
            (0.0, 0.0)
        };
    }

    fn sample_nearest(&self, p: Vector3f) -> Float {
        let x0 = (p.x.round() as isize).clamp(0, self.xres as isize - 1) as usize;
        let y0 = (p.y.round() as isize).clamp(0, self.yres as isize - 1) as usize;
        let z0 = (p.z.round() as isize).clamp(0, self.zres as isize - 1) as usize;

        self.fetch(x0, y0, z0)
    }

    fn sample_trilinear(&self, p: Vector3f) -> Float {
        let x0 = p.x.floor() as isize;
        let y0 = p.y.floor() as isize;
        let z0 = p.z.floor() as isize;
        let x1 = x0 + 1;
        let y1 = y0 + 1;
        let z1 = z0 + 1;

        let tx = p.x - x0 as Float;
        let ty = p.y - y0 as Float;
        let tz = p.z - z0 as Float;

        let x0u = x0.clamp(0, self.xres as isize - 1) as usize;
        let y0u = y0.clamp(0, self.yres as isize - 1) as usize;
        let z0u = z0.clamp(0, self.zres as isize - 1) as usize;
        let x1u = x1.clamp(0, self.xres as isize - 1) as usize;
        let y1u = y1.clamp(0, self.yres as isize - 1) as usize;
        let z1u = z1.clamp(0, self.zres as isize - 1) as usize;

        let c000 = self.fetch(x0u, y0u, z0u);
        let c100 = self.fetch(x1u, y0u, z0u);
        let c010 = self.fetch(x0u, y1u, z0u);
        let c110 = self.fetch(x1u, y1u, z0u);
        let c001 = self.fetch(x0u, y0u, z1u);
        let c101 = self.fetch(x1u, y0u, z1u);
        let c011 = self.fetch(x0u, y1u, z1u);
        let c111 = self.fetch(x1u, y1u, z1u);

        let c00 = c000 * (1.0 - tx) + c100 * tx;
        let c10 = c010 * (1.0 - tx) + c110 * tx;
        let c01 = c001 * (1.0 - tx) + c101 * tx;
        let c11 = c011 * (1.0 - tx) + c111 * tx;

        let c0 = c00 * (1.0 - ty) + c10 * ty;
        let c1 = c01 * (1.0 - ty) + c11 * ty;

        c0 * (1.0 - tz) + c1 * tz
    }
}

impl Default for StructuredVolume {
    fn default() -> Self {
        Self::new()
    }
}

impl Volume for StructuredVolume {
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
        if !self.is_allocated() {
            return None;
        }
        let last = Vector3f::new(
            (self.xres - 1) as Float,
            (self.yres - 1) as Float,
            (self.zres - 1) as Float,
        );
        Some(AABB::new(self.grid_origin, self.grid_origin + last.component_mul(&self.grid_spacing)))
    }

    fn region_policy(&self) -> RegionPolicy {
        RegionPolicy::Streaming
    }

    fn finish(&mut self) -> Result<()> {
        if !self.is_allocated() {
            self.allocate()?;
        }
        self.update_editable_parameters()?;
        self.update_value_range();
        log::info!("Committed {}: {}x{}x{} voxels, value range [{}, {}].",
                   self.base.label(), self.xres, self.yres, self.zres,
                   self.value_range.0, self.value_range.1);
        Ok(())
    }

    fn update_editable_parameters(&mut self) -> Result<()> {
        let params = self.base.params();
        let filter_mode = match params.get_string("filterMode")? {
            Some(name) => VolumeFilterMode::from_name(name)?,
            None => VolumeFilterMode::Trilinear,
        };
        let sampling_rate = params.get_float("samplingRate")?.unwrap_or(0.125);
        if sampling_rate <= 0.0 {
            return Err(VolumeError::InvalidParameter {
                name: "samplingRate".to_string(),
                reason: "sampling rate must be positive".to_string(),
            });
        }
        self.filter_mode = filter_mode;
        self.sampling_rate = sampling_rate;
        Ok(())
    }

    fn write_region(&mut self, source: &[u8], index: &Vector3i, count: &Vector3i) -> Result<()> {
        if !self.is_allocated() {
            self.allocate()?;
        }
        let voxels = check_region(&self.dimensions(), index, count)?;
        let size = self.voxel_type.size();
        let expected = voxels * size;
        if source.len() != expected {
            return Err(VolumeError::RegionSizeMismatch { expected, actual: source.len() });
        }

        let (x0, y0, z0) = (index.x as usize, index.y as usize, index.z as usize);
        let (nx, ny, nz) = (count.x as usize, count.y as usize, count.z as usize);
        let mut voxel_bytes = source.chunks_exact(size);
        for z in z0..z0 + nz {
            for y in y0..y0 + ny {
                let row = z * self.yres + y;
                for x in x0..x0 + nx {
                    if let Some(bytes) = voxel_bytes.next() {
                        self.data[(row, x)] = self.voxel_type.decode(bytes);
                    }
                }
            }
        }

        if self.base.is_committed() {
            self.update_value_range();
        }
        Ok(())
    }

    fn sample(&self, p_world: &Vector3f) -> Float {
        if !self.is_allocated() {
            return SAMPLE_MISS;
        }

        let p = (p_world - self.grid_origin).component_div(&self.grid_spacing);
        let extent = [self.xres, self.yres, self.zres];
        for axis in 0..3 {
            if p[axis] < -EPSILON || p[axis] > (extent[axis] - 1) as Float + EPSILON {
                return SAMPLE_MISS;
            }
        }

        match self.filter_mode {
            VolumeFilterMode::Nearest => self.sample_nearest(p),
            VolumeFilterMode::Trilinear => self.sample_trilinear(p),
        }
    }
}
