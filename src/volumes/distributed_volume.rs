// Copyright @yucwang 2026

use crate::core::computation_node::ObjectHandle;
use crate::core::error::{Result, VolumeError};
use crate::core::params::ParamValue;
use crate::core::piece::{Piece, PieceTable};
use crate::core::registry::create_instance;
use crate::core::volume::{check_region, RegionPolicy, Volume, VolumeBase, SAMPLE_MISS};
use crate::math::aabb::AABB;
use crate::math::constants::{Float, Vector3f, Vector3i};
use crate::volumes::structured_volume::StructuredVolume;
use crate::volumes::voxel::VoxelType;
use std::any::Any;
use std::sync::Arc;

/// Voxel range of one block, ghost cells included, `hi` exclusive.
struct Block {
    lo: Vector3i,
    hi: Vector3i,
    local: bool,
}

/// A structured grid split into blocks spread over several processes.
///
/// Block `i` of the `blockCount` grid belongs to process `i % processCount`.
/// Blocks owned by this process are instantiated through the factory as
/// `pieceType` volumes and receive the voxels of every region write that
/// touches them, ghost cells included. Other blocks are only described by
/// their bounds and owner.
pub struct DataDistributedVolume {
    base: VolumeBase,
    table: PieceTable,
    blocks: Vec<Block>,
    dims: Vector3i,
    voxel_type: VoxelType,
    grid_origin: Vector3f,
    grid_spacing: Vector3f,
    process_rank: usize,
    process_count: usize,
}

impl DataDistributedVolume {
    pub const TYPE_NAME: &'static str = "data_distributed";
    const EDITABLE: &'static [&'static str] = &["filterMode", "samplingRate"];
    /// Read once when the pieces are built, fixed afterwards.
    pub const LAYOUT: &'static [&'static str] = &[
        "dimensions", "voxelType", "gridOrigin", "gridSpacing", "blockCount",
        "ghostCells", "processRank", "processCount", "pieceType",
    ];

    pub fn new() -> Self {
        let base = VolumeBase::new(Self::TYPE_NAME, Self::EDITABLE);
        let table = PieceTable::new(base.id());
        Self {
            base,
            table,
            blocks: Vec::new(),
            dims: Vector3i::zeros(),
            voxel_type: VoxelType::Float,
            grid_origin: Vector3f::zeros(),
            grid_spacing: Vector3f::new(1.0, 1.0, 1.0),
            process_rank: 0,
            process_count: 1,
        }
    }

    pub fn process_rank(&self) -> usize {
        self.process_rank
    }

    pub fn process_count(&self) -> usize {
        self.process_count
    }

    pub fn local_piece_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.local).count()
    }

    /// Mutable piece table, e.g. to cache pieces fetched from their owners.
    pub fn pieces_mut(&mut self) -> &mut PieceTable {
        &mut self.table
    }

    fn logical_bounds(&self) -> Option<AABB> {
        if self.blocks.is_empty() {
            return None;
        }
        Some(AABB::new(self.grid_origin, self.voxel_to_world(&(self.dims - Vector3i::new(1, 1, 1)))))
    }

    fn voxel_to_world(&self, v: &Vector3i) -> Vector3f {
        let v = Vector3f::new(v.x as Float, v.y as Float, v.z as Float);
        self.grid_origin + v.component_mul(&self.grid_spacing)
    }

    /// Split the grid into blocks and create the pieces, once.
    fn build_layout(&mut self) -> Result<()> {
        if !self.blocks.is_empty() {
            return Ok(());
        }

        let params = self.base.params();
        let dims = params.require_vec3i("dimensions")?;
        if dims.iter().any(|d| *d <= 0) {
            return Err(invalid("dimensions", "all dimensions must be positive"));
        }
        let voxel_type = VoxelType::from_name(params.get_string("voxelType")?.unwrap_or("float"))?;
        let grid_origin = params.get_vec3f("gridOrigin")?.unwrap_or_else(Vector3f::zeros);
        let grid_spacing = params.get_vec3f("gridSpacing")?.unwrap_or_else(|| Vector3f::new(1.0, 1.0, 1.0));
        if grid_spacing.iter().any(|s| *s <= 0.0) {
            return Err(invalid("gridSpacing", "spacing must be positive"));
        }
        let block_count = params.get_vec3i("blockCount")?.unwrap_or_else(|| Vector3i::new(1, 1, 1));
        if (0..3).any(|a| block_count[a] <= 0 || block_count[a] > dims[a]) {
            return Err(invalid("blockCount", "block counts must lie in 1..=dimensions"));
        }
        let ghost = params.get_int("ghostCells")?.unwrap_or(1);
        if ghost < 0 {
            return Err(invalid("ghostCells", "ghost cell count must not be negative"));
        }
        let process_count = params.get_int("processCount")?.unwrap_or(1);
        let process_rank = params.get_int("processRank")?.unwrap_or(0);
        if process_count <= 0 {
            return Err(invalid("processCount", "process count must be positive"));
        }
        if process_rank < 0 || process_rank >= process_count {
            return Err(invalid("processRank", "rank must lie in 0..processCount"));
        }
        let piece_type = params
            .get_string("pieceType")?
            .unwrap_or(StructuredVolume::TYPE_NAME)
            .to_string();
        let forwarded: Vec<(&'static str, ParamValue)> = Self::EDITABLE
            .iter()
            .filter_map(|name| params.get(name).map(|v| (*name, v.clone())))
            .collect();

        self.dims = dims;
        self.voxel_type = voxel_type;
        self.grid_origin = grid_origin;
        self.grid_spacing = grid_spacing;
        self.process_rank = process_rank as usize;
        self.process_count = process_count as usize;

        let mut table = PieceTable::new(self.base.id());
        let mut blocks = Vec::new();
        let mut block_id = 0usize;
        for bz in 0..block_count.z {
            for by in 0..block_count.y {
                for bx in 0..block_count.x {
                    let b = Vector3i::new(bx, by, bz);
                    let mut lo = Vector3i::zeros();
                    let mut hi = Vector3i::zeros();
                    for a in 0..3 {
                        let native_lo = (dims[a] as i64 * b[a] as i64 / block_count[a] as i64) as i32;
                        let native_hi = (dims[a] as i64 * (b[a] as i64 + 1) / block_count[a] as i64) as i32;
                        lo[a] = (native_lo - ghost).max(0);
                        hi[a] = (native_hi + ghost).min(dims[a]);
                    }

                    let bounds = AABB::new(self.voxel_to_world(&lo),
                                           self.voxel_to_world(&(hi - Vector3i::new(1, 1, 1))));
                    let owner = block_id % self.process_count;
                    let mut piece = Piece::new(bounds, self.base.id())
                        .with_owner(ObjectHandle::new(owner, block_id as u64));

                    let local = owner == self.process_rank;
                    if local {
                        let mut data = create_instance(&piece_type)?;
                        data.set_param("dimensions", ParamValue::Vec3i(hi - lo))?;
                        data.set_param("voxelType", ParamValue::from(voxel_type.name()))?;
                        data.set_param("gridOrigin", ParamValue::Vec3f(self.voxel_to_world(&lo)))?;
                        data.set_param("gridSpacing", ParamValue::Vec3f(grid_spacing))?;
                        for (name, value) in &forwarded {
                            data.set_param(name, value.clone())?;
                        }
                        piece = piece.with_actual_data(Arc::from(data));
                    }

                    table.push(piece);
                    blocks.push(Block { lo, hi, local });
                    block_id += 1;
                }
            }
        }
        self.table = table;
        self.blocks = blocks;
        self.base.freeze_params(Self::LAYOUT);

        log::info!("Decomposed {} into {} piece(s), {} resident on rank {}/{}.",
                   self.base.label(), self.blocks.len(), self.local_piece_count(),
                   self.process_rank, self.process_count);
        Ok(())
    }

    fn local_volume_mut(&mut self, idx: usize) -> Result<Option<&mut (dyn Volume + 'static)>> {
        if !self.blocks[idx].local {
            return Ok(None);
        }
        let data = match self.table.get_mut(idx).and_then(|piece| piece.actual_data_mut()) {
            Some(data) => data,
            None => return Ok(None),
        };
        Arc::get_mut(data).map(Some).ok_or(VolumeError::PieceDataShared(idx))
    }
}

impl Default for DataDistributedVolume {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid(name: &str, reason: &str) -> VolumeError {
    VolumeError::InvalidParameter { name: name.to_string(), reason: reason.to_string() }
}

/// Copy the voxels of `[lo, hi)` out of a source buffer laid out for the
/// region `index`, `count`.
fn extract_subregion(source: &[u8], size: usize, index: &Vector3i, count: &Vector3i,
                     lo: &Vector3i, hi: &Vector3i) -> Vec<u8> {
    let nx = count.x as usize;
    let ny = count.y as usize;
    let row_bytes = (hi.x - lo.x) as usize * size;
    let rows = (hi.y - lo.y) as usize * (hi.z - lo.z) as usize;
    let mut out = Vec::with_capacity(row_bytes * rows);
    let sx = (lo.x - index.x) as usize;
    for z in lo.z..hi.z {
        let sz = (z - index.z) as usize;
        for y in lo.y..hi.y {
            let sy = (y - index.y) as usize;
            let start = ((sz * ny + sy) * nx + sx) * size;
            out.extend_from_slice(&source[start..start + row_bytes]);
        }
    }
    out
}

impl Volume for DataDistributedVolume {
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
        self.logical_bounds()
    }

    fn region_policy(&self) -> RegionPolicy {
        RegionPolicy::Streaming
    }

    fn finish(&mut self) -> Result<()> {
        self.build_layout()?;
        for idx in 0..self.blocks.len() {
            if let Some(data) = self.local_volume_mut(idx)? {
                data.commit()?;
            }
        }

        self.table.validate()?;
        if let Some(extent) = self.logical_bounds() {
            self.table.validate_coverage(&extent)?;
        }
        log::info!("Committed {} with {} piece(s).", self.base.label(), self.table.len());
        Ok(())
    }

    fn update_editable_parameters(&mut self) -> Result<()> {
        let params = self.base.params();
        let forwarded: Vec<(&'static str, ParamValue)> = Self::EDITABLE
            .iter()
            .filter_map(|name| params.get(name).map(|v| (*name, v.clone())))
            .collect();

        for idx in 0..self.blocks.len() {
            if let Some(data) = self.local_volume_mut(idx)? {
                for (name, value) in &forwarded {
                    data.set_param(name, value.clone())?;
                }
                data.commit()?;
            }
        }
        Ok(())
    }

    /// Every local piece the region touches is checked before any of them
    /// is written, so a rejected write leaves all pieces unchanged.
    fn write_region(&mut self, source: &[u8], index: &Vector3i, count: &Vector3i) -> Result<()> {
        self.build_layout()?;
        let voxels = check_region(&self.dims, index, count)?;
        let size = self.voxel_type.size();
        let expected = voxels * size;
        if source.len() != expected {
            return Err(VolumeError::RegionSizeMismatch { expected, actual: source.len() });
        }

        let end = index + count;
        let mut targets = Vec::new();
        for (idx, block) in self.blocks.iter().enumerate() {
            let lo = index.sup(&block.lo);
            let hi = end.inf(&block.hi);
            if block.local && (0..3).all(|a| lo[a] < hi[a]) {
                targets.push((idx, block.lo, lo, hi));
            }
        }

        for &(idx, ..) in &targets {
            match self.local_volume_mut(idx)? {
                Some(data) if data.accepts_regions() => {}
                _ => return Err(VolumeError::PieceWriteFailed(idx)),
            }
        }

        for &(idx, block_lo, lo, hi) in &targets {
            let sub = extract_subregion(source, size, index, count, &lo, &hi);
            if let Some(data) = self.local_volume_mut(idx)? {
                if !data.set_region(&sub, &(lo - block_lo), &(hi - lo)) {
                    return Err(VolumeError::PieceWriteFailed(idx));
                }
            }
        }
        log::trace!("Region write into {} reached {} local piece(s).", self.base.label(), targets.len());
        Ok(())
    }

    fn sample(&self, p_world: &Vector3f) -> Float {
        match self.logical_bounds() {
            Some(extent) if extent.contains_point(p_world) => {}
            _ => return SAMPLE_MISS,
        }
        for piece in self.table.iter() {
            if !piece.world_bounds().contains_point(p_world) {
                continue;
            }
            if let Some(data) = piece.actual_data() {
                let value = data.sample(p_world);
                if !value.is_nan() {
                    return value;
                }
            }
        }
        SAMPLE_MISS
    }

    fn is_data_distributed(&self) -> bool {
        true
    }

    fn pieces(&self) -> Option<&PieceTable> {
        Some(&self.table)
    }
}
