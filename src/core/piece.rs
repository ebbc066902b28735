// Copyright @yucwang 2026

use crate::core::computation_node::{ObjectHandle, ObjectId};
use crate::core::error::{Result, VolumeError};
use crate::core::volume::Volume;
use crate::math::aabb::AABB;
use crate::math::constants::{Float, Vector3f};
use crate::math::ray::Ray3f;
use std::sync::Arc;

/// Part of a data-distributed volume, ghost margin included. Either
/// resident on this process or owned by one or more remote processes.
pub struct Piece {
    /// Everything a ray may need from this piece, ghost cells included.
    world_bounds: AABB,
    /// Logical volume this piece belongs to. Never used to manage lifetime.
    parent: ObjectId,
    actual_data: Option<Arc<dyn Volume>>,
    owners: Vec<ObjectHandle>,
}

impl Piece {
    pub fn new(world_bounds: AABB, parent: ObjectId) -> Self {
        Self { world_bounds, parent, actual_data: None, owners: Vec::new() }
    }

    pub fn with_owner(mut self, owner: ObjectHandle) -> Self {
        self.add_owner(owner);
        self
    }

    pub fn with_actual_data(mut self, data: Arc<dyn Volume>) -> Self {
        self.actual_data = Some(data);
        self
    }

    /// Record another replica holder. Duplicates are ignored.
    pub fn add_owner(&mut self, owner: ObjectHandle) {
        if !self.owners.contains(&owner) {
            self.owners.push(owner);
        }
    }

    pub fn world_bounds(&self) -> &AABB {
        &self.world_bounds
    }

    pub fn parent(&self) -> ObjectId {
        self.parent
    }

    pub fn owners(&self) -> &[ObjectHandle] {
        &self.owners
    }

    pub fn actual_data(&self) -> Option<&Arc<dyn Volume>> {
        self.actual_data.as_ref()
    }

    pub(crate) fn actual_data_mut(&mut self) -> Option<&mut Arc<dyn Volume>> {
        self.actual_data.as_mut()
    }

    pub fn is_local(&self) -> bool {
        self.actual_data.is_some()
    }
}

/// Where the data of a piece can be found.
pub enum PieceLocation<'a> {
    Local(&'a Arc<dyn Volume>),
    Remote(&'a [ObjectHandle]),
}

/// Lets a ray integrator find the pieces a ray or region needs and whom to
/// ask for the ones that are not resident.
pub struct PieceTable {
    parent: ObjectId,
    pieces: Vec<Piece>,
}

impl PieceTable {
    pub fn new(parent: ObjectId) -> Self {
        Self { parent, pieces: Vec::new() }
    }

    pub fn parent(&self) -> ObjectId {
        self.parent
    }

    pub fn push(&mut self, piece: Piece) -> usize {
        debug_assert_eq!(piece.parent, self.parent);
        self.pieces.push(piece);
        self.pieces.len() - 1
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Piece> {
        self.pieces.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Piece> {
        self.pieces.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Piece> {
        self.pieces.iter()
    }

    /// Union of all piece bounds.
    pub fn bounds(&self) -> AABB {
        let mut out = AABB::default();
        for piece in &self.pieces {
            out.expand_by_aabb(&piece.world_bounds);
        }
        out
    }

    /// Indices of the pieces whose bounds intersect `region`.
    pub fn intersecting(&self, region: &AABB) -> Vec<usize> {
        self.pieces
            .iter()
            .enumerate()
            .filter(|(_, piece)| piece.world_bounds.overlaps(region))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Indices of the pieces whose bounds contain `p_world`.
    pub fn containing(&self, p_world: &Vector3f) -> Vec<usize> {
        self.pieces
            .iter()
            .enumerate()
            .filter(|(_, piece)| piece.world_bounds.contains_point(p_world))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Pieces crossed by `ray` as `(index, t_enter, t_exit)`, nearest first.
    pub fn along_ray(&self, ray: &Ray3f) -> Vec<(usize, Float, Float)> {
        let mut hits: Vec<(usize, Float, Float)> = self
            .pieces
            .iter()
            .enumerate()
            .filter_map(|(idx, piece)| {
                piece.world_bounds.ray_intersect_range(ray).map(|(t0, t1)| (idx, t0, t1))
            })
            .collect();
        hits.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        hits
    }

    /// Resolve a piece to its resident data or to the processes holding it.
    pub fn locate(&self, index: usize) -> Result<PieceLocation<'_>> {
        let piece = self
            .pieces
            .get(index)
            .ok_or_else(|| VolumeError::Format(format!("piece index {} out of range", index)))?;
        if let Some(data) = piece.actual_data.as_ref() {
            return Ok(PieceLocation::Local(data));
        }
        if piece.owners.is_empty() {
            log::error!("Piece {} of volume {} has no data and no owners.", index, self.parent);
            return Err(VolumeError::InconsistentPiece(index));
        }
        Ok(PieceLocation::Remote(&piece.owners))
    }

    /// Install a locally cached copy of a piece fetched from its owners.
    pub fn attach_local_data(&mut self, index: usize, data: Arc<dyn Volume>) -> Result<()> {
        let piece = self
            .pieces
            .get_mut(index)
            .ok_or_else(|| VolumeError::Format(format!("piece index {} out of range", index)))?;
        log::debug!("Caching piece {} of volume {} locally.", index, self.parent);
        piece.actual_data = Some(data);
        Ok(())
    }

    /// Every piece must be resident or have somebody to fetch it from.
    pub fn validate(&self) -> Result<()> {
        for idx in 0..self.pieces.len() {
            self.locate(idx)?;
        }
        Ok(())
    }

    /// Check that the union of piece bounds covers `extent` without gaps.
    ///
    /// The extent is cut along every piece face; each resulting cell is
    /// covered iff its center is, so testing the centers is exact.
    pub fn validate_coverage(&self, extent: &AABB) -> Result<()> {
        if !extent.is_valid() {
            return Ok(());
        }

        let mut sample_points: Vec<Vec<Float>> = Vec::with_capacity(3);
        for axis in 0..3 {
            let lo = extent.p_min[axis];
            let hi = extent.p_max[axis];
            let mut cuts = vec![lo, hi];
            for piece in &self.pieces {
                for v in [piece.world_bounds.p_min[axis], piece.world_bounds.p_max[axis]] {
                    if v > lo && v < hi {
                        cuts.push(v);
                    }
                }
            }
            cuts.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            cuts.dedup();
            if cuts.len() == 1 {
                sample_points.push(cuts);
            } else {
                sample_points.push(cuts.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect());
            }
        }

        for &z in &sample_points[2] {
            for &y in &sample_points[1] {
                for &x in &sample_points[0] {
                    let p = Vector3f::new(x, y, z);
                    if !self.pieces.iter().any(|piece| piece.world_bounds.contains_point(&p)) {
                        log::error!("Volume {} has a coverage gap at ({}, {}, {}).", self.parent, x, y, z);
                        return Err(VolumeError::CoverageGap { point: [x, y, z] });
                    }
                }
            }
        }
        Ok(())
    }
}
