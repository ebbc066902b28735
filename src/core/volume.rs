// Copyright @yucwang 2026

use crate::core::computation_node::{ComputationNode, ObjectId};
use crate::core::error::{Result, VolumeError};
use crate::core::params::{ParamSet, ParamValue};
use crate::core::piece::PieceTable;
use crate::math::aabb::AABB;
use crate::math::constants::{Float, Vector3f, Vector3i};
use std::any::Any;

/// Value written for points that yield no contribution: outside the
/// volume, or sampled before the first commit.
pub const SAMPLE_MISS: Float = Float::NAN;

/// Parameters every volume accepts after its first commit.
pub const COMMON_EDITABLE_PARAMS: &[&str] = &["strictIngest"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitState {
    Uncommitted,
    /// First commit done, `finish` has run.
    Finished,
    Recommitted,
}

/// When a variant accepts region writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionPolicy {
    BeforeFirstCommit,
    /// Writes are accepted at any time; committed data is updated in place.
    Streaming,
    Never,
}

pub struct VolumeBase {
    id: ObjectId,
    type_name: String,
    params: ParamSet,
    editable: &'static [&'static str],
    // Parameters the variant's storage was laid out from.
    frozen: &'static [&'static str],
    state: CommitState,
    failed_regions: Vec<(Vector3i, Vector3i)>,
}

impl VolumeBase {
    pub fn new(type_name: &str, editable: &'static [&'static str]) -> Self {
        Self {
            id: ObjectId::generate(),
            type_name: type_name.to_string(),
            params: ParamSet::new(),
            editable,
            frozen: &[],
            state: CommitState::Uncommitted,
            failed_regions: Vec::new(),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Type name and id, used in log messages.
    pub fn label(&self) -> String {
        format!("{}{}", self.type_name, self.id)
    }

    pub(crate) fn set_type_name(&mut self, type_name: &str) {
        self.type_name = type_name.to_string();
    }

    pub fn params(&self) -> &ParamSet {
        &self.params
    }

    pub fn commit_state(&self) -> CommitState {
        self.state
    }

    pub fn is_committed(&self) -> bool {
        self.state != CommitState::Uncommitted
    }

    pub fn is_editable(&self, name: &str) -> bool {
        self.editable.contains(&name) || COMMON_EDITABLE_PARAMS.contains(&name)
    }

    /// Called by a variant once it has laid out storage from `names`.
    /// From then on those parameters are fixed, even before the first commit.
    pub fn freeze_params(&mut self, names: &'static [&'static str]) {
        self.frozen = names;
    }

    pub fn is_frozen(&self, name: &str) -> bool {
        self.frozen.contains(&name)
    }

    /// Store a parameter. After the first commit only editable parameters
    /// may change, and frozen layout parameters never do; re-setting any
    /// parameter to its current value is allowed.
    pub fn set_param(&mut self, name: &str, value: ParamValue) -> Result<()> {
        let locked = self.is_frozen(name) || (self.is_committed() && !self.is_editable(name));
        if locked {
            if self.params.get(name) == Some(&value) {
                return Ok(());
            }
            return Err(VolumeError::NonEditableParameter(name.to_string()));
        }
        self.params.set(name, value);
        Ok(())
    }

    pub fn failed_regions(&self) -> &[(Vector3i, Vector3i)] {
        &self.failed_regions
    }

    fn record_failed_region(&mut self, index: Vector3i, count: Vector3i) {
        self.failed_regions.push((index, count));
    }

    /// Forget failed regions that a successful write fully covers.
    fn resolve_failed_regions(&mut self, index: &Vector3i, count: &Vector3i) {
        let lo = *index;
        let hi = index + count;
        self.failed_regions.retain(|(f_index, f_count)| {
            let f_hi = f_index + f_count;
            !(0..3).all(|a| f_index[a] >= lo[a] && f_hi[a] <= hi[a])
        });
    }

    fn advance_commit_state(&mut self) {
        self.state = match self.state {
            CommitState::Uncommitted => CommitState::Finished,
            _ => CommitState::Recommitted,
        };
    }
}

/// The sampling and ingestion contract every volume variant implements.
///
/// A volume is created through the factory in [`crate::core::registry`],
/// populated with [`Volume::set_region`], committed with [`Volume::commit`]
/// and then sampled with [`Volume::compute_samples`]. Storage layout and
/// interpolation are left to the variant; the shared commit bookkeeping
/// lives in [`VolumeBase`].
pub trait Volume: Send + Sync {
    fn base(&self) -> &VolumeBase;
    fn base_mut(&mut self) -> &mut VolumeBase;

    fn as_any(&self) -> &dyn Any;

    /// World-space bounds, when already known.
    fn bbox(&self) -> Option<AABB>;

    fn region_policy(&self) -> RegionPolicy {
        RegionPolicy::BeforeFirstCommit
    }

    /// Complete volume initialization (only on first commit).
    fn finish(&mut self) -> Result<()>;

    /// Re-apply parameters that may change after the first commit.
    fn update_editable_parameters(&mut self) -> Result<()> {
        Ok(())
    }

    /// Copy `count` voxels from `source` into the volume at voxel offset
    /// `index`. Called by [`Volume::set_region`] once the region policy
    /// allows the write.
    fn write_region(&mut self, source: &[u8], index: &Vector3i, count: &Vector3i) -> Result<()>;

    /// Sample one world-space point, returning [`SAMPLE_MISS`] outside
    /// the volume. Must not mutate the instance.
    fn sample(&self, p_world: &Vector3f) -> Float;

    fn is_data_distributed(&self) -> bool {
        false
    }

    /// Piece table of a data-distributed volume.
    fn pieces(&self) -> Option<&PieceTable> {
        None
    }

    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<()> {
        self.base_mut().set_param(name, value)
    }

    fn commit(&mut self) -> Result<()> {
        let failed = self.base().failed_regions().len();
        if failed > 0 && self.base().params().get_bool("strictIngest")?.unwrap_or(false) {
            log::error!("{} refuses to commit: {} region write(s) failed.",
                        self.base().label(), failed);
            return Err(VolumeError::PartialIngest { failed });
        }

        match self.base().commit_state() {
            CommitState::Uncommitted => {
                log::debug!("Finishing {}.", self.base().label());
                self.finish()?;
            }
            _ => self.update_editable_parameters()?,
        }

        // Failed regions are only forgotten once the commit went through.
        if failed > 0 {
            log::warn!("{} committed with {} failed region write(s).",
                       self.base().label(), failed);
            self.base_mut().failed_regions.clear();
        }
        self.base_mut().advance_commit_state();
        Ok(())
    }

    /// Whether the region policy allows a write right now.
    fn accepts_regions(&self) -> bool {
        match self.region_policy() {
            RegionPolicy::Streaming => true,
            RegionPolicy::BeforeFirstCommit => !self.base().is_committed(),
            RegionPolicy::Never => false,
        }
    }

    /// Copy voxels into the volume, returning whether the write succeeded.
    /// Failures are logged and remembered for the next commit.
    fn set_region(&mut self, source: &[u8], index: &Vector3i, count: &Vector3i) -> bool {
        let result = if self.accepts_regions() {
            self.write_region(source, index, count)
        } else {
            Err(VolumeError::RegionNotWritable(self.base().type_name().to_string()))
        };

        match result {
            Ok(()) => {
                self.base_mut().resolve_failed_regions(index, count);
                true
            }
            Err(err) => {
                log::warn!("Region write into {} failed: {}.", self.base().label(), err);
                self.base_mut().record_failed_region(*index, *count);
                false
            }
        }
    }

    /// Sample a batch of world-space points into `results`. Slots of
    /// `results` without a matching coordinate receive [`SAMPLE_MISS`];
    /// coordinates beyond `results.len()` are ignored.
    fn compute_samples(&self, results: &mut [Float], world_coordinates: &[Vector3f]) {
        if !self.base().is_committed() {
            results.iter_mut().for_each(|r| *r = SAMPLE_MISS);
            return;
        }
        for (i, out) in results.iter_mut().enumerate() {
            *out = world_coordinates.get(i).map_or(SAMPLE_MISS, |p| self.sample(p));
        }
    }
}

impl<V: Volume + ?Sized> ComputationNode for V {
    fn id(&self) -> ObjectId {
        self.base().id()
    }

    fn to_string(&self) -> String {
        self.base().label()
    }
}

/// Check that a region lies inside `dims`, returning its voxel count.
pub fn check_region(dims: &Vector3i, index: &Vector3i, count: &Vector3i) -> Result<usize> {
    let inside = (0..3).all(|a| {
        index[a] >= 0 && count[a] >= 0 && (index[a] as i64 + count[a] as i64) <= dims[a] as i64
    });
    if !inside {
        return Err(VolumeError::RegionOutOfBounds {
            index: [index.x, index.y, index.z],
            count: [count.x, count.y, count.z],
            dims: [dims.x, dims.y, dims.z],
        });
    }
    Ok(count.x as usize * count.y as usize * count.z as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingVolume {
        base: VolumeBase,
        finish_calls: usize,
        update_calls: usize,
        level: Float,
        fail_finish: bool,
    }

    impl CountingVolume {
        fn new() -> Self {
            Self { base: VolumeBase::new("counting", &["level"]), finish_calls: 0, update_calls: 0, level: 0.0, fail_finish: false }
        }
    }

    impl Volume for CountingVolume {
        fn base(&self) -> &VolumeBase { &self.base }
        fn base_mut(&mut self) -> &mut VolumeBase { &mut self.base }
        fn as_any(&self) -> &dyn Any { self }
        fn bbox(&self) -> Option<AABB> { None }

        fn finish(&mut self) -> Result<()> {
            self.finish_calls += 1;
            if self.fail_finish {
                return Err(VolumeError::MissingParameter("size".to_string()));
            }
            self.update_editable_parameters()
        }

        fn update_editable_parameters(&mut self) -> Result<()> {
            self.update_calls += 1;
            self.level = self.base.params().get_float("level")?.unwrap_or(0.0);
            Ok(())
        }

        fn write_region(&mut self, source: &[u8], index: &Vector3i, count: &Vector3i) -> Result<()> {
            let n = check_region(&Vector3i::new(4, 4, 4), index, count)?;
            if source.len() != n {
                return Err(VolumeError::RegionSizeMismatch { expected: n, actual: source.len() });
            }
            Ok(())
        }

        fn sample(&self, _p_world: &Vector3f) -> Float {
            self.level
        }
    }

    #[test]
    fn finish_runs_once() {
        let mut vol = CountingVolume::new();
        assert_eq!(vol.base().commit_state(), CommitState::Uncommitted);
        vol.commit().unwrap();
        assert_eq!(vol.base().commit_state(), CommitState::Finished);
        vol.commit().unwrap();
        vol.commit().unwrap();
        assert_eq!(vol.base().commit_state(), CommitState::Recommitted);
        assert_eq!(vol.finish_calls, 1);
        assert_eq!(vol.update_calls, 3);
    }

    #[test]
    fn editable_parameters_after_commit() {
        let mut vol = CountingVolume::new();
        vol.set_param("size", ParamValue::Int(4)).unwrap();
        vol.commit().unwrap();

        vol.set_param("level", ParamValue::Float(2.0)).unwrap();
        vol.commit().unwrap();
        let mut out = [0.0];
        vol.compute_samples(&mut out, &[Vector3f::zeros()]);
        assert_eq!(out[0], 2.0);

        vol.set_param("size", ParamValue::Int(4)).unwrap();
        match vol.set_param("size", ParamValue::Int(8)) {
            Err(VolumeError::NonEditableParameter(name)) => assert_eq!(name, "size"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(vol.base().params().get_int("size").unwrap(), Some(4));
        assert!(vol.set_param("strictIngest", ParamValue::Bool(true)).is_ok());
    }

    #[test]
    fn samples_before_commit_are_misses() {
        let vol = CountingVolume::new();
        let mut out = [0.0; 2];
        vol.compute_samples(&mut out, &[Vector3f::zeros(), Vector3f::new(1.0, 1.0, 1.0)]);
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn failed_region_blocks_strict_commit_until_rewritten() {
        let mut vol = CountingVolume::new();
        vol.set_param("strictIngest", ParamValue::Bool(true)).unwrap();

        let index = Vector3i::new(0, 0, 0);
        let count = Vector3i::new(2, 2, 2);
        assert!(!vol.set_region(&[0u8; 3], &index, &count));
        assert!(!vol.set_region(&[0u8; 8], &index, &Vector3i::new(5, 1, 1)));
        assert_eq!(vol.base().failed_regions().len(), 2);
        assert!(matches!(vol.commit(), Err(VolumeError::PartialIngest { failed: 2 })));
        assert_eq!(vol.finish_calls, 0);

        assert!(vol.set_region(&[0u8; 8], &index, &count));
        assert_eq!(vol.base().failed_regions().len(), 1);
        assert!(vol.commit().is_err());

        vol.set_param("strictIngest", ParamValue::Bool(false)).unwrap();
        vol.commit().unwrap();
        assert!(vol.base().failed_regions().is_empty());
        assert_eq!(vol.finish_calls, 1);
    }

    #[test]
    fn failed_regions_survive_a_failed_commit() {
        let mut vol = CountingVolume::new();
        vol.fail_finish = true;
        assert!(!vol.set_region(&[0u8; 3], &Vector3i::zeros(), &Vector3i::new(2, 2, 2)));
        assert!(matches!(vol.commit(), Err(VolumeError::MissingParameter(_))));
        assert_eq!(vol.base().failed_regions().len(), 1);
        assert!(!vol.base().is_committed());

        vol.fail_finish = false;
        vol.commit().unwrap();
        assert!(vol.base().failed_regions().is_empty());
    }

    #[test]
    fn frozen_parameters_reject_changes_before_commit() {
        let mut vol = CountingVolume::new();
        vol.set_param("size", ParamValue::Int(4)).unwrap();
        vol.base_mut().freeze_params(&["size", "origin"]);

        vol.set_param("size", ParamValue::Int(4)).unwrap();
        assert!(matches!(vol.set_param("size", ParamValue::Int(8)),
                         Err(VolumeError::NonEditableParameter(_))));
        assert!(vol.set_param("origin", ParamValue::Float(1.0)).is_err());
        assert_eq!(vol.base().params().get_int("size").unwrap(), Some(4));
        assert!(!vol.base().params().contains("origin"));
        vol.set_param("level", ParamValue::Float(1.0)).unwrap();
    }

    #[test]
    fn extra_result_slots_are_misses() {
        let mut vol = CountingVolume::new();
        vol.set_param("level", ParamValue::Float(3.0)).unwrap();
        vol.commit().unwrap();

        let mut out = [0.0; 3];
        vol.compute_samples(&mut out, &[Vector3f::zeros()]);
        assert_eq!(out[0], 3.0);
        assert!(out[1].is_nan() && out[2].is_nan());

        let mut short = [0.0; 1];
        vol.compute_samples(&mut short, &[Vector3f::zeros(), Vector3f::zeros()]);
        assert_eq!(short[0], 3.0);
    }

    #[test]
    fn region_policy_is_enforced() {
        let mut vol = CountingVolume::new();
        vol.commit().unwrap();
        assert!(!vol.set_region(&[0u8; 1], &Vector3i::zeros(), &Vector3i::new(1, 1, 1)));
        assert_eq!(vol.base().failed_regions().len(), 1);
    }

    #[test]
    fn check_region_bounds() {
        let dims = Vector3i::new(4, 4, 4);
        assert_eq!(check_region(&dims, &Vector3i::new(1, 1, 1), &Vector3i::new(2, 2, 2)).unwrap(), 8);
        assert_eq!(check_region(&dims, &Vector3i::new(0, 0, 0), &Vector3i::new(4, 4, 4)).unwrap(), 64);
        assert!(check_region(&dims, &Vector3i::new(3, 0, 0), &Vector3i::new(2, 1, 1)).is_err());
        assert!(check_region(&dims, &Vector3i::new(-1, 0, 0), &Vector3i::new(1, 1, 1)).is_err());
    }
}
