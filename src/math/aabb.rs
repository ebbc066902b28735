// Copyright 2020 @TwoCookingMice

use super::constants::{ Float, Vector3f,
                       FLOAT_MIN, FLOAT_MAX };
use super::ray::{ Ray3f };

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AABB {
    pub p_min: Vector3f,
    pub p_max: Vector3f
}

impl Default for AABB {
    fn default() -> Self {
        Self { p_min: Vector3f::new(FLOAT_MAX, FLOAT_MAX, FLOAT_MAX),
               p_max: Vector3f::new(FLOAT_MIN, FLOAT_MIN, FLOAT_MIN) }
    }
}

impl AABB {
    pub fn new(p_min: Vector3f, p_max: Vector3f) -> Self {
        let mut min = Vector3f::new(0.0, 0.0, 0.0);
        let mut max = Vector3f::new(0.0, 0.0, 0.0);
        for idx in 0..3 {
            min[idx] = p_min[idx].min(p_max[idx]);
            max[idx] = p_max[idx].max(p_min[idx]);
        }
        Self { p_min: min, p_max: max }
    }

    pub fn expand_by_aabb(&mut self, other: &AABB) {
        for idx in 0..3 {
            self.p_min[idx] = self.p_min[idx].min(other.p_min[idx]);
            self.p_max[idx] = self.p_max[idx].max(other.p_max[idx]);
        }
    }

    /// Closed containment test, points on a face are inside.
    pub fn contains_point(&self, p: &Vector3f) -> bool {
        (0..3).all(|idx| p[idx] >= self.p_min[idx] && p[idx] <= self.p_max[idx])
    }

    /// Closed overlap test, boxes sharing a face overlap.
    pub fn overlaps(&self, other: &AABB) -> bool {
        if !self.is_valid() || !other.is_valid() {
            return false;
        }
        (0..3).all(|idx| self.p_min[idx] <= other.p_max[idx] && other.p_min[idx] <= self.p_max[idx])
    }

    pub fn ray_intersect_range(&self, ray: &Ray3f) -> Option<(Float, Float)> {
        if !self.is_valid() {
            return None;
        }

        let o = ray.origin();
        let d = ray.dir();
        let mut t_min = ray.min_t;
        let mut t_max = ray.max_t;

        for idx in 0..3 {
            let dir = d[idx];
            if dir.abs() < 1e-8 {
                if o[idx] < self.p_min[idx] || o[idx] > self.p_max[idx] {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / dir;
            let mut t0 = (self.p_min[idx] - o[idx]) * inv;
            let mut t1 = (self.p_max[idx] - o[idx]) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }

            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_max < t_min {
                return None;
            }
        }

        Some((t_min, t_max))
    }

    pub fn diagnal(&self) -> Vector3f {
        self.p_max - self.p_min
    }

    pub fn is_valid(&self) -> bool {
        let mut result = true;
        for idx in 0..3 {
            if self.p_min[idx] > self.p_max[idx] {
                result = false;
                break;
            }
        }

        result
    }
}

/* Test for AABB */
#[cfg(test)]
mod tests {
    use super::AABB;
    use super::Ray3f;
    use super::Vector3f;

    #[test]
    fn test_aabb_geometry() {
        let min = Vector3f::new(1.0, 7.0, 3.0);
        let max = Vector3f::new(4.0, 4.0, 4.0);
        let mut bbox: AABB = AABB::new(min, max);

        assert_eq!(bbox.p_min, Vector3f::new(1.0, 4.0, 3.0));
        assert_eq!(bbox.p_max, Vector3f::new(4.0, 7.0, 4.0));
        assert_eq!(bbox.diagnal(), Vector3f::new(3.0, 3.0, 1.0));

        bbox.expand_by_aabb(&AABB::new(Vector3f::new(-1.0, 5.0, 6.0), Vector3f::new(0.0, 5.0, 6.0)));
        assert_eq!(bbox.p_min[0], -1.0);
        assert_eq!(bbox.p_max[2], 6.0);

        let mut bbox1: AABB = AABB::default();
        assert!(!bbox1.is_valid());
        bbox1.expand_by_aabb(&bbox);
        assert_eq!(bbox1, bbox);
    }

    #[test]
    fn test_aabb_containment_and_overlap() {
        let a = AABB::new(Vector3f::new(0.0, 0.0, 0.0), Vector3f::new(1.0, 1.0, 1.0));
        let b = AABB::new(Vector3f::new(1.0, 0.0, 0.0), Vector3f::new(2.0, 1.0, 1.0));
        let c = AABB::new(Vector3f::new(1.5, 0.0, 0.0), Vector3f::new(2.0, 1.0, 1.0));

        assert!(a.contains_point(&Vector3f::new(1.0, 0.5, 0.0)));
        assert!(!a.contains_point(&Vector3f::new(1.01, 0.5, 0.0)));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(!a.overlaps(&AABB::default()));
    }

    #[test]
    fn test_aabb_intersect() {
        let o1 = Vector3f::new(0.0, 0.0, 0.0);
        let d1 = Vector3f::new(1.0, 1.0, 1.0);

        let bbox = AABB::new(Vector3f::new(-1.0, -1.0, -1.0),
                             Vector3f::new(1.0, 1.0, 1.0));

        let r1 = Ray3f::new(o1, d1, Some(0.0), Some(1.0));
        let (t0, t1) = bbox.ray_intersect_range(&r1).unwrap();
        assert_eq!(t0, 0.0);
        assert!((t1 - 1.0).abs() < 1e-6);

        let o2 = Vector3f::new(-1.1, 0.0, 0.0);
        let d2 = Vector3f::new(-0.1, 10.0, 10.0);
        let r3 = Ray3f::new(o2, d2, None, None);
        assert!(bbox.ray_intersect_range(&r3).is_none());

        let o3 = Vector3f::new(-5.0, 0.0, 0.0);
        let r4 = Ray3f::new(o3, Vector3f::new(1.0, 0.0, 0.0), None, None);
        let (t0, t1) = bbox.ray_intersect_range(&r4).unwrap();
        assert!((t0 - 4.0).abs() < 1e-6);
        assert!((t1 - 6.0).abs() < 1e-6);
    }
}
