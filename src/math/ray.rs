// Copyright 2020 @TwoCookingMice

use super::constants::{Float, Vector3f};

pub struct Ray3f {
    origin: Vector3f,
    dir: Vector3f,
    pub min_t: Float,
    pub max_t: Float
}

impl Ray3f {
    pub fn new(o: Vector3f, d: Vector3f, 
               min_t: Option<Float>, max_t: Option<Float>) -> Self {
        Self { origin: o, dir: d.normalize(), 
               min_t: min_t.unwrap_or(0.0),
               max_t: max_t.unwrap_or(std::f32::MAX)}
    }

    pub fn origin(&self) -> Vector3f {
        self.origin
    }

    pub fn dir(&self) -> Vector3f {
        self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_direction_is_normalized() {
        let ray = Ray3f::new(Vector3f::new(1.0, 0.0, 0.0), Vector3f::new(0.0, 2.0, 0.0), None, Some(5.0));
        assert!((ray.dir() - Vector3f::new(0.0, 1.0, 0.0)).norm() < 1e-6);
        assert_eq!(ray.origin(), Vector3f::new(1.0, 0.0, 0.0));
        assert_eq!(ray.min_t, 0.0);
        assert_eq!(ray.max_t, 5.0);
    }
}
