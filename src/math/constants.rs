/* Copyright 2020 @Yuchen Wong */

use nalgebra::{DMatrix, Vector3};

pub type Float = f32;
pub type Int = i32;

pub type Vector3f = Vector3<Float>;
pub type Vector3i = Vector3<Int>;
pub type MatrixXF = DMatrix<Float>;

pub const EPSILON: Float = 1e-4;
pub const FLOAT_MAX: Float = std::f32::MAX;
pub const FLOAT_MIN: Float = std::f32::MIN;
