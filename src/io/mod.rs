// Copyright @yucwang 2026

pub mod exr_utils;
pub mod ingest;
pub mod vol_file;
