// Copyright @yucwang 2021

pub mod computation_node;
pub mod error;
pub mod params;
pub mod piece;
pub mod registry;
pub mod slice;
pub mod volume;
pub mod volume_loader;
