// Copyright @yucwang 2026

use crate::math::constants::{Float, Int};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VolumeError {
    /// No constructor is registered under the requested type name.
    #[error("unknown volume type '{0}'")]
    UnknownType(String),

    #[error("missing required parameter '{0}'")]
    MissingParameter(String),

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// The parameter is fixed once the volume has been committed.
    #[error("parameter '{0}' cannot change after the first commit")]
    NonEditableParameter(String),

    #[error("region at {index:?} with count {count:?} exceeds volume dimensions {dims:?}")]
    RegionOutOfBounds { index: [Int; 3], count: [Int; 3], dims: [Int; 3] },

    #[error("region source holds {actual} bytes, expected {expected}")]
    RegionSizeMismatch { expected: usize, actual: usize },

    #[error("volume '{0}' does not accept region writes in its current state")]
    RegionNotWritable(String),

    #[error("{failed} region write(s) failed since the last commit")]
    PartialIngest { failed: usize },

    /// A piece has neither resident data nor anybody to fetch it from.
    #[error("piece {0} has no local data and no owners")]
    InconsistentPiece(usize),

    #[error("no piece covers world point {point:?}")]
    CoverageGap { point: [Float; 3] },

    #[error("data of piece {0} is shared and cannot be modified")]
    PieceDataShared(usize),

    #[error("region write into piece {0} failed")]
    PieceWriteFailed(usize),

    #[error("format error: {0}")]
    Format(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VolumeError>;
