use glam::{IVec3, UVec3};
use thiserror::Error;

/// Errors surfaced by world generation, voxel lookup, traversal and renderer setup.
///
/// Generation and lookup failures are local and returned to the caller.
/// `ResourceUnavailable` is raised while acquiring GPU resources and aborts
/// initialization; nothing in the crate retries.
#[derive(Debug, Error)]
pub enum VoxmarchError {
    #[error("voxel coordinate {coord} lies outside world extent {extent}")]
    OutOfRange { coord: IVec3, extent: UVec3 },

    #[error("{0} accessed before it was built")]
    NotInitialized(&'static str),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("required GPU resource unavailable: {0}")]
    ResourceUnavailable(String),
}

pub type Result<T> = std::result::Result<T, VoxmarchError>;
