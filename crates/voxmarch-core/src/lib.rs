pub mod constants;
pub mod dda;
pub mod error;
pub mod math;
pub mod types;

pub use error::{Result, VoxmarchError};
pub use types::{Voxel, VoxelType};
