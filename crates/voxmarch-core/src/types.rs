use glam::IVec3;
use serde::{Deserialize, Serialize};

use crate::constants::VOXEL_CODE_STRIDE;

/// Chunk coordinate in chunk-space (each unit = one chunk extent).
pub type ChunkCoord = IVec3;

/// World coordinate in voxel-space.
pub type WorldCoord = IVec3;

/// Kind of material occupying a voxel.
///
/// The texture code is derived from the ordinal, so inserting a variant
/// shifts every code after it. Anything persisted outside this process
/// must pin ordinals explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum VoxelType {
    #[default]
    Air = 0,
    Stone = 1,
    Grass = 2,
    Dirt = 3,
}

impl VoxelType {
    /// All variants in ordinal order.
    pub const ALL: [VoxelType; 4] = [
        VoxelType::Air,
        VoxelType::Stone,
        VoxelType::Grass,
        VoxelType::Dirt,
    ];

    pub fn ordinal(self) -> u16 {
        self as u16
    }

    /// Value written into the world texture: `ordinal * 1000`.
    pub fn code(self) -> u16 {
        self.ordinal() * VOXEL_CODE_STRIDE
    }

    /// Inverse of [`VoxelType::code`]. Returns `None` for codes that are not an
    /// exact multiple of the stride or whose ordinal has no variant.
    pub fn from_code(code: u16) -> Option<Self> {
        if code % VOXEL_CODE_STRIDE != 0 {
            return None;
        }
        Self::ALL
            .get((code / VOXEL_CODE_STRIDE) as usize)
            .copied()
    }

    pub fn is_air(self) -> bool {
        self == VoxelType::Air
    }
}

/// A single cell of the world, tagged with its material and absolute position.
/// Immutable once placed in a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Voxel {
    voxel_type: VoxelType,
    world_position: WorldCoord,
}

impl Voxel {
    pub fn new(voxel_type: VoxelType, world_position: WorldCoord) -> Self {
        Self {
            voxel_type,
            world_position,
        }
    }

    pub fn voxel_type(&self) -> VoxelType {
        self.voxel_type
    }

    pub fn world_position(&self) -> WorldCoord {
        self.world_position
    }

    pub fn code(&self) -> u16 {
        self.voxel_type.code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_ordinal_times_stride() {
        assert_eq!(VoxelType::Air.code(), 0);
        assert_eq!(VoxelType::Stone.code(), 1000);
        assert_eq!(VoxelType::Grass.code(), 2000);
        assert_eq!(VoxelType::Dirt.code(), 3000);
    }

    #[test]
    fn test_code_roundtrip_every_variant() {
        for ty in VoxelType::ALL {
            assert_eq!(VoxelType::from_code(ty.code()), Some(ty));
            assert_eq!(ty.code() / VOXEL_CODE_STRIDE, ty.ordinal());
        }
    }

    #[test]
    fn test_from_code_rejects_unknown() {
        assert_eq!(VoxelType::from_code(1), None);
        assert_eq!(VoxelType::from_code(2500), None);
        assert_eq!(VoxelType::from_code(4000), None);
        assert_eq!(VoxelType::from_code(u16::MAX), None);
    }

    #[test]
    fn test_all_in_ordinal_order() {
        for (i, ty) in VoxelType::ALL.iter().enumerate() {
            assert_eq!(ty.ordinal() as usize, i);
        }
    }

    #[test]
    fn test_voxel_accessors() {
        let v = Voxel::new(VoxelType::Dirt, IVec3::new(3, -1, 7));
        assert_eq!(v.voxel_type(), VoxelType::Dirt);
        assert_eq!(v.world_position(), IVec3::new(3, -1, 7));
        assert_eq!(v.code(), 3000);
    }
}
