use glam::UVec3;
use voxmarch_core::math::{checked_flatten, flatten};
use voxmarch_core::types::{Voxel, VoxelType, WorldCoord};
use voxmarch_core::Result;

/// A fixed-size cuboid of voxels anchored at a world-space origin.
///
/// Storage is one contiguous arena indexed with x varying fastest. A chunk is
/// never mutated after generation; regenerating means building a new one.
#[derive(Debug, Clone)]
pub struct Chunk {
    origin: WorldCoord,
    size: UVec3,
    voxels: Vec<Voxel>,
}

impl Chunk {
    /// Wrap an already-filled arena. `voxels` must hold `size.x * size.y * size.z`
    /// entries in arena order.
    pub(crate) fn from_arena(origin: WorldCoord, size: UVec3, voxels: Vec<Voxel>) -> Self {
        debug_assert_eq!(voxels.len(), voxmarch_core::math::volume(size));
        Self {
            origin,
            size,
            voxels,
        }
    }

    pub fn origin(&self) -> WorldCoord {
        self.origin
    }

    pub fn size(&self) -> UVec3 {
        self.size
    }

    /// Voxel at an in-bounds local offset. Callers that already split a
    /// global coordinate use this; everyone else goes through [`Chunk::get`].
    pub(crate) fn voxel(&self, local: UVec3) -> &Voxel {
        &self.voxels[flatten(local, self.size)]
    }

    /// Bounds-checked lookup by local offset.
    pub fn get(&self, local: glam::IVec3) -> Result<&Voxel> {
        let index = checked_flatten(local, self.size)?;
        Ok(&self.voxels[index])
    }

    /// Texture code of the voxel at an in-bounds local offset.
    pub(crate) fn code_at(&self, local: UVec3) -> u16 {
        self.voxel(local).code()
    }

    pub fn voxels(&self) -> &[Voxel] {
        &self.voxels
    }

    /// Whether this chunk contains any non-air voxels.
    pub fn has_non_air(&self) -> bool {
        self.voxels.iter().any(|v| !v.voxel_type().is_air())
    }

    /// Number of voxels of the given type.
    pub fn count(&self, voxel_type: VoxelType) -> usize {
        self.voxels
            .iter()
            .filter(|v| v.voxel_type() == voxel_type)
            .count()
    }
}
