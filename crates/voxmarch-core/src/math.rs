use glam::{IVec3, UVec3};

use crate::error::{Result, VoxmarchError};
use crate::types::{ChunkCoord, WorldCoord};

/// Reject extents with a zero component or a volume that does not fit in memory.
pub fn validate_extent(what: &str, extent: UVec3) -> Result<()> {
    if extent.x == 0 || extent.y == 0 || extent.z == 0 {
        return Err(VoxmarchError::InvalidArgument(format!(
            "{what} must be positive on every axis, got {extent}"
        )));
    }
    let volume = (extent.x as u64)
        .checked_mul(extent.y as u64)
        .and_then(|v| v.checked_mul(extent.z as u64));
    match volume {
        Some(v) if usize::try_from(v).is_ok() && i32::try_from(extent.max_element()).is_ok() => {
            Ok(())
        }
        _ => Err(VoxmarchError::InvalidArgument(format!(
            "{what} {extent} is too large to address"
        ))),
    }
}

/// Number of cells in an extent. Callers validate the extent first.
pub fn volume(extent: UVec3) -> usize {
    extent.x as usize * extent.y as usize * extent.z as usize
}

/// Whether `coord` lies inside `[0, extent)` on every axis.
pub fn contains(extent: UVec3, coord: IVec3) -> bool {
    coord.cmpge(IVec3::ZERO).all() && coord.as_uvec3().cmplt(extent).all()
}

/// Arena index of an in-bounds cell: x varies fastest, then y, then z.
pub fn flatten(local: UVec3, extent: UVec3) -> usize {
    local.x as usize
        + local.y as usize * extent.x as usize
        + local.z as usize * extent.x as usize * extent.y as usize
}

/// Bounds-checked [`flatten`] for signed coordinates.
pub fn checked_flatten(coord: IVec3, extent: UVec3) -> Result<usize> {
    if !contains(extent, coord) {
        return Err(VoxmarchError::OutOfRange { coord, extent });
    }
    Ok(flatten(coord.as_uvec3(), extent))
}

/// Inverse of [`flatten`].
pub fn unflatten(index: usize, extent: UVec3) -> UVec3 {
    let sx = extent.x as usize;
    let sxy = sx * extent.y as usize;
    UVec3::new(
        (index % sx) as u32,
        ((index % sxy) / sx) as u32,
        (index / sxy) as u32,
    )
}

/// Chunk containing a world-space voxel coordinate (floor division, so
/// negative coordinates map to negative chunks).
pub fn world_to_chunk(world: WorldCoord, chunk_size: UVec3) -> ChunkCoord {
    let cs = chunk_size.as_ivec3();
    IVec3::new(
        world.x.div_euclid(cs.x),
        world.y.div_euclid(cs.y),
        world.z.div_euclid(cs.z),
    )
}

/// Offset of a world-space voxel inside its chunk, always in `[0, chunk_size)`.
pub fn world_to_local(world: WorldCoord, chunk_size: UVec3) -> UVec3 {
    let cs = chunk_size.as_ivec3();
    IVec3::new(
        world.x.rem_euclid(cs.x),
        world.y.rem_euclid(cs.y),
        world.z.rem_euclid(cs.z),
    )
    .as_uvec3()
}

/// World-space origin of a chunk: `chunk * chunk_size`.
pub fn chunk_origin(chunk: ChunkCoord, chunk_size: UVec3) -> WorldCoord {
    chunk * chunk_size.as_ivec3()
}

/// Convert chunk + local coordinates back to a world coordinate.
pub fn chunk_local_to_world(chunk: ChunkCoord, local: UVec3, chunk_size: UVec3) -> WorldCoord {
    chunk_origin(chunk, chunk_size) + local.as_ivec3()
}
