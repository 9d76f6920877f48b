//! Flattening of the world grid into one buffer of voxel codes for upload as
//! an R16 3D texture.

use glam::UVec3;
use serde::{Deserialize, Serialize};
use voxmarch_core::math::{volume, world_to_chunk, world_to_local};
use voxmarch_core::{Result, VoxmarchError};

use crate::chunk_map::WorldGrid;

/// Linearization used when writing voxel codes into the flat buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextureLayout {
    /// `x + y*ty + z*tz*ty` for total extent `(tx, ty, tz)`. This is the layout
    /// the ray march kernel was written against; it only matches a
    /// conventional row-major layout when the world is a cube.
    #[default]
    Source,
    /// `x + y*tx + z*tx*ty`.
    RowMajor,
}

impl TextureLayout {
    /// Flat index of a voxel coordinate within `extent`.
    pub fn index(self, coord: UVec3, extent: UVec3) -> usize {
        let (x, y, z) = (coord.x as usize, coord.y as usize, coord.z as usize);
        let (tx, ty, tz) = (extent.x as usize, extent.y as usize, extent.z as usize);
        match self {
            TextureLayout::Source => x + y * ty + z * tz * ty,
            TextureLayout::RowMajor => x + y * tx + z * tx * ty,
        }
    }

    /// Largest index produced for any coordinate inside `extent`.
    pub fn max_index(self, extent: UVec3) -> usize {
        self.index(extent - UVec3::ONE, extent)
    }

    /// Whether every coordinate maps to a distinct index.
    pub fn is_bijective(self, extent: UVec3) -> bool {
        match self {
            TextureLayout::RowMajor => true,
            TextureLayout::Source => extent.x == extent.y && extent.z == extent.x,
        }
    }
}

/// Flat sequence of 16-bit voxel codes sized to the world's total extent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoxelTextureBuffer {
    data: Vec<u16>,
    extent: UVec3,
    layout: TextureLayout,
}

impl VoxelTextureBuffer {
    pub fn data(&self) -> &[u16] {
        &self.data
    }

    /// Raw little-endian texel bytes for upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    /// Texture dimensions (total voxel extent).
    pub fn extent(&self) -> UVec3 {
        self.extent
    }

    pub fn layout(&self) -> TextureLayout {
        self.layout
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Code stored for a voxel coordinate, read back through the layout.
    pub fn code_at(&self, coord: UVec3) -> Option<u16> {
        if !coord.cmplt(self.extent).all() {
            return None;
        }
        self.data.get(self.layout.index(coord, self.extent)).copied()
    }
}

/// Flatten the whole grid into a texture buffer.
///
/// Visits every coordinate with x outermost and z innermost, resolving each to
/// its chunk by floor division and to the local voxel by modulo. This is a
/// full rebuild; calling it twice on the same grid yields identical buffers.
///
/// With [`TextureLayout::Source`] on a non-cubic world some coordinates share
/// an index (the later write wins) and, when `ty > tx`, indices can run past
/// the buffer; the latter is rejected with `InvalidArgument` before writing.
pub fn build_flat_buffer(grid: &WorldGrid, layout: TextureLayout) -> Result<VoxelTextureBuffer> {
    let extent = grid.extent();
    let chunk_size = grid.chunk_size();
    let len = volume(extent);

    let max_index = layout.max_index(extent);
    if max_index >= len {
        return Err(VoxmarchError::InvalidArgument(format!(
            "{layout:?} layout addresses index {max_index} but a {extent} world only has {len} voxels"
        )));
    }

    let bijective = layout.is_bijective(extent);
    let mut written = if bijective {
        Vec::new()
    } else {
        vec![false; len]
    };
    let mut collisions = 0usize;
    let mut data = vec![0u16; len];

    for x in 0..extent.x {
        for y in 0..extent.y {
            for z in 0..extent.z {
                let coord = UVec3::new(x, y, z);
                let global = coord.as_ivec3();
                let chunk = grid.chunk(world_to_chunk(global, chunk_size).as_uvec3());
                let index = layout.index(coord, extent);
                if !bijective {
                    collisions += usize::from(written[index]);
                    written[index] = true;
                }
                data[index] = chunk.code_at(world_to_local(global, chunk_size));
            }
        }
    }

    if collisions > 0 {
        log::warn!(
            "{layout:?} layout on a {extent} world overwrote {collisions} of {len} texels"
        );
    }
    log::info!("Built voxel texture buffer: {extent} ({len} texels, {layout:?} layout)");

    Ok(VoxelTextureBuffer {
        data,
        extent,
        layout,
    })
}
