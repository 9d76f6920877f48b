use glam::{IVec3, UVec3};
use voxmarch_core::math::{
    chunk_origin, contains, flatten, validate_extent, volume, world_to_chunk, world_to_local,
};
use voxmarch_core::types::{Voxel, VoxelType, WorldCoord};
use voxmarch_core::{Result, VoxmarchError};

use crate::chunk::Chunk;
use crate::terrain::{chunk_rng, ChunkGenerator};

/// Dense 3D grid of generated chunks.
///
/// The chunk at grid index `(i, j, k)` is anchored at
/// `(i * chunk_size.x, j * chunk_size.y, k * chunk_size.z)`.
#[derive(Debug, Clone)]
pub struct WorldGrid {
    max_chunks: UVec3,
    chunk_size: UVec3,
    /// Chunk arena, x varying fastest.
    chunks: Vec<Chunk>,
}

impl WorldGrid {
    /// Generate every chunk of a `max_chunks` grid with the default generator.
    pub fn build(max_chunks: UVec3, chunk_size: UVec3, seed: u64) -> Result<Self> {
        let generator = ChunkGenerator::new(chunk_size)?;
        Self::build_with(&generator, max_chunks, seed)
    }

    /// Generate every chunk of a `max_chunks` grid with `generator`.
    ///
    /// Each chunk draws from its own stream derived from `seed` and its grid
    /// index, so the result does not depend on generation order.
    pub fn build_with(generator: &ChunkGenerator, max_chunks: UVec3, seed: u64) -> Result<Self> {
        let chunk_size = generator.chunk_size();
        validate_extent("max chunks", max_chunks)?;
        total_extent(max_chunks, chunk_size)?;

        let chunks = generate_chunks(generator, max_chunks, seed);

        log::info!(
            "Generated world grid: {} chunks ({} x {} x {}), chunk size {}, seed {}",
            chunks.len(),
            max_chunks.x,
            max_chunks.y,
            max_chunks.z,
            chunk_size,
            seed
        );

        Ok(Self {
            max_chunks,
            chunk_size,
            chunks,
        })
    }

    pub fn max_chunks(&self) -> UVec3 {
        self.max_chunks
    }

    pub fn chunk_size(&self) -> UVec3 {
        self.chunk_size
    }

    /// Total voxel extent: `max_chunks * chunk_size` componentwise.
    pub fn extent(&self) -> UVec3 {
        self.max_chunks * self.chunk_size
    }

    /// Number of voxels in the whole world.
    pub fn voxel_count(&self) -> usize {
        volume(self.extent())
    }

    /// Chunk at an in-bounds grid index.
    pub(crate) fn chunk(&self, index: UVec3) -> &Chunk {
        &self.chunks[flatten(index, self.max_chunks)]
    }

    /// Chunk at a signed grid index, or `None` outside the grid.
    pub fn get_chunk(&self, index: IVec3) -> Option<&Chunk> {
        contains(self.max_chunks, index).then(|| self.chunk(index.as_uvec3()))
    }

    /// Voxel at a global coordinate.
    pub fn lookup_voxel(&self, global: WorldCoord) -> Result<&Voxel> {
        let extent = self.extent();
        if !contains(extent, global) {
            return Err(VoxmarchError::OutOfRange {
                coord: global,
                extent,
            });
        }
        let chunk = self.chunk(world_to_chunk(global, self.chunk_size).as_uvec3());
        Ok(chunk.voxel(world_to_local(global, self.chunk_size)))
    }

    /// Iterate chunks in arena order.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter()
    }

    /// Count of voxels per type, indexed by ordinal.
    pub fn type_histogram(&self) -> [usize; VoxelType::ALL.len()] {
        let mut counts = [0usize; VoxelType::ALL.len()];
        for voxel in self.chunks.iter().flat_map(|c| c.voxels()) {
            counts[voxel.voxel_type().ordinal() as usize] += 1;
        }
        counts
    }
}

/// Validate and compute `max_chunks * chunk_size` without overflowing.
pub fn total_extent(max_chunks: UVec3, chunk_size: UVec3) -> Result<UVec3> {
    let mul = |a: u32, b: u32| a.checked_mul(b);
    let extent = match (
        mul(max_chunks.x, chunk_size.x),
        mul(max_chunks.y, chunk_size.y),
        mul(max_chunks.z, chunk_size.z),
    ) {
        (Some(x), Some(y), Some(z)) => UVec3::new(x, y, z),
        _ => {
            return Err(VoxmarchError::InvalidArgument(format!(
                "world extent {max_chunks} x {chunk_size} overflows"
            )))
        }
    };
    validate_extent("world extent", extent)?;
    Ok(extent)
}

#[cfg(not(feature = "parallel"))]
fn generate_chunks(generator: &ChunkGenerator, max_chunks: UVec3, seed: u64) -> Vec<Chunk> {
    generate_chunks_sequential(generator, max_chunks, seed)
}

#[cfg(any(not(feature = "parallel"), test))]
fn generate_chunks_sequential(
    generator: &ChunkGenerator,
    max_chunks: UVec3,
    seed: u64,
) -> Vec<Chunk> {
    let chunk_size = generator.chunk_size();
    let mut slots: Vec<Option<Chunk>> = vec![None; volume(max_chunks)];

    for x in 0..max_chunks.x {
        for y in 0..max_chunks.y {
            for z in 0..max_chunks.z {
                let index = UVec3::new(x, y, z);
                let slot = flatten(index, max_chunks);
                let origin = chunk_origin(index.as_ivec3(), chunk_size);
                let mut rng = chunk_rng(seed, slot as u64);
                log::trace!("Generating chunk {index} at {origin}");
                slots[slot] = Some(generator.generate(origin, &mut rng));
            }
        }
    }

    slots.into_iter().flatten().collect()
}

#[cfg(feature = "parallel")]
fn generate_chunks(generator: &ChunkGenerator, max_chunks: UVec3, seed: u64) -> Vec<Chunk> {
    use rayon::prelude::*;
    use voxmarch_core::math::unflatten;

    let chunk_size = generator.chunk_size();
    (0..volume(max_chunks))
        .into_par_iter()
        .map(|slot| {
            let index = unflatten(slot, max_chunks);
            let origin = chunk_origin(index.as_ivec3(), chunk_size);
            let mut rng = chunk_rng(seed, slot as u64);
            generator.generate(origin, &mut rng)
        })
        .collect()
}

/// Owner of the world grid across its lifecycle: empty until built,
/// torn down explicitly by the orchestrator.
#[derive(Debug, Default)]
pub struct ChunkStore {
    grid: Option<WorldGrid>,
}

impl ChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate (or regenerate) the whole grid, discarding any previous one.
    pub fn build(&mut self, max_chunks: UVec3, chunk_size: UVec3, seed: u64) -> Result<&WorldGrid> {
        let generator = ChunkGenerator::new(chunk_size)?;
        self.build_with(&generator, max_chunks, seed)
    }

    pub fn build_with(
        &mut self,
        generator: &ChunkGenerator,
        max_chunks: UVec3,
        seed: u64,
    ) -> Result<&WorldGrid> {
        let grid = WorldGrid::build_with(generator, max_chunks, seed)?;
        let grid = self.grid.insert(grid);
        Ok(&*grid)
    }

    pub fn is_initialized(&self) -> bool {
        self.grid.is_some()
    }

    pub fn grid(&self) -> Result<&WorldGrid> {
        self.grid
            .as_ref()
            .ok_or(VoxmarchError::NotInitialized("world grid"))
    }

    /// Voxel at a global coordinate. Fails with `NotInitialized` before
    /// `build` or after `teardown`, and with `OutOfRange` outside the world.
    pub fn lookup_voxel(&self, global: WorldCoord) -> Result<Voxel> {
        self.grid()?.lookup_voxel(global).copied()
    }

    /// Release all chunk storage.
    pub fn teardown(&mut self) {
        if let Some(grid) = self.grid.take() {
            log::info!("Released world grid ({} chunks)", grid.chunks.len());
        }
    }
}
