pub mod chunk;
pub mod chunk_map;
pub mod terrain;
pub mod texture;

use chunk_map::{ChunkStore, WorldGrid};
use glam::{IVec3, UVec3, Vec3};
use serde::{Deserialize, Serialize};
use terrain::ChunkGenerator;
use texture::{TextureLayout, VoxelTextureBuffer};
use voxmarch_core::constants::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_CHUNKS, DIRT_PROBABILITY};
use voxmarch_core::dda;
use voxmarch_core::types::{Voxel, VoxelType, WorldCoord};
use voxmarch_core::Result;

/// Parameters for generating a world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Grid extent in chunks.
    pub max_chunks: UVec3,
    /// Chunk extent in voxels.
    pub chunk_size: UVec3,
    pub seed: u64,
    pub dirt_probability: f32,
    /// Linearization of the flattened texture buffer.
    pub layout: TextureLayout,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            max_chunks: UVec3::splat(DEFAULT_MAX_CHUNKS),
            chunk_size: UVec3::splat(DEFAULT_CHUNK_SIZE),
            seed: 0,
            dirt_probability: DIRT_PROBABILITY,
            layout: TextureLayout::default(),
        }
    }
}

/// Generate a world grid of `max_chunks` chunks of `chunk_size` voxels.
pub fn generate_world(max_chunks: UVec3, chunk_size: UVec3, seed: u64) -> Result<WorldGrid> {
    WorldGrid::build(max_chunks, chunk_size, seed)
}

/// Primary public struct for the voxmarch-world crate.
/// Owns the chunk store and produces the voxel texture on demand.
#[derive(Debug)]
pub struct World {
    config: WorldConfig,
    store: ChunkStore,
}

impl World {
    /// Generate a world from `config`.
    pub fn generate(config: WorldConfig) -> Result<Self> {
        let mut world = Self {
            config,
            store: ChunkStore::new(),
        };
        world.regenerate()?;
        Ok(world)
    }

    /// Discard all chunks and generate them again from the current config.
    pub fn regenerate(&mut self) -> Result<()> {
        let generator = ChunkGenerator::with_dirt_probability(
            self.config.chunk_size,
            self.config.dirt_probability,
        )?;
        self.store
            .build_with(&generator, self.config.max_chunks, self.config.seed)?;
        Ok(())
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn grid(&self) -> Result<&WorldGrid> {
        self.store.grid()
    }

    pub fn lookup_voxel(&self, global: WorldCoord) -> Result<Voxel> {
        self.store.lookup_voxel(global)
    }

    /// Flatten the world into a texture buffer using the configured layout.
    pub fn build_voxel_texture(&self) -> Result<VoxelTextureBuffer> {
        texture::build_flat_buffer(self.grid()?, self.config.layout)
    }

    /// Count of voxels per type, indexed by ordinal.
    pub fn type_histogram(&self) -> Result<[usize; VoxelType::ALL.len()]> {
        Ok(self.grid()?.type_histogram())
    }

    /// Walk a ray through the grid and report the voxel type of every cell it
    /// enters, `None` for cells outside the world.
    pub fn march_hits(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_steps: usize,
    ) -> Result<Vec<(IVec3, Option<VoxelType>)>> {
        let grid = self.grid()?;
        Ok(dda::march(origin, direction, max_steps)?
            .map(|cell| (cell, grid.lookup_voxel(cell).ok().map(|v| v.voxel_type())))
            .collect())
    }

    /// Release all chunk storage. Later lookups fail with `NotInitialized`.
    pub fn teardown(&mut self) {
        self.store.teardown();
    }
}
