use glam::UVec3;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use voxmarch_core::constants::DIRT_PROBABILITY;
use voxmarch_core::math::{flatten, validate_extent, volume};
use voxmarch_core::types::{Voxel, VoxelType, WorldCoord};
use voxmarch_core::{Result, VoxmarchError};

use crate::chunk::Chunk;

/// Random stream used for one chunk's generation.
pub type ChunkRng = Pcg64Mcg;

/// Fills chunks with scattered dirt: each voxel independently becomes dirt
/// with `dirt_probability`, otherwise air.
#[derive(Debug, Clone)]
pub struct ChunkGenerator {
    chunk_size: UVec3,
    dirt_probability: f32,
}

impl ChunkGenerator {
    pub fn new(chunk_size: UVec3) -> Result<Self> {
        Self::with_dirt_probability(chunk_size, DIRT_PROBABILITY)
    }

    pub fn with_dirt_probability(chunk_size: UVec3, dirt_probability: f32) -> Result<Self> {
        validate_extent("chunk size", chunk_size)?;
        if !(0.0..=1.0).contains(&dirt_probability) {
            return Err(VoxmarchError::InvalidArgument(format!(
                "dirt probability must be in [0, 1], got {dirt_probability}"
            )));
        }
        Ok(Self {
            chunk_size,
            dirt_probability,
        })
    }

    pub fn chunk_size(&self) -> UVec3 {
        self.chunk_size
    }

    /// Generate the chunk anchored at `origin`.
    ///
    /// Draws exactly one sample per voxel, visiting x outermost and z
    /// innermost, so the same stream state always produces the same chunk.
    pub fn generate<R: Rng>(&self, origin: WorldCoord, rng: &mut R) -> Chunk {
        let size = self.chunk_size;
        let air_threshold = 1.0 - self.dirt_probability;
        let mut voxels = vec![Voxel::new(VoxelType::Air, origin); volume(size)];

        for x in 0..size.x {
            for y in 0..size.y {
                for z in 0..size.z {
                    let local = UVec3::new(x, y, z);
                    let sample: f32 = rng.random();
                    let voxel_type = if sample < air_threshold {
                        VoxelType::Air
                    } else {
                        VoxelType::Dirt
                    };
                    voxels[flatten(local, size)] =
                        Voxel::new(voxel_type, origin + local.as_ivec3());
                }
            }
        }

        Chunk::from_arena(origin, size, voxels)
    }
}

/// Derive an independent seed for one chunk from the world seed and the
/// chunk's grid index (SplitMix64 finalizer).
pub fn chunk_seed(world_seed: u64, chunk_index: u64) -> u64 {
    let mut z = world_seed
        .wrapping_add(chunk_index.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Stream for the chunk at `chunk_index` of a world seeded with `world_seed`.
pub fn chunk_rng(world_seed: u64, chunk_index: u64) -> ChunkRng {
    ChunkRng::seed_from_u64(chunk_seed(world_seed, chunk_index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::IVec3;

    #[test]
    fn test_generation_deterministic_for_same_stream() {
        let gen = ChunkGenerator::new(UVec3::splat(8)).unwrap();
        let a = gen.generate(IVec3::ZERO, &mut chunk_rng(7, 0));
        let b = gen.generate(IVec3::ZERO, &mut chunk_rng(7, 0));
        assert_eq!(a.voxels(), b.voxels());
    }

    #[test]
    fn test_world_positions_follow_origin() {
        let size = UVec3::new(3, 4, 5);
        let gen = ChunkGenerator::new(size).unwrap();
        let origin = IVec3::new(6, 8, 10);
        let chunk = gen.generate(origin, &mut chunk_rng(1, 0));
        for x in 0..size.x {
            for y in 0..size.y {
                for z in 0..size.z {
                    let local = UVec3::new(x, y, z);
                    assert_eq!(
                        chunk.voxel(local).world_position(),
                        origin + local.as_ivec3()
                    );
                }
            }
        }
    }

    #[test]
    fn test_only_air_and_dirt() {
        let gen = ChunkGenerator::new(UVec3::splat(16)).unwrap();
        let chunk = gen.generate(IVec3::ZERO, &mut chunk_rng(3, 0));
        let air = chunk.count(VoxelType::Air);
        let dirt = chunk.count(VoxelType::Dirt);
        assert_eq!(air + dirt, 16 * 16 * 16);
    }

    #[test]
    fn test_dirt_fraction_near_probability() {
        let gen = ChunkGenerator::new(UVec3::splat(32)).unwrap();
        let chunk = gen.generate(IVec3::ZERO, &mut chunk_rng(42, 0));
        let frac = chunk.count(VoxelType::Dirt) as f32 / (32 * 32 * 32) as f32;
        assert!(frac > 0.04 && frac < 0.06, "dirt fraction {frac}");
    }

    #[test]
    fn test_probability_extremes() {
        let size = UVec3::splat(4);
        let none = ChunkGenerator::with_dirt_probability(size, 0.0).unwrap();
        assert!(!none.generate(IVec3::ZERO, &mut chunk_rng(0, 0)).has_non_air());
        let all = ChunkGenerator::with_dirt_probability(size, 1.0).unwrap();
        assert_eq!(
            all.generate(IVec3::ZERO, &mut chunk_rng(0, 0))
                .count(VoxelType::Dirt),
            64
        );
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(matches!(
            ChunkGenerator::new(UVec3::new(0, 4, 4)),
            Err(VoxmarchError::InvalidArgument(_))
        ));
        assert!(ChunkGenerator::with_dirt_probability(UVec3::ONE, 1.5).is_err());
        assert!(ChunkGenerator::with_dirt_probability(UVec3::ONE, f32::NAN).is_err());
    }

    #[test]
    fn test_chunk_seeds_differ_per_index() {
        let seeds: Vec<u64> = (0..16).map(|i| chunk_seed(99, i)).collect();
        for i in 0..seeds.len() {
            for j in (i + 1)..seeds.len() {
                assert_ne!(seeds[i], seeds[j]);
            }
        }
        assert_ne!(chunk_seed(1, 0), chunk_seed(2, 0));
    }
}
