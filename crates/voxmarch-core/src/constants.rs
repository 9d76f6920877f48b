//! Single source of truth for shared constants.
//! Values that the ray march kernel also needs are injected into the WGSL
//! preamble by the renderer.

/// Numeric distance between consecutive `VoxelType` codes in the world texture.
pub const VOXEL_CODE_STRIDE: u16 = 1000;

/// Default chunk extent in voxels along each axis.
pub const DEFAULT_CHUNK_SIZE: u32 = 16;

/// Default world extent in chunks along each axis.
pub const DEFAULT_MAX_CHUNKS: u32 = 4;

/// Probability that the generator places dirt in a voxel (everything else is air).
pub const DIRT_PROBABILITY: f32 = 0.05;

/// Compute kernel workgroup edge (16x16 threads per group).
pub const THREAD_GROUP_SIZE: u32 = 16;

/// Floats per sphere in the kernel's `sphereBuffer`:
/// albedo(3) + specular(3) + smoothness(1) + emission(3) + radius(1) + position(3).
pub const SPHERE_FLOATS: usize = 14;

/// Default number of cells produced by the DDA traversal.
pub const DEFAULT_DDA_STEPS: usize = 100;

/// Specular reflectance of non-metal spheres (4% grey).
pub const DIELECTRIC_SPECULAR: f32 = 0.04;

/// Probability that a placed sphere is metallic.
pub const METAL_PROBABILITY: f32 = 0.5;

/// Probability that a small enough sphere is emissive.
pub const EMISSIVE_PROBABILITY: f32 = 0.4;

/// Spheres are only allowed to emit when `radius < max_radius * EMISSIVE_RADIUS_FRACTION`.
pub const EMISSIVE_RADIUS_FRACTION: f32 = 0.75;

/// Emission boost factor range `[MIN, MIN + SPAN)`.
pub const EMISSION_BOOST_MIN: f32 = 1.0;
pub const EMISSION_BOOST_SPAN: f32 = 10.0;
