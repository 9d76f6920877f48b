pub mod accumulation;
pub mod camera;
pub mod gpu;
pub mod lighting;
pub mod renderer;
pub mod scene;
pub mod sky;
pub mod voxel_texture;

pub use accumulation::{
    AccumulationRenderer, AccumulationState, FrameStats, RenderSettings, SampleBackend,
    SampleParams,
};
pub use camera::{CameraPose, OrbitCamera};
pub use gpu::GpuContext;
pub use lighting::LightConfig;
pub use renderer::{GpuRayMarcher, KernelSource, KernelUniforms, SceneInputs};
pub use scene::{place_spheres, SceneConfig, Sphere};
pub use sky::SkyImage;
pub use voxel_texture::WorldTexture;
