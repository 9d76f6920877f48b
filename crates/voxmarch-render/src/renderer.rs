use std::path::PathBuf;

use bytemuck::Zeroable;
use glam::{UVec2, Vec4};
use voxmarch_core::constants::{SPHERE_FLOATS, THREAD_GROUP_SIZE, VOXEL_CODE_STRIDE};
use voxmarch_core::{Result, VoxmarchError};
use voxmarch_world::texture::VoxelTextureBuffer;
use wgpu::util::DeviceExt;

use crate::accumulation::{AccumulationRenderer, RenderSettings, SampleBackend, SampleParams};
use crate::gpu::GpuContext;
use crate::lighting::LightConfig;
use crate::scene::Sphere;
use crate::sky::SkyImage;
use crate::voxel_texture::WorldTexture;

const RAY_MARCH_WGSL: &str = include_str!("../../../shaders/render/ray_march.wgsl");
const BLEND_WGSL: &str = include_str!("../../../shaders/render/blend.wgsl");
const PRESENT_WGSL: &str = include_str!("../../../shaders/render/present.wgsl");

/// Format of the presented image.
pub const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
const CONVERGED_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;
const SMOOTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const SKY_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// GPU-uploadable kernel parameters. Must match KernelUniforms in ray_march.wgsl.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct KernelUniforms {
    pub camera_to_world: [[f32; 4]; 4],
    pub camera_inverse_projection: [[f32; 4]; 4],
    pub directional_light: [f32; 4],
    pub pixel_offset: [f32; 2],
    pub seed: f32,
    pub march_distance: f32,
    pub max_march_distance: f32,
    pub sphere_count: u32,
    pub _padding: [u32; 2],
}

impl KernelUniforms {
    pub fn new(
        params: &SampleParams,
        directional_light: Vec4,
        settings: &RenderSettings,
        sphere_count: u32,
    ) -> Self {
        Self {
            camera_to_world: params.pose.camera_to_world.to_cols_array_2d(),
            camera_inverse_projection: params.pose.inverse_projection.to_cols_array_2d(),
            directional_light: directional_light.to_array(),
            pixel_offset: params.pixel_offset.to_array(),
            seed: params.seed,
            march_distance: settings.march_distance,
            max_march_distance: settings.max_march_distance,
            sphere_count,
            _padding: [0; 2],
        }
    }
}

/// Where the ray march kernel comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum KernelSource {
    #[default]
    BuiltIn,
    File(PathBuf),
}

impl KernelSource {
    pub fn from_path(path: Option<PathBuf>) -> Self {
        path.map_or(KernelSource::BuiltIn, KernelSource::File)
    }

    /// Kernel WGSL without the constants preamble.
    pub fn load(&self) -> Result<String> {
        match self {
            KernelSource::BuiltIn => Ok(RAY_MARCH_WGSL.to_string()),
            KernelSource::File(path) => std::fs::read_to_string(path).map_err(|e| {
                VoxmarchError::ResourceUnavailable(format!(
                    "ray march kernel {}: {e}",
                    path.display()
                ))
            }),
        }
    }
}

/// Prefix a kernel body with the constants it shares with the host.
pub fn compose_kernel(body: &str) -> String {
    let preamble = format!(
        "const VOXEL_CODE_STRIDE: u32 = {}u;\nconst THREAD_GROUP_SIZE: u32 = {}u;\nconst SPHERE_FLOATS: u32 = {}u;\n",
        VOXEL_CODE_STRIDE, THREAD_GROUP_SIZE, SPHERE_FLOATS,
    );
    format!("{preamble}\n{body}")
}

/// Everything the kernel reads besides the camera.
pub struct SceneInputs<'a> {
    pub world: &'a VoxelTextureBuffer,
    pub spheres: &'a [Sphere],
    pub light: LightConfig,
    /// Equirectangular sky; a gradient is generated when `None`.
    pub sky: Option<&'a SkyImage>,
}

/// Size-dependent textures, recreated on resize.
struct Targets {
    resolution: UVec2,
    target: wgpu::Texture,
    target_storage_view: wgpu::TextureView,
    converged: wgpu::Texture,
    converged_view: wgpu::TextureView,
    output: wgpu::Texture,
    output_view: wgpu::TextureView,
    blend_bind_group: wgpu::BindGroup,
    present_bind_group: wgpu::BindGroup,
}

impl Targets {
    fn destroy(&self) {
        self.target.destroy();
        self.converged.destroy();
        self.output.destroy();
    }
}

/// wgpu implementation of [`SampleBackend`]: ray march compute pass, blend
/// into the converged image, present into an output texture.
pub struct GpuRayMarcher {
    context: GpuContext,
    // Compute ray march
    kernel_pipeline: wgpu::ComputePipeline,
    scene_bgl: wgpu::BindGroupLayout,
    target_bgl: wgpu::BindGroupLayout,
    scene_bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
    // Scene
    sphere_buffer: wgpu::Buffer,
    sphere_count: u32,
    world_texture: WorldTexture,
    skybox_texture: wgpu::Texture,
    skybox_view: wgpu::TextureView,
    skybox_sampler: wgpu::Sampler,
    // Blend + present
    blend_pipeline: wgpu::RenderPipeline,
    blend_bgl: wgpu::BindGroupLayout,
    present_pipeline: wgpu::RenderPipeline,
    present_bgl: wgpu::BindGroupLayout,
    targets: Option<Targets>,
    directional_light: Vec4,
    settings: RenderSettings,
}

impl GpuRayMarcher {
    /// Build pipelines and upload the scene. Any shader or pipeline
    /// validation failure is `ResourceUnavailable`.
    pub fn new(
        context: GpuContext,
        kernel: &KernelSource,
        settings: &RenderSettings,
        scene: SceneInputs<'_>,
    ) -> Result<Self> {
        settings.validate()?;
        let directional_light = scene.light.to_vec4()?;
        let kernel_source = compose_kernel(&kernel.load()?);
        let device = &context.device;

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let kernel_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("ray-march-shader"),
            source: wgpu::ShaderSource::Wgsl(kernel_source.into()),
        });
        let blend_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("blend-shader"),
            source: wgpu::ShaderSource::Wgsl(BLEND_WGSL.into()),
        });
        let present_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("present-shader"),
            source: wgpu::ShaderSource::Wgsl(PRESENT_WGSL.into()),
        });

        let scene_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("scene-bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Uint,
                        view_dimension: wgpu::TextureViewDimension::D3,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let target_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("target-bgl"),
            entries: &[
                storage_texture_entry(0, TARGET_FORMAT),
                storage_texture_entry(1, DEPTH_FORMAT),
                storage_texture_entry(2, SMOOTH_FORMAT),
            ],
        });

        let kernel_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("ray-march-pipeline-layout"),
            bind_group_layouts: &[&scene_bgl, &target_bgl],
            push_constant_ranges: &[],
        });
        let kernel_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("ray-march-pipeline"),
            layout: Some(&kernel_layout),
            module: &kernel_module,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let blend_bgl = single_texture_bgl(device, "blend-bgl");
        let present_bgl = single_texture_bgl(device, "present-bgl");

        // Running average: converged = sample * w + converged * (1 - w).
        let running_average = wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::Constant,
            dst_factor: wgpu::BlendFactor::OneMinusConstant,
            operation: wgpu::BlendOperation::Add,
        };
        let blend_pipeline = fullscreen_pipeline(
            device,
            "blend-pipeline",
            &blend_module,
            &blend_bgl,
            CONVERGED_FORMAT,
            Some(wgpu::BlendState {
                color: running_average,
                alpha: running_average,
            }),
        );
        let present_pipeline = fullscreen_pipeline(
            device,
            "present-pipeline",
            &present_module,
            &present_bgl,
            OUTPUT_FORMAT,
            None,
        );

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(VoxmarchError::ResourceUnavailable(format!(
                "ray march pipelines failed validation: {err}"
            )));
        }

        // -- Scene resources --
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("kernel-uniforms"),
            size: std::mem::size_of::<KernelUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // Storage bindings cannot be empty; keep one zeroed sphere when there are none.
        let sphere_data: Vec<Sphere> = if scene.spheres.is_empty() {
            vec![Sphere::zeroed()]
        } else {
            scene.spheres.to_vec()
        };
        let sphere_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("sphere-buffer"),
            contents: bytemuck::cast_slice(&sphere_data),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let sphere_count = scene.spheres.len() as u32;

        let world_texture = WorldTexture::upload(device, &context.queue, scene.world)?;

        let generated_sky;
        let sky = match scene.sky {
            Some(sky) => sky,
            None => {
                generated_sky = SkyImage::default();
                &generated_sky
            }
        };
        let skybox_texture = upload_skybox(device, &context.queue, sky)?;
        let skybox_view = skybox_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let skybox_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("skybox-sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let scene_bind_group = create_scene_bind_group(
            device,
            &scene_bgl,
            &uniform_buffer,
            &sphere_buffer,
            &world_texture,
            &skybox_view,
            &skybox_sampler,
        );

        log::info!(
            "Ray marcher initialized: {} spheres, kernel {:?}",
            sphere_count,
            kernel
        );

        Ok(Self {
            context,
            kernel_pipeline,
            scene_bgl,
            target_bgl,
            scene_bind_group,
            uniform_buffer,
            sphere_buffer,
            sphere_count,
            world_texture,
            skybox_texture,
            skybox_view,
            skybox_sampler,
            blend_pipeline,
            blend_bgl,
            present_pipeline,
            present_bgl,
            targets: None,
            directional_light,
            settings: settings.clone(),
        })
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    pub fn sphere_count(&self) -> u32 {
        self.sphere_count
    }

    pub fn world_size(&self) -> wgpu::Extent3d {
        self.world_texture.size()
    }

    /// The presented image, once targets exist.
    pub fn output_texture(&self) -> Option<&wgpu::Texture> {
        self.targets.as_ref().map(|t| &t.output)
    }

    /// Block until submitted GPU work finishes.
    pub fn wait_idle(&self) {
        self.context.device.poll(wgpu::Maintain::Wait);
    }

    /// Replace the world texture with a freshly built buffer.
    pub fn reload_world_texture(&mut self, buffer: &VoxelTextureBuffer) -> Result<()> {
        let device = &self.context.device;
        let world_texture = WorldTexture::upload(device, &self.context.queue, buffer)?;
        self.scene_bind_group = create_scene_bind_group(
            device,
            &self.scene_bgl,
            &self.uniform_buffer,
            &self.sphere_buffer,
            &world_texture,
            &self.skybox_view,
            &self.skybox_sampler,
        );
        let old = std::mem::replace(&mut self.world_texture, world_texture);
        old.destroy();
        Ok(())
    }

    fn create_targets(&self, resolution: UVec2) -> Targets {
        let device = &self.context.device;
        let target = create_texture_2d(
            device,
            "target-texture",
            resolution,
            TARGET_FORMAT,
            wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
        );
        let converged = create_texture_2d(
            device,
            "converged-texture",
            resolution,
            CONVERGED_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        );
        let output = create_texture_2d(
            device,
            "output-texture",
            resolution,
            OUTPUT_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
        );

        let target_storage_view = target.create_view(&wgpu::TextureViewDescriptor::default());
        let target_sample_view = target.create_view(&wgpu::TextureViewDescriptor::default());
        let converged_view = converged.create_view(&wgpu::TextureViewDescriptor::default());
        let output_view = output.create_view(&wgpu::TextureViewDescriptor::default());

        let blend_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("blend-bg"),
            layout: &self.blend_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&target_sample_view),
            }],
        });
        let present_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("present-bg"),
            layout: &self.present_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&converged_view),
            }],
        });

        Targets {
            resolution,
            target,
            target_storage_view,
            converged,
            converged_view,
            output,
            output_view,
            blend_bind_group,
            present_bind_group,
        }
    }
}

impl SampleBackend for GpuRayMarcher {
    fn resize(&mut self, resolution: UVec2) -> Result<()> {
        let max_dim = self.context.device.limits().max_texture_dimension_2d;
        if resolution.max_element() > max_dim {
            return Err(VoxmarchError::ResourceUnavailable(format!(
                "render resolution {resolution} exceeds the device's 2D limit of {max_dim}"
            )));
        }
        let targets = self.create_targets(resolution);
        if let Some(old) = self.targets.replace(targets) {
            old.destroy();
        }
        log::debug!("Render targets resized to {resolution}");
        Ok(())
    }

    fn dispatch_and_blend(&mut self, params: &SampleParams) -> Result<()> {
        let targets = self
            .targets
            .as_ref()
            .ok_or(VoxmarchError::NotInitialized("render targets"))?;
        if params.resolution != targets.resolution {
            return Err(VoxmarchError::InvalidArgument(format!(
                "sample at {} but targets are {}",
                params.resolution, targets.resolution
            )));
        }
        let device = &self.context.device;
        let queue = &self.context.queue;

        let uniforms = KernelUniforms::new(
            params,
            self.directional_light,
            &self.settings,
            self.sphere_count,
        );
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        // Scratch buffers live for this dispatch only.
        let depth = create_texture_2d(
            device,
            "depth-scratch",
            params.resolution,
            DEPTH_FORMAT,
            wgpu::TextureUsages::STORAGE_BINDING,
        );
        let smooth = create_texture_2d(
            device,
            "smooth-scratch",
            params.resolution,
            SMOOTH_FORMAT,
            wgpu::TextureUsages::STORAGE_BINDING,
        );
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());
        let smooth_view = smooth.create_view(&wgpu::TextureViewDescriptor::default());

        let target_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("target-bg"),
            layout: &self.target_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&targets.target_storage_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&depth_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&smooth_view),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("sample-encoder"),
        });

        // 1. Compute pass: ray march into the target
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("ray-march-pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.kernel_pipeline);
            pass.set_bind_group(0, &self.scene_bind_group, &[]);
            pass.set_bind_group(1, &target_bind_group, &[]);
            pass.dispatch_workgroups(params.thread_groups.x, params.thread_groups.y, 1);
        }

        // 2. Blend pass: fold the target into the converged image
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("blend-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &targets.converged_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            let w = params.blend_weight as f64;
            pass.set_pipeline(&self.blend_pipeline);
            pass.set_bind_group(0, &targets.blend_bind_group, &[]);
            pass.set_blend_constant(wgpu::Color {
                r: w,
                g: w,
                b: w,
                a: w,
            });
            pass.draw(0..3, 0..1);
        }

        queue.submit(std::iter::once(encoder.finish()));
        depth.destroy();
        smooth.destroy();
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        let targets = self
            .targets
            .as_ref()
            .ok_or(VoxmarchError::NotInitialized("render targets"))?;
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("present-encoder"),
                });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("present-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &targets.output_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.present_pipeline);
            pass.set_bind_group(0, &targets.present_bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        self.context.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn release(&mut self) {
        if let Some(targets) = self.targets.take() {
            targets.destroy();
            log::debug!("Released render targets");
        }
    }
}

impl AccumulationRenderer<GpuRayMarcher> {
    /// Swap in a rebuilt world texture and restart accumulation.
    pub fn reload_world_texture(&mut self, buffer: &VoxelTextureBuffer) -> Result<()> {
        self.backend_mut().reload_world_texture(buffer)?;
        self.reset()
    }
}

impl Drop for GpuRayMarcher {
    fn drop(&mut self) {
        self.release();
        self.world_texture.destroy();
        self.skybox_texture.destroy();
    }
}

// -- Private helpers --

fn storage_texture_entry(binding: u32, format: wgpu::TextureFormat) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format,
            view_dimension: wgpu::TextureViewDimension::D2,
        },
        count: None,
    }
}

fn single_texture_bgl(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        }],
    })
}

fn fullscreen_pipeline(
    device: &wgpu::Device,
    label: &str,
    module: &wgpu::ShaderModule,
    bgl: &wgpu::BindGroupLayout,
    format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[bgl],
        push_constant_ranges: &[],
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: Default::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        multiview: None,
        cache: None,
    })
}

fn create_texture_2d(
    device: &wgpu::Device,
    label: &str,
    resolution: UVec2,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: resolution.x,
            height: resolution.y,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    })
}

fn upload_skybox(device: &wgpu::Device, queue: &wgpu::Queue, sky: &SkyImage) -> Result<wgpu::Texture> {
    let expected = sky.width as usize * sky.height as usize * 4;
    if sky.width == 0 || sky.height == 0 || sky.pixels.len() != expected {
        return Err(VoxmarchError::InvalidArgument(format!(
            "skybox {}x{} needs {} bytes, got {}",
            sky.width,
            sky.height,
            expected,
            sky.pixels.len()
        )));
    }
    let size = wgpu::Extent3d {
        width: sky.width,
        height: sky.height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("skybox-texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: SKY_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &sky.pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * sky.width),
            rows_per_image: Some(sky.height),
        },
        size,
    );
    Ok(texture)
}

fn create_scene_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    uniform_buffer: &wgpu::Buffer,
    sphere_buffer: &wgpu::Buffer,
    world_texture: &WorldTexture,
    skybox_view: &wgpu::TextureView,
    skybox_sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("scene-bg"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: sphere_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(world_texture.view()),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(skybox_view),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: wgpu::BindingResource::Sampler(skybox_sampler),
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraPose;
    use glam::{Mat4, Vec2, Vec3};

    #[test]
    fn test_kernel_uniforms_size() {
        // 2 mat4 + vec4 + vec2 + 4 scalars + 2 padding words.
        assert_eq!(std::mem::size_of::<KernelUniforms>(), 176);
        assert_eq!(std::mem::size_of::<KernelUniforms>() % 16, 0);
    }

    #[test]
    fn test_kernel_uniforms_from_params() {
        let pose = CameraPose::new(
            Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)),
            Mat4::IDENTITY,
        );
        let params = SampleParams {
            pose,
            resolution: UVec2::new(64, 32),
            thread_groups: UVec2::new(4, 2),
            pixel_offset: Vec2::new(0.25, 0.75),
            seed: 0.5,
            sample_index: 3,
            blend_weight: 0.25,
        };
        let settings = RenderSettings::default();
        let u = KernelUniforms::new(&params, Vec4::new(0.0, -1.0, 0.0, 2.0), &settings, 7);
        assert_eq!(u.camera_to_world[3], [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(u.directional_light, [0.0, -1.0, 0.0, 2.0]);
        assert_eq!(u.pixel_offset, [0.25, 0.75]);
        assert_eq!(u.seed, 0.5);
        assert_eq!(u.march_distance, settings.march_distance);
        assert_eq!(u.sphere_count, 7);
    }

    #[test]
    fn test_builtin_kernel_names_parameters() {
        let source = compose_kernel(&KernelSource::BuiltIn.load().unwrap());
        for name in [
            "_CameraToWorld",
            "_CameraInverseProjection",
            "_SkyboxTexture",
            "marchDistance",
            "maxMarchDistance",
            "sphereBuffer",
            "worldTexture",
            "directionalLight",
            "pixelOffset",
            "seed",
            "Result",
            "depthBuffer",
            "smoothBuffer",
        ] {
            assert!(source.contains(name), "kernel is missing {name}");
        }
        assert!(source.starts_with("const VOXEL_CODE_STRIDE: u32 = 1000u;"));
        assert!(source.contains("const THREAD_GROUP_SIZE: u32 = 16u;"));
        assert!(source.contains("const SPHERE_FLOATS: u32 = 14u;"));
    }

    #[test]
    fn test_missing_kernel_file_is_unavailable() {
        let source = KernelSource::from_path(Some(PathBuf::from("/nonexistent/kernel.wgsl")));
        assert!(matches!(
            source.load(),
            Err(VoxmarchError::ResourceUnavailable(_))
        ));
        assert_eq!(KernelSource::from_path(None), KernelSource::BuiltIn);
    }
}
