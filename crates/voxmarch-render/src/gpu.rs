use voxmarch_core::{Result, VoxmarchError};
use wgpu::{
    Device, DeviceDescriptor, Instance, InstanceDescriptor, PowerPreference, Queue,
    RequestAdapterOptions,
};

/// Device and queue used by the ray marcher.
pub struct GpuContext {
    pub device: Device,
    pub queue: Queue,
    pub adapter_name: String,
    pub backend: String,
}

impl GpuContext {
    /// Wrap an existing device, e.g. one that also drives a window surface.
    pub fn from_parts(device: Device, queue: Queue) -> Self {
        Self {
            device,
            queue,
            adapter_name: String::from("external"),
            backend: String::from("external"),
        }
    }

    /// Initialize wgpu without a surface. Blocks on the async adapter and
    /// device requests.
    pub fn headless() -> Result<Self> {
        pollster::block_on(init_headless())
    }
}

async fn init_headless() -> Result<GpuContext> {
    let instance = Instance::new(&InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        ..Default::default()
    });

    let adapter = instance
        .request_adapter(&RequestAdapterOptions {
            power_preference: PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .ok_or_else(|| VoxmarchError::ResourceUnavailable("no suitable GPU adapter".into()))?;

    let adapter_info = adapter.get_info();
    let adapter_name = adapter_info.name.clone();
    let backend = format!("{:?}", adapter_info.backend);
    log::info!("Adapter: {} ({})", adapter_name, backend);

    let (device, queue) = adapter
        .request_device(
            &DeviceDescriptor {
                label: Some("voxmarch-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        )
        .await
        .map_err(|e| VoxmarchError::ResourceUnavailable(format!("device request failed: {e}")))?;

    Ok(GpuContext {
        device,
        queue,
        adapter_name,
        backend,
    })
}
