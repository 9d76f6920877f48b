use voxmarch_core::{Result, VoxmarchError};
use voxmarch_world::texture::VoxelTextureBuffer;

/// Texel format of `worldTexture`: one 16-bit voxel code per texel.
pub const WORLD_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R16Uint;

const BYTES_PER_TEXEL: u32 = 2;

/// The world as a 3D texture of voxel codes, point-read by the kernel.
pub struct WorldTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: wgpu::Extent3d,
}

impl WorldTexture {
    /// Create the texture and upload `buffer` into it.
    pub fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        buffer: &VoxelTextureBuffer,
    ) -> Result<Self> {
        let extent = buffer.extent();
        let max_dim = device.limits().max_texture_dimension_3d;
        if extent.max_element() > max_dim {
            return Err(VoxmarchError::ResourceUnavailable(format!(
                "world texture {extent} exceeds the device's 3D limit of {max_dim}"
            )));
        }

        let size = wgpu::Extent3d {
            width: extent.x,
            height: extent.y,
            depth_or_array_layers: extent.z,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("world-texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: WORLD_TEXTURE_FORMAT,
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
            buffer.as_bytes(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(BYTES_PER_TEXEL * size.width),
                rows_per_image: Some(size.height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("world-texture-view"),
            dimension: Some(wgpu::TextureViewDimension::D3),
            ..Default::default()
        });

        log::info!(
            "Uploaded world texture {}x{}x{} ({:?} layout, {} bytes)",
            size.width,
            size.height,
            size.depth_or_array_layers,
            buffer.layout(),
            buffer.as_bytes().len()
        );

        Ok(Self {
            texture,
            view,
            size,
        })
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn size(&self) -> wgpu::Extent3d {
        self.size
    }

    pub fn destroy(&self) {
        self.texture.destroy();
    }
}
