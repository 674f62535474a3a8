//! Earth maps on the GPU. Until a map is ready its slot binds a 2×2 placeholder.

use super::{context::GpuContext, resource::RenderResource};
use globe_core::{PixelFormat, TextureAsset, TextureKind, TextureSet};

/// Slot order in the bind group: 0 diffuse, 1 normal, 2 specular, 3 night, 4 sampler.
pub const SLOTS: [TextureKind; 4] = [
    TextureKind::Diffuse,
    TextureKind::Normal,
    TextureKind::Specular,
    TextureKind::Night,
];

/// Two-tone blue checker bound while the diffuse map is missing.
#[rustfmt::skip]
pub const FALLBACK_DIFFUSE: [u8; 16] = [
    0, 0, 200, 255,   0, 100, 200, 255,
    0, 100, 200, 255, 0, 0, 200, 255,
];

pub fn placeholder(kind: TextureKind) -> TextureAsset {
    match kind {
        TextureKind::Diffuse => TextureAsset {
            width: 2,
            height: 2,
            format: kind.format(),
            data: FALLBACK_DIFFUSE.to_vec(),
        },
        _ => TextureAsset::solid(2, 2, kind.format(), kind.fallback_color()),
    }
}

fn wgpu_format(format: PixelFormat) -> wgpu::TextureFormat {
    match format {
        PixelFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        PixelFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
    }
}

#[derive(Debug)]
pub struct GpuTexture {
    _texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub size: (u32, u32),
}

impl GpuTexture {
    pub fn upload(device: &wgpu::Device, queue: &wgpu::Queue, asset: &TextureAsset, label: &str) -> Self {
        let size = wgpu::Extent3d {
            width: asset.width,
            height: asset.height,
            depth_or_array_layers: 1,
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu_format(asset.format),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &asset.data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(asset.bytes_per_row()),
                rows_per_image: Some(asset.height),
            },
            size,
        );

        Self {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            _texture: texture,
            size: (asset.width, asset.height),
        }
    }

    /// Upload with size and device-error checks.
    pub fn try_upload(gpu: &GpuContext, asset: &TextureAsset, label: &str) -> Result<Self, String> {
        let max = gpu.max_texture_dimension();
        if asset.width == 0 || asset.height == 0 || asset.width > max || asset.height > max {
            return Err(format!(
                "{}x{} exceeds the device limit of {max}",
                asset.width, asset.height
            ));
        }
        if asset.data.len() != (asset.bytes_per_row() * asset.height) as usize {
            return Err(format!("{label}: pixel buffer has {} bytes", asset.data.len()));
        }

        gpu.checked(label, |device| Self::upload(device, &gpu.queue, asset, label))
    }
}

pub fn bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    };

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Earth Textures Layout"),
        entries: &[
            texture_entry(0),
            texture_entry(1),
            texture_entry(2),
            texture_entry(3),
            wgpu::BindGroupLayoutEntry {
                binding: 4,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

/// The four earth maps plus their placeholders and the bind group over whichever is current.
pub struct SceneTextures {
    maps: [RenderResource<GpuTexture>; 4],
    placeholders: [GpuTexture; 4],
    sampler: wgpu::Sampler,
    pub bind_group: wgpu::BindGroup,
}

impl SceneTextures {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, layout: &wgpu::BindGroupLayout) -> Self {
        let placeholders =
            SLOTS.map(|kind| GpuTexture::upload(device, queue, &placeholder(kind), "Placeholder Texture"));

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Earth Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let maps = [
            RenderResource::Pending,
            RenderResource::Pending,
            RenderResource::Pending,
            RenderResource::Pending,
        ];
        let bind_group = Self::bind(device, layout, &maps, &placeholders, &sampler);

        Self { maps, placeholders, sampler, bind_group }
    }

    fn slot(kind: TextureKind) -> usize {
        match kind {
            TextureKind::Diffuse => 0,
            TextureKind::Normal => 1,
            TextureKind::Specular => 2,
            TextureKind::Night => 3,
        }
    }

    pub fn state(&self, kind: TextureKind) -> &RenderResource<GpuTexture> {
        &self.maps[Self::slot(kind)]
    }

    /// Uploads every map of `set`. Maps the synthesizer substituted are marked failed
    /// and keep their placeholder.
    pub fn install_set(&mut self, gpu: &GpuContext, layout: &wgpu::BindGroupLayout, set: &TextureSet) {
        for kind in SLOTS {
            let resource = if set.substituted.contains(&kind) {
                RenderResource::Failed(format!("{kind} map was not synthesized"))
            } else {
                GpuTexture::try_upload(gpu, set.get(kind), &format!("{kind} Map")).into()
            };
            self.maps[Self::slot(kind)] = resource;
        }
        self.rebind(&gpu.device, layout);
    }

    pub fn install(&mut self, gpu: &GpuContext, layout: &wgpu::BindGroupLayout, kind: TextureKind, asset: &TextureAsset) {
        self.maps[Self::slot(kind)] = GpuTexture::try_upload(gpu, asset, &format!("{kind} Map")).into();
        self.rebind(&gpu.device, layout);
    }

    fn rebind(&mut self, device: &wgpu::Device, layout: &wgpu::BindGroupLayout) {
        for kind in SLOTS {
            if let RenderResource::Failed(reason) = self.state(kind) {
                log::warn!("{kind} map unavailable ({reason}); binding placeholder");
            }
        }
        self.bind_group = Self::bind(device, layout, &self.maps, &self.placeholders, &self.sampler);
    }

    fn bind(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        maps: &[RenderResource<GpuTexture>; 4],
        placeholders: &[GpuTexture; 4],
        sampler: &wgpu::Sampler,
    ) -> wgpu::BindGroup {
        let view = move |i: usize| maps[i].ready().map_or(&placeholders[i].view, |t| &t.view);

        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Earth Textures Bind"),
            layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(view(0)) },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(view(1)) },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::TextureView(view(2)) },
                wgpu::BindGroupEntry { binding: 3, resource: wgpu::BindingResource::TextureView(view(3)) },
                wgpu::BindGroupEntry { binding: 4, resource: wgpu::BindingResource::Sampler(sampler) },
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_two_by_two() {
        for kind in SLOTS {
            let p = placeholder(kind);
            assert_eq!((p.width, p.height), (2, 2));
            assert_eq!(p.data.len(), 16);
            assert_eq!(p.format, kind.format());
        }
        assert_eq!(placeholder(TextureKind::Diffuse).pixel(1, 0), [0, 100, 200, 255]);
        assert_eq!(placeholder(TextureKind::Normal).pixel(0, 0), [128, 128, 255, 255]);
    }

    #[test]
    fn slot_order_matches_shader_bindings() {
        assert_eq!(SLOTS.map(SceneTextures::slot), [0, 1, 2, 3]);
    }
}
