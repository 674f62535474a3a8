use super::types::MarkerUniform;
use globe_core::{FeatureKind, InstanceBatch, MarkerShape, MarkerStyle};
use wgpu::util::DeviceExt;

/// One uploaded batch: its transforms, colour and which marker mesh to draw.
#[derive(Debug)]
pub struct InstanceLayer {
    pub kind: FeatureKind,
    pub shape: MarkerShape,
    pub count: u32,
    pub instances: wgpu::Buffer,
    pub style: wgpu::BindGroup,
}

impl InstanceLayer {
    pub fn new(device: &wgpu::Device, style_layout: &wgpu::BindGroupLayout, batch: &InstanceBatch) -> Self {
        let style = MarkerStyle::for_kind(batch.kind);
        let label = format!("{} Instances", batch.kind);

        let instances = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&label),
            contents: bytemuck::cast_slice(&batch.transforms),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let ubo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Marker Style UBO"),
            contents: bytemuck::bytes_of(&MarkerUniform { color: style.color }),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Marker Style Bind"),
            layout: style_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: ubo.as_entire_binding(),
            }],
        });

        Self {
            kind: batch.kind,
            shape: style.shape,
            count: batch.transforms.len() as u32,
            instances,
            style: bind,
        }
    }
}

/// The instance layers bound for drawing.
///
/// Replacement builds every new buffer first and then swaps the whole list, so a
/// draw never sees a half-written set.
#[derive(Debug, Default)]
pub struct InstanceLayers {
    layers: Vec<InstanceLayer>,
}

impl InstanceLayers {
    pub fn replace(&mut self, device: &wgpu::Device, style_layout: &wgpu::BindGroupLayout, batches: &[InstanceBatch]) {
        let fresh: Vec<_> = batches
            .iter()
            .filter(|b| !b.is_empty())
            .map(|b| InstanceLayer::new(device, style_layout, b))
            .collect();

        log::debug!(
            "Instance layers replaced: {} layers, {} instances",
            fresh.len(),
            fresh.iter().map(|l| l.count as u64).sum::<u64>()
        );
        self.layers = fresh;
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstanceLayer> {
        self.layers.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}
