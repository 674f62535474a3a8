//! Per-frame uniforms. Each frame writes the next buffer of a small ring so a
//! frame still in flight never sees its globals overwritten.

use crate::{camera::Camera, config::RenderTunables, data::GlobeUniforms};
use glam::Mat4;

pub const RING_SIZE: usize = 3;

pub fn frame_uniforms(camera: &Camera, model: Mat4, time: f32, tunables: &RenderTunables) -> GlobeUniforms {
    GlobeUniforms {
        model: model.to_cols_array_2d(),
        view: camera.view().to_cols_array_2d(),
        proj: camera.proj().to_cols_array_2d(),
        camera_pos: camera.eye().to_array(),
        time,
        elevation_scale: tunables.elevation_scale,
        atmosphere_density: tunables.atmosphere_density,
        detail_level: tunables.detail_level,
        _pad: 0.0,
    }
}

pub struct UniformRing {
    slots: Vec<(wgpu::Buffer, wgpu::BindGroup)>,
    cursor: usize,
}

impl UniformRing {
    pub fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout) -> Self {
        let slots = (0..RING_SIZE)
            .map(|i| {
                let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("Globals UBO {i}")),
                    size: std::mem::size_of::<GlobeUniforms>() as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                let bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Globals Bind"),
                    layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    }],
                });
                (buffer, bind)
            })
            .collect();

        Self { slots, cursor: 0 }
    }

    /// Writes `u` into the next slot and returns that slot's bind group.
    pub fn next(&mut self, queue: &wgpu::Queue, u: &GlobeUniforms) -> &wgpu::BindGroup {
        self.cursor = next_slot(self.cursor);
        let (buffer, bind) = &self.slots[self.cursor];
        queue.write_buffer(buffer, 0, bytemuck::bytes_of(u));
        bind
    }
}

fn next_slot(cursor: usize) -> usize {
    (cursor + 1) % RING_SIZE
}
