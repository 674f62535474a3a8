// Fixed star field on a large shell around the globe, drawn as points before the earth.

use crate::data::types::{star_layout, StarVertex};
use crate::renderer::context::GpuContext;
use glam::Vec3;
use rand::{rngs::StdRng, Rng, SeedableRng};
use wgpu::util::DeviceExt;

pub const STAR_COUNT: usize = 2000;
pub const STAR_SHELL_RADIUS: f32 = 50.0;

const STARS_WGSL: &str = r#"
struct Globals {
    model: mat4x4<f32>,
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    camera_pos: vec3<f32>,
    time: f32,
    elevation_scale: f32,
    atmosphere_density: f32,
    detail_level: f32,
    _pad: f32,
};

@group(0) @binding(0) var<uniform> g: Globals;

struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) brightness: f32,
};

@vertex
fn vs_main(@location(0) position: vec3<f32>, @location(1) brightness: f32) -> VsOut {
    var out: VsOut;
    out.clip = g.proj * g.view * vec4<f32>(position, 1.0);
    // Slow twinkle, phase-shifted per star.
    out.brightness = brightness * (0.85 + 0.15 * sin(g.time * 1.7 + position.x));
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    return vec4<f32>(vec3<f32>(in.brightness), 1.0);
}
"#;

/// Uniformly distributed directions on the shell with random brightness.
pub fn generate_stars(seed: u64, count: usize) -> Vec<StarVertex> {
    let mut rng = StdRng::seed_from_u64(seed ^ 0x5EED_57A2);
    (0..count)
        .map(|_| {
            let z: f32 = rng.gen_range(-1.0..=1.0);
            let phi: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
            let r = (1.0 - z * z).max(0.0).sqrt();
            let dir = Vec3::new(r * phi.cos(), z, r * phi.sin());

            StarVertex {
                position: (dir * STAR_SHELL_RADIUS).into(),
                brightness: rng.gen_range(0.3..=1.0),
            }
        })
        .collect()
}

pub struct StarPipeline {
    pipeline: wgpu::RenderPipeline,
    vertices: wgpu::Buffer,
    count: u32,
}

impl StarPipeline {
    pub fn new(
        gpu: &GpuContext,
        globals_layout: &wgpu::BindGroupLayout,
        color_fmt: wgpu::TextureFormat,
        depth_fmt: wgpu::TextureFormat,
        seed: u64,
    ) -> Result<Self, String> {
        let pipeline = gpu.checked("star shader", |device| {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("stars.wgsl"),
                source: wgpu::ShaderSource::Wgsl(STARS_WGSL.into()),
            });

            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Star PipelineLayout"),
                bind_group_layouts: &[globals_layout],
                push_constant_ranges: &[],
            });

            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Star Pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: "vs_main",
                    buffers: &[star_layout()],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: "fs_main",
                    targets: &[Some(wgpu::ColorTargetState {
                        format: color_fmt,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::PointList,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: depth_fmt,
                    depth_write_enabled: false,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            })
        })?;

        let stars = generate_stars(seed, STAR_COUNT);
        let vertices = gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Star VB"),
            contents: bytemuck::cast_slice(&stars),
            usage: wgpu::BufferUsages::VERTEX,
        });

        Ok(Self { pipeline, vertices, count: stars.len() as u32 })
    }

    pub fn draw<'a>(&'a self, rpass: &mut wgpu::RenderPass<'a>, globals: &'a wgpu::BindGroup) {
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, globals, &[]);
        rpass.set_vertex_buffer(0, self.vertices.slice(..));
        rpass.draw(0..self.count, 0..1);
    }
}
