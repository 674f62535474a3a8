use crate::data::{
    types::{instance_layout, vertex_layout, MarkerUniform},
    InstanceLayers, MeshGpu,
};
use crate::renderer::context::GpuContext;
use globe_core::MarkerShape;
use wgpu::util::DeviceExt;

const MARKER_WGSL: &str = r#"
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

struct MarkerStyle {
    color: vec4<f32>,
};

@group(0) @binding(0) var<uniform> g: Globals;
@group(1) @binding(0) var<uniform> style: MarkerStyle;

const SUN_DIR: vec3<f32> = vec3<f32>(0.57735027, 0.57735027, 0.57735027);

struct VertexIn {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

struct InstanceIn {
    @location(3) c0: vec4<f32>,
    @location(4) c1: vec4<f32>,
    @location(5) c2: vec4<f32>,
    @location(6) c3: vec4<f32>,
};

struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) normal: vec3<f32>,
};

@vertex
fn vs_main(v: VertexIn, inst: InstanceIn) -> VsOut {
    let to_globe = g.model * mat4x4<f32>(inst.c0, inst.c1, inst.c2, inst.c3);
    var out: VsOut;
    out.clip = g.proj * g.view * to_globe * vec4<f32>(v.position, 1.0);
    out.normal = normalize((to_globe * vec4<f32>(v.normal, 0.0)).xyz);
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    let shade = 0.35 + 0.65 * max(dot(normalize(in.normal), SUN_DIR), 0.0);
    return vec4<f32>(style.color.rgb * shade, style.color.a);
}
"#;

/// Instanced marker meshes, one per [`MarkerShape`].
pub struct MarkerPipeline {
    pipeline: wgpu::RenderPipeline,
    pub style_layout: wgpu::BindGroupLayout,
    pyramid: MeshGpu,
    cuboid: MeshGpu,
    sphere: MeshGpu,
}

impl MarkerPipeline {
    pub fn new(
        gpu: &GpuContext,
        globals_layout: &wgpu::BindGroupLayout,
        color_fmt: wgpu::TextureFormat,
        depth_fmt: wgpu::TextureFormat,
    ) -> Result<Self, String> {
        let device = &gpu.device;
        let style_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Marker Style Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<MarkerUniform>() as u64),
                },
                count: None,
            }],
        });

        let pipeline = gpu.checked("marker shader", |device| {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("markers.wgsl"),
                source: wgpu::ShaderSource::Wgsl(MARKER_WGSL.into()),
            });

            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Marker PipelineLayout"),
                bind_group_layouts: &[globals_layout, &style_layout],
                push_constant_ranges: &[],
            });

            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Marker Pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: "vs_main",
                    buffers: &[vertex_layout(), instance_layout()],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: "fs_main",
                    targets: &[Some(wgpu::ColorTargetState {
                        format: color_fmt,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: depth_fmt,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            })
        })?;

        Ok(Self {
            pipeline,
            pyramid: upload_mesh(device, MarkerShape::Pyramid),
            cuboid: upload_mesh(device, MarkerShape::Box),
            sphere: upload_mesh(device, MarkerShape::Sphere),
            style_layout,
        })
    }

    fn mesh(&self, shape: MarkerShape) -> &MeshGpu {
        match shape {
            MarkerShape::Pyramid => &self.pyramid,
            MarkerShape::Box => &self.cuboid,
            MarkerShape::Sphere => &self.sphere,
        }
    }

    pub fn draw<'a>(&'a self, rpass: &mut wgpu::RenderPass<'a>, globals: &'a wgpu::BindGroup, layers: &'a InstanceLayers) {
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, globals, &[]);

        for layer in layers.iter() {
            let mesh = self.mesh(layer.shape);
            rpass.set_bind_group(1, &layer.style, &[]);
            rpass.set_vertex_buffer(0, mesh.vertices.slice(..));
            rpass.set_vertex_buffer(1, layer.instances.slice(..));
            rpass.set_index_buffer(mesh.indices.slice(..), wgpu::IndexFormat::Uint32);
            rpass.draw_indexed(0..mesh.index_count, 0, 0..layer.count);
        }
    }
}

pub fn upload_mesh(device: &wgpu::Device, shape: MarkerShape) -> MeshGpu {
    let mesh = shape.mesh();
    let label = format!("{shape:?} Marker");

    MeshGpu {
        vertices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&label),
            contents: mesh.vertex_bytes(),
            usage: wgpu::BufferUsages::VERTEX,
        }),
        indices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&label),
            contents: mesh.index_bytes(),
            usage: wgpu::BufferUsages::INDEX,
        }),
        index_count: mesh.indices.len() as u32,
    }
}
