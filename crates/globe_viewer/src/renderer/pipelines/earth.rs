use crate::data::types::{vertex_layout, GlobeUniforms};
use crate::renderer::context::GpuContext;

/// Lit earth: day/night blend, normal-map tilt, specular water, atmosphere rim and
/// displacement of raised land along the normal.
const EARTH_WGSL: &str = r#"
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

@group(1) @binding(0) var t_diffuse: texture_2d<f32>;
@group(1) @binding(1) var t_normal: texture_2d<f32>;
@group(1) @binding(2) var t_specular: texture_2d<f32>;
@group(1) @binding(3) var t_night: texture_2d<f32>;
@group(1) @binding(4) var s_earth: sampler;

const SUN_DIR: vec3<f32> = vec3<f32>(0.57735027, 0.57735027, 0.57735027);

struct VertexIn {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

@vertex
fn vs_main(in: VertexIn) -> VsOut {
    let bump = textureSampleLevel(t_normal, s_earth, in.uv, 0.0).r - 0.5;
    let displaced = in.position + in.normal * bump * g.elevation_scale;
    let world = g.model * vec4<f32>(displaced, 1.0);

    var out: VsOut;
    out.clip = g.proj * g.view * world;
    out.world_pos = world.xyz;
    out.normal = normalize((g.model * vec4<f32>(in.normal, 0.0)).xyz);
    out.uv = in.uv;
    return out;
}

fn tilted_normal(n: vec3<f32>, tex: vec3<f32>) -> vec3<f32> {
    var east = cross(vec3<f32>(0.0, 1.0, 0.0), n);
    if (dot(east, east) < 1e-6) {
        east = vec3<f32>(1.0, 0.0, 0.0);
    }
    east = normalize(east);
    let north = cross(n, east);
    let t = tex * 2.0 - vec3<f32>(1.0);
    return normalize(east * t.x * g.detail_level + north * t.y * g.detail_level + n * t.z);
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    let albedo = textureSample(t_diffuse, s_earth, in.uv).rgb;
    let lights = textureSample(t_night, s_earth, in.uv).rgb;
    let water = textureSample(t_specular, s_earth, in.uv).r;
    let bump = textureSample(t_normal, s_earth, in.uv).rgb;

    let n_geo = normalize(in.normal);
    let n = tilted_normal(n_geo, bump);
    let view_dir = normalize(g.camera_pos - in.world_pos);

    let ndl = dot(n, SUN_DIR);
    let day = smoothstep(-0.1, 0.2, ndl);
    let lit = albedo * (0.08 + 0.92 * max(ndl, 0.0));

    let half_vec = normalize(SUN_DIR + view_dir);
    let spec = water * pow(max(dot(n, half_vec), 0.0), 16.0 * g.detail_level) * day;

    var color = mix(lights, lit, day) + vec3<f32>(spec);

    let rim = pow(1.0 - max(dot(n_geo, view_dir), 0.0), 3.0);
    color = color + vec3<f32>(0.3, 0.6, 1.0) * rim * g.atmosphere_density * 0.4;

    return vec4<f32>(color, 1.0);
}
"#;

/// Unlit diffuse only.
const EARTH_FALLBACK_WGSL: &str = r#"
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
@group(1) @binding(0) var t_diffuse: texture_2d<f32>;
@group(1) @binding(4) var s_earth: sampler;

struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@location(0) position: vec3<f32>, @location(1) normal: vec3<f32>, @location(2) uv: vec2<f32>) -> VsOut {
    var out: VsOut;
    out.clip = g.proj * g.view * g.model * vec4<f32>(position, 1.0);
    out.uv = uv;
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    return vec4<f32>(textureSample(t_diffuse, s_earth, in.uv).rgb, 1.0);
}
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderVariant {
    Primary,
    Fallback,
}

pub struct EarthPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub variant: ShaderVariant,
}

impl EarthPipeline {
    /// Tries the primary shader pair, then the fallback. `None` if neither compiles.
    pub fn compile(
        gpu: &GpuContext,
        layout: &wgpu::PipelineLayout,
        color_fmt: wgpu::TextureFormat,
        depth_fmt: wgpu::TextureFormat,
    ) -> Option<Self> {
        [
            (ShaderVariant::Primary, EARTH_WGSL),
            (ShaderVariant::Fallback, EARTH_FALLBACK_WGSL),
        ]
        .into_iter()
        .find_map(|(variant, source)| {
            let pipeline = gpu
                .checked(&format!("{variant:?} earth shader"), |device| {
                    build(device, layout, source, color_fmt, depth_fmt)
                })
                .ok()?;
            log::info!("Earth pipeline compiled with the {variant:?} shader pair");
            Some(Self { pipeline, variant })
        })
    }
}

/// Group 0: per-frame [`GlobeUniforms`].
pub fn globals_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Globals Layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<GlobeUniforms>() as u64),
            },
            count: None,
        }],
    })
}

fn build(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    source: &str,
    color_fmt: wgpu::TextureFormat,
    depth_fmt: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("earth.wgsl"),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Earth Pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: "vs_main",
            buffers: &[vertex_layout()],
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
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: Some(wgpu::Face::Back),
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: depth_fmt,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    })
}
