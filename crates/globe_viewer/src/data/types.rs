//! GPU buffer layouts shared by the globe, marker and star pipelines.

use globe_core::{InstanceTransform, Vertex};

/// Per-frame globe uniforms, std140.
/// Must match `Globals` in the earth, marker and star WGSL.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GlobeUniforms {
    pub model: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 3],
    /// Seconds since the renderer started.
    pub time: f32,
    pub elevation_scale: f32,
    pub atmosphere_density: f32,
    pub detail_level: f32,
    pub _pad: f32,
}

const _: [(); 224] = [(); core::mem::size_of::<GlobeUniforms>()];

/// Flat colour of one marker layer. Must match `MarkerStyle` in the marker WGSL.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MarkerUniform {
    pub color: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StarVertex {
    pub position: [f32; 3],
    pub brightness: f32,
}

const _: [(); 16] = [(); core::mem::size_of::<StarVertex>()];

pub const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

/// The four matrix columns of an [`InstanceTransform`].
pub const INSTANCE_ATTRIBUTES: [wgpu::VertexAttribute; 4] =
    wgpu::vertex_attr_array![3 => Float32x4, 4 => Float32x4, 5 => Float32x4, 6 => Float32x4];

pub const STAR_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32];

pub fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRIBUTES,
    }
}

pub fn instance_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<InstanceTransform>() as u64,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &INSTANCE_ATTRIBUTES,
    }
}

pub fn star_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<StarVertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &STAR_ATTRIBUTES,
    }
}

/// A static indexed mesh on the GPU.
#[derive(Debug)]
pub struct MeshGpu {
    pub vertices: wgpu::Buffer,
    pub indices: wgpu::Buffer,
    pub index_count: u32,
}
