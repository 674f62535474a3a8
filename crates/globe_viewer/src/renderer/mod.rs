//! The GPU globe. Owns the device context, depth target, pipelines and scene
//! buffers, and walks them through an explicit stage machine:
//! `Uninitialized → DeviceReady → PipelineCompiled → TexturesLoaded → Rendering`,
//! with `Failed` reachable from every step.

pub mod context;
pub mod pipelines;
pub mod resource;
pub mod targets;
pub mod textures;
pub mod uniforms;

use self::{
    context::GpuContext,
    pipelines::{
        blit::BlitPipeline,
        earth::{globals_layout, EarthPipeline, ShaderVariant},
        markers::MarkerPipeline,
        stars::StarPipeline,
    },
    resource::RenderResource,
    targets::Targets,
    textures::SceneTextures,
    uniforms::{frame_uniforms, UniformRing},
};
use crate::{
    camera::Camera,
    config::RenderTunables,
    data::{InstanceLayers, MeshGpu},
    fallback::{software::SoftwareFrame, GpuProbe},
};
use glam::Mat4;
use globe_core::{mesh::build_sphere, InstanceBatch, MeshError, TextureAsset, TextureKind, TextureSet};
use std::{fmt, sync::Arc};
use thiserror::Error;
use wgpu::util::DeviceExt;
use winit::window::Window;

const CLEAR_COLOR: wgpu::Color = wgpu::Color { r: 0.0, g: 0.0, b: 0.05, a: 1.0 };

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RenderFailure {
    #[error("no GPU adapter is available")]
    NoAdapter,
    #[error("device request failed: {0}")]
    Device(String),
    #[error("surface setup failed: {0}")]
    Surface(String),
    #[error("neither the primary nor the fallback earth shader compiled")]
    ShaderCompile,
    #[error("globe mesh: {0}")]
    Mesh(#[from] MeshError),
    #[error("GPU out of memory")]
    OutOfMemory,
    #[error("{step} requires stage {expected}")]
    OutOfOrder { step: &'static str, expected: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderStage {
    Uninitialized,
    DeviceReady,
    PipelineCompiled,
    TexturesLoaded,
    Rendering,
    Failed(RenderFailure),
}

impl fmt::Display for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderStage::Failed(reason) => write!(f, "Failed ({reason})"),
            other => write!(f, "{other:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    /// No drawable this frame; nothing was drawn and nothing blocked.
    Skipped,
}

#[derive(Debug, Clone)]
pub struct RendererSettings {
    pub stacks: u32,
    pub slices: u32,
    pub seed: u64,
    pub tunables: RenderTunables,
}

struct Pipelines {
    globals_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    earth: EarthPipeline,
    markers: RenderResource<MarkerPipeline>,
    stars: RenderResource<StarPipeline>,
}

struct Scene {
    sphere: MeshGpu,
    textures: SceneTextures,
    instances: InstanceLayers,
    uniforms: UniformRing,
}

pub struct GlobeRenderer {
    window: Arc<Window>,
    settings: RendererSettings,
    stage: RenderStage,
    running: bool,
    gpu: Option<GpuContext>,
    targets: Option<Targets>,
    pipelines: Option<Pipelines>,
    scene: Option<Scene>,
    blit: Option<BlitPipeline>,
    pending_instances: Option<Vec<InstanceBatch>>,
}

impl GlobeRenderer {
    pub fn new(window: Arc<Window>, settings: RendererSettings) -> Self {
        Self {
            window,
            settings,
            stage: RenderStage::Uninitialized,
            running: false,
            gpu: None,
            targets: None,
            pipelines: None,
            scene: None,
            blit: None,
            pending_instances: None,
        }
    }

    pub fn stage(&self) -> &RenderStage {
        &self.stage
    }

    pub fn has_device(&self) -> bool {
        self.gpu.is_some()
    }

    pub fn max_texture_dimension(&self) -> Option<u32> {
        self.gpu.as_ref().map(GpuContext::max_texture_dimension)
    }

    pub fn shader_variant(&self) -> Option<ShaderVariant> {
        self.pipelines.as_ref().map(|p| p.earth.variant)
    }

    pub fn set_tunables(&mut self, tunables: RenderTunables) {
        self.settings.tunables = tunables;
    }

    fn advance(&mut self, next: RenderStage) {
        log::info!("Renderer stage: {} -> {}", self.stage, next);
        self.stage = next;
    }

    fn fail(&mut self, failure: RenderFailure) -> RenderFailure {
        log::error!("Renderer failed in stage {}: {failure}", self.stage);
        self.stage = RenderStage::Failed(failure.clone());
        failure
    }

    fn expect_stage(&self, step: &'static str, expected: RenderStage, name: &'static str) -> Result<(), RenderFailure> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(RenderFailure::OutOfOrder { step, expected: name })
        }
    }

    /// Acquires adapter, device, queue and surface.
    pub fn init_device(&mut self) -> Result<(), RenderFailure> {
        self.expect_stage("init_device", RenderStage::Uninitialized, "Uninitialized")?;

        match pollster::block_on(GpuContext::new(self.window.clone())) {
            Ok(gpu) => {
                log::info!("Using GPU adapter {}", gpu.adapter_name);
                self.targets = Some(Targets::new(&gpu.device, gpu.size));
                self.gpu = Some(gpu);
                self.advance(RenderStage::DeviceReady);
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Compiles the earth shader (primary, else fallback) plus the marker and star passes.
    /// Only a missing earth pipeline is fatal.
    pub fn compile_pipelines(&mut self) -> Result<(), RenderFailure> {
        self.expect_stage("compile_pipelines", RenderStage::DeviceReady, "DeviceReady")?;
        let Some(gpu) = self.gpu.as_ref() else {
            return Err(self.fail(RenderFailure::NoAdapter));
        };

        match build_pipelines(gpu, self.settings.seed) {
            Some(pipelines) => {
                self.pipelines = Some(pipelines);
                self.advance(RenderStage::PipelineCompiled);
                Ok(())
            }
            None => Err(self.fail(RenderFailure::ShaderCompile)),
        }
    }

    /// Builds the sphere buffers once and binds placeholder textures.
    pub fn load_scene(&mut self) -> Result<(), RenderFailure> {
        self.expect_stage("load_scene", RenderStage::PipelineCompiled, "PipelineCompiled")?;
        let mesh = match build_sphere(1.0, self.settings.stacks, self.settings.slices) {
            Ok(mesh) => mesh,
            Err(e) => return Err(self.fail(e.into())),
        };

        let (Some(gpu), Some(pipes)) = (self.gpu.as_ref(), self.pipelines.as_ref()) else {
            return Err(RenderFailure::OutOfOrder { step: "load_scene", expected: "PipelineCompiled" });
        };

        let sphere = MeshGpu {
            vertices: gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Globe VB"),
                contents: mesh.vertex_bytes(),
                usage: wgpu::BufferUsages::VERTEX,
            }),
            indices: gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Globe IB"),
                contents: mesh.index_bytes(),
                usage: wgpu::BufferUsages::INDEX,
            }),
            index_count: mesh.indices.len() as u32,
        };
        log::info!(
            "Globe mesh uploaded: {} vertices, {} triangles",
            mesh.vertices.len(),
            mesh.triangle_count()
        );

        let mut scene = Scene {
            sphere,
            textures: SceneTextures::new(&gpu.device, &gpu.queue, &pipes.texture_layout),
            instances: InstanceLayers::default(),
            uniforms: UniformRing::new(&gpu.device, &pipes.globals_layout),
        };

        if let (Some(batches), RenderResource::Ready(markers)) = (self.pending_instances.take(), &pipes.markers) {
            scene.instances.replace(&gpu.device, &markers.style_layout, &batches);
        }

        self.scene = Some(scene);
        Ok(())
    }

    /// Uploads a synthesized texture set. Returns whether the diffuse map is now live.
    pub fn install_textures(&mut self, set: &TextureSet) -> bool {
        let (Some(gpu), Some(pipes), Some(scene)) = (self.gpu.as_ref(), self.pipelines.as_ref(), self.scene.as_mut())
        else {
            return false;
        };
        scene.textures.install_set(gpu, &pipes.texture_layout, set);
        self.after_texture_install()
    }

    /// Replaces only the diffuse map, for the single off-thread retry.
    pub fn install_diffuse(&mut self, asset: &TextureAsset) -> bool {
        let (Some(gpu), Some(pipes), Some(scene)) = (self.gpu.as_ref(), self.pipelines.as_ref(), self.scene.as_mut())
        else {
            return false;
        };
        scene.textures.install(gpu, &pipes.texture_layout, TextureKind::Diffuse, asset);
        self.after_texture_install()
    }

    fn after_texture_install(&mut self) -> bool {
        let ready = self
            .scene
            .as_ref()
            .is_some_and(|s| s.textures.state(TextureKind::Diffuse).is_ready());
        if ready && self.stage == RenderStage::PipelineCompiled {
            self.advance(RenderStage::TexturesLoaded);
        }
        ready
    }

    /// Swaps in new marker instance buffers. Before the scene exists the batches are
    /// held and uploaded by [`Self::load_scene`].
    pub fn set_instances(&mut self, batches: &[InstanceBatch]) {
        let (Some(gpu), Some(pipes), Some(scene)) = (self.gpu.as_ref(), self.pipelines.as_ref(), self.scene.as_mut())
        else {
            self.pending_instances = Some(batches.to_vec());
            return;
        };
        match &pipes.markers {
            RenderResource::Ready(markers) => scene.instances.replace(&gpu.device, &markers.style_layout, batches),
            RenderResource::Pending | RenderResource::Failed(_) => {
                log::debug!("Dropping {} marker batches, no marker pipeline", batches.len())
            }
        }
    }

    pub fn start(&mut self) {
        if !self.running {
            log::info!("Renderer started");
        }
        self.running = true;
    }

    pub fn stop(&mut self) {
        if self.running {
            log::info!("Renderer stopped");
        }
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn on_resize(&mut self, size: winit::dpi::PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        if let Some(gpu) = self.gpu.as_mut() {
            gpu.resize(size);
            if let Some(targets) = self.targets.as_mut() {
                targets.resize(&gpu.device, size);
            }
        }
    }

    /// Draws one frame: stars, the earth, then any marker layers. A no-op while stopped.
    pub fn render(&mut self, camera: &Camera, model: Mat4, time: f32) -> Result<FrameOutcome, RenderFailure> {
        if let RenderStage::Failed(reason) = &self.stage {
            return Err(reason.clone());
        }
        if !self.running {
            return Ok(FrameOutcome::Skipped);
        }

        let (Some(gpu), Some(targets), Some(pipes), Some(scene)) = (
            self.gpu.as_ref(),
            self.targets.as_ref(),
            self.pipelines.as_ref(),
            self.scene.as_mut(),
        ) else {
            return Ok(FrameOutcome::Skipped);
        };

        let uniforms = frame_uniforms(camera, model, time, &self.settings.tunables);
        match draw_globe(gpu, targets, pipes, scene, &uniforms) {
            Ok(FrameOutcome::Presented) => {
                if self.stage == RenderStage::TexturesLoaded {
                    self.advance(RenderStage::Rendering);
                }
                Ok(FrameOutcome::Presented)
            }
            Ok(FrameOutcome::Skipped) => Ok(FrameOutcome::Skipped),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Shows a software-rendered frame through the blit pass. Needs only a device.
    pub fn present_software(&mut self, frame: &SoftwareFrame) -> Result<FrameOutcome, RenderFailure> {
        let Some(gpu) = self.gpu.as_ref() else {
            return Ok(FrameOutcome::Skipped);
        };

        if self.blit.is_none() {
            let format = gpu.config.format;
            let blit = gpu
                .checked("blit pipeline", |device| BlitPipeline::new(device, format))
                .map_err(|_| RenderFailure::ShaderCompile)?;
            self.blit = Some(blit);
        }
        let Some(blit) = self.blit.as_mut() else {
            return Ok(FrameOutcome::Skipped);
        };

        let Some(output) = acquire(gpu)? else {
            return Ok(FrameOutcome::Skipped);
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        blit.upload(&gpu.device, &gpu.queue, frame);
        let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Software Frame Encoder"),
        });
        blit.draw(&mut encoder, &view);
        gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(FrameOutcome::Presented)
    }
}

fn build_pipelines(gpu: &GpuContext, seed: u64) -> Option<Pipelines> {
    let color_fmt = gpu.config.format;
    let depth_fmt = Targets::DEPTH_FORMAT;
    let globals = globals_layout(&gpu.device);
    let texture_layout = textures::bind_group_layout(&gpu.device);

    let earth_layout = gpu.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Earth PipelineLayout"),
        bind_group_layouts: &[&globals, &texture_layout],
        push_constant_ranges: &[],
    });
    let earth = EarthPipeline::compile(gpu, &earth_layout, color_fmt, depth_fmt)?;

    let markers: RenderResource<_> = MarkerPipeline::new(gpu, &globals, color_fmt, depth_fmt).into();
    let stars: RenderResource<_> = StarPipeline::new(gpu, &globals, color_fmt, depth_fmt, seed).into();
    if let RenderResource::Failed(reason) = &markers {
        log::warn!("Marker pipeline unavailable, features will not be drawn: {reason}");
    }
    if let RenderResource::Failed(reason) = &stars {
        log::warn!("Star pipeline unavailable: {reason}");
    }

    Some(Pipelines {
        globals_layout: globals,
        texture_layout,
        earth,
        markers,
        stars,
    })
}

/// Next swap-chain image, or `None` when this frame should be skipped.
fn acquire(gpu: &GpuContext) -> Result<Option<wgpu::SurfaceTexture>, RenderFailure> {
    match gpu.surface.get_current_texture() {
        Ok(frame) => Ok(Some(frame)),
        Err(wgpu::SurfaceError::OutOfMemory) => Err(RenderFailure::OutOfMemory),
        Err(e @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
            log::debug!("Skipping frame: {e}; reconfiguring surface");
            gpu.reconfigure();
            Ok(None)
        }
        Err(e) => {
            log::debug!("Skipping frame: {e}");
            Ok(None)
        }
    }
}

fn draw_globe(
    gpu: &GpuContext,
    targets: &Targets,
    pipes: &Pipelines,
    scene: &mut Scene,
    uniforms: &crate::data::GlobeUniforms,
) -> Result<FrameOutcome, RenderFailure> {
    let Some(output) = acquire(gpu)? else {
        return Ok(FrameOutcome::Skipped);
    };
    let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
    let globals = scene.uniforms.next(&gpu.queue, uniforms);

    let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Globe Frame Encoder"),
    });

    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Globe Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &targets.depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        if let Some(stars) = pipes.stars.ready() {
            stars.draw(&mut pass, globals);
        }

        pass.set_pipeline(&pipes.earth.pipeline);
        pass.set_bind_group(0, globals, &[]);
        pass.set_bind_group(1, &scene.textures.bind_group, &[]);
        pass.set_vertex_buffer(0, scene.sphere.vertices.slice(..));
        pass.set_index_buffer(scene.sphere.indices.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..scene.sphere.index_count, 0, 0..1);

        if let Some(markers) = pipes.markers.ready() {
            if !scene.instances.is_empty() {
                markers.draw(&mut pass, globals, &scene.instances);
            }
        }
    }

    gpu.queue.submit(std::iter::once(encoder.finish()));
    output.present();
    Ok(FrameOutcome::Presented)
}

/// Steps already completed count as successful, so a policy retry re-probes cheaply.
impl GpuProbe for GlobeRenderer {
    fn hardware_available(&mut self) -> bool {
        self.gpu.is_some() || self.init_device().is_ok()
    }

    fn compile_shaders(&mut self) -> bool {
        if self.scene.is_some() {
            return !matches!(self.stage, RenderStage::Failed(_));
        }
        self.compile_pipelines().and_then(|()| self.load_scene()).is_ok()
    }
}
