use crate::{
    camera::{pick, Camera, CameraController, GlobeSpin},
    config::Config,
    fallback::{
        software::{SoftwareFrame, SoftwareRenderer},
        FallbackController, FallbackReason, FallbackState, RendererChoice,
    },
    net::{CancelToken, Endpoints, NetClient},
    renderer::{FrameOutcome, GlobeRenderer, RenderFailure, RendererSettings},
    worker::{self, DatasetOptions, WorkerMsg},
};
use crossbeam_channel::{Receiver, Sender};
use globe_core::{BoundingBox, InstanceBatch, TextureKind, TextureSet};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use winit::{event::WindowEvent, window::Window};

/// Half-width in degrees of the region fetched around a clicked point.
const REGION_HALF_EXTENT_DEG: f64 = 0.5;

/// Counts presented frames and reports a rate once per second.
#[derive(Debug)]
struct FpsCounter {
    frames: u32,
    since: Instant,
}

impl FpsCounter {
    fn new(now: Instant) -> Self {
        Self { frames: 0, since: now }
    }

    fn tick(&mut self, now: Instant) -> Option<f32> {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.since);
        if elapsed < Duration::from_secs(1) {
            return None;
        }
        let fps = self.frames as f32 / elapsed.as_secs_f32();
        self.frames = 0;
        self.since = now;
        Some(fps)
    }
}

pub struct App {
    seed: u64,
    window: Arc<Window>,
    pub renderer: GlobeRenderer,
    controller: FallbackController,
    software: SoftwareRenderer,
    pub camera: Camera,
    camera_controller: CameraController,
    spin: GlobeSpin,
    tx: Sender<WorkerMsg>,
    rx: Receiver<WorkerMsg>,
    net: Option<NetClient>,
    region_fetch: Option<CancelToken>,
    weather_fetch: Option<CancelToken>,
    base_batches: Vec<InstanceBatch>,
    region_batches: Vec<InstanceBatch>,
    diffuse_retried: bool,
    started: Instant,
    last_update: Instant,
    fps: FpsCounter,
}

impl App {
    /// Probes the GPU through the fallback controller and starts the background work.
    pub fn new(config: Config, window: Arc<Window>) -> Self {
        let seed = config.resolved_seed();
        log::info!("Session seed {seed}");

        let size = window.inner_size();
        let mut renderer = GlobeRenderer::new(
            window.clone(),
            RendererSettings {
                stacks: config.stacks,
                slices: config.slices,
                seed,
                tunables: config.tunables(),
            },
        );

        let now = Instant::now();
        let mut controller = FallbackController::new(config.fallback_policy());
        controller.start(&mut renderer, now);
        renderer.start();

        let (tx, rx) = crossbeam_channel::unbounded();
        worker::spawn_textures(tx.clone(), seed);
        worker::spawn_dataset(
            tx.clone(),
            DatasetOptions { seed, instancing: config.instancing, preprocess: config.preprocess },
        );

        let net = config.external_data.then(|| {
            let (client, _handle) = NetClient::spawn(Endpoints {
                overpass_url: config.overpass_url.clone(),
                weather_url: config.weather_url.clone(),
                weather_api_key: config.weather_api_key.clone(),
                timeout: config.fetch_timeout(),
            });
            client
        });

        let mut camera = Camera::new(1.0);
        camera.set_viewport(size.width, size.height);

        Self {
            software: SoftwareRenderer::new(config.tunables(), seed),
            spin: GlobeSpin::new(config.rotation_speed, config.scale_rotation_by_dt),
            seed,
            window,
            renderer,
            controller,
            camera,
            camera_controller: CameraController::new(),
            tx,
            rx,
            net,
            region_fetch: None,
            weather_fetch: None,
            base_batches: Vec::new(),
            region_batches: Vec::new(),
            diffuse_retried: false,
            started: now,
            last_update: now,
            fps: FpsCounter::new(now),
        }
    }

    /// True when the GPU was never usable, so the window has nothing to show it with.
    pub fn headless_only(&self) -> bool {
        matches!(
            self.controller.state(),
            FallbackState::Alternate(FallbackReason::Disabled | FallbackReason::HardwareAbsent)
        )
    }

    pub fn fallback_state(&self) -> FallbackState {
        self.controller.state()
    }

    pub fn handle_event(&mut self, event: &WindowEvent) {
        if let Some(cursor) = self.camera_controller.handle_event(event, &mut self.camera) {
            self.on_click(cursor);
        }

        match event {
            WindowEvent::Resized(size) => {
                self.renderer.on_resize(*size);
                self.camera.set_viewport(size.width, size.height);
            }
            WindowEvent::Occluded(true) => self.renderer.stop(),
            WindowEvent::Occluded(false) => self.renderer.start(),
            _ => {}
        }
    }

    fn on_click(&mut self, cursor: (f64, f64)) {
        let size = self.window.inner_size();
        let Some(hit) = pick(&self.camera, self.spin.model(), cursor, size.width, size.height) else {
            return;
        };
        log::info!("Picked {:.3}°, {:.3}°", hit.latitude, hit.longitude);

        let Some(net) = &self.net else { return };

        if let Some(previous) = self.region_fetch.take() {
            previous.cancel();
        }
        if let Some(previous) = self.weather_fetch.take() {
            previous.cancel();
        }

        let bbox = BoundingBox::around(hit.latitude, hit.longitude, REGION_HALF_EXTENT_DEG);
        self.region_fetch = Some(net.load_external_feature_data(bbox, worker::region_callback(self.tx.clone(), self.seed)));
        self.weather_fetch = Some(net.load_weather_data(hit, worker::weather_callback(self.tx.clone())));
    }

    /// Drains worker results, checks the texture deadline and advances the spin.
    pub fn update(&mut self) {
        let now = Instant::now();
        while let Ok(msg) = self.rx.try_recv() {
            self.on_worker_msg(msg, now);
        }
        self.controller.poll(now);

        self.spin.advance(now.saturating_duration_since(self.last_update));
        self.last_update = now;
    }

    fn on_worker_msg(&mut self, msg: WorkerMsg, now: Instant) {
        match msg {
            WorkerMsg::Textures(set) => self.on_textures(set, now),
            WorkerMsg::DiffuseRetry(Some(asset)) => {
                if self.controller.gpu_textures_wanted() && self.renderer.install_diffuse(&asset) {
                    self.diffuse_ready(now);
                }
            }
            WorkerMsg::DiffuseRetry(None) => {}
            WorkerMsg::Instances(batches) => {
                self.base_batches = batches;
                self.push_instances();
            }
            WorkerMsg::Region(Some(batches)) => {
                self.region_batches = batches;
                self.push_instances();
            }
            WorkerMsg::Region(None) => log::info!("No features for the selected region"),
            WorkerMsg::Weather(Some(w)) => log::info!(
                "Weather at {:.2}°, {:.2}°: {} {:.1}°C, humidity {}%, wind {:.1} m/s from {}°",
                w.location.latitude,
                w.location.longitude,
                w.condition,
                w.temperature,
                w.humidity,
                w.wind_speed,
                w.wind_direction
            ),
            WorkerMsg::Weather(None) => {}
        }
    }

    fn on_textures(&mut self, set: Arc<TextureSet>, now: Instant) {
        self.software.set_textures(set.clone());
        if !self.controller.gpu_textures_wanted() {
            log::debug!("Skipping GPU texture upload; software renderer active");
            return;
        }

        if self.renderer.install_textures(&set) {
            self.diffuse_ready(now);
        } else if !self.diffuse_retried && self.renderer.has_device() {
            self.diffuse_retried = true;
            let max = self
                .renderer
                .max_texture_dimension()
                .unwrap_or(globe_core::texture::TEXTURE_WIDTH);
            log::warn!("{} map unavailable on the GPU; retrying once", TextureKind::Diffuse);
            worker::retry_diffuse(self.tx.clone(), self.seed, max);
        }
    }

    fn diffuse_ready(&mut self, now: Instant) {
        if let FallbackState::Alternate(FallbackReason::TextureTimeout) = self.controller.state() {
            self.controller.retry_gpu(&mut self.renderer, now);
        }
        self.controller.on_texture_loaded();
    }

    fn push_instances(&mut self) {
        let combined: Vec<_> = self
            .base_batches
            .iter()
            .chain(&self.region_batches)
            .cloned()
            .collect();
        self.renderer.set_instances(&combined);
    }

    pub fn render(&mut self) -> Result<FrameOutcome, RenderFailure> {
        let now = Instant::now();
        let model = self.spin.model();
        let time = now.saturating_duration_since(self.started).as_secs_f32();

        let outcome = match self.controller.choice() {
            RendererChoice::Gpu => match self.renderer.render(&self.camera, model, time) {
                Ok(outcome) => outcome,
                Err(e) => {
                    log::error!("GPU frame failed: {e}");
                    self.controller.report_failure();
                    self.render_software()?
                }
            },
            RendererChoice::Alternate => self.render_software()?,
        };

        if outcome == FrameOutcome::Presented {
            if let Some(fps) = self.fps.tick(now) {
                log::debug!("{fps:.1} fps ({:?})", self.controller.choice());
            }
        }
        Ok(outcome)
    }

    fn render_software(&mut self) -> Result<FrameOutcome, RenderFailure> {
        if !self.renderer.is_running() {
            return Ok(FrameOutcome::Skipped);
        }
        let frame = self.software_frame();
        self.renderer.present_software(&frame)
    }

    pub fn software_frame(&self) -> SoftwareFrame {
        let size = self.window.inner_size();
        self.software.render(&self.camera, self.spin.model(), size.width, size.height)
    }
}

/// Renders a single software frame without a window and writes it as PNG.
///
/// Waits for the synthesized maps so the image shows the textured globe.
pub fn render_headless(config: &Config) -> anyhow::Result<()> {
    let seed = config.resolved_seed();
    let (tx, rx) = crossbeam_channel::unbounded();
    worker::spawn_textures(tx, seed);

    let mut software = SoftwareRenderer::new(config.tunables(), seed);
    match rx.recv() {
        Ok(WorkerMsg::Textures(set)) => software.set_textures(set),
        Ok(_) | Err(_) => log::warn!("No textures for the headless frame; drawing the bare ocean"),
    }

    let mut camera = Camera::new(1.0);
    camera.set_viewport(config.width, config.height);
    let frame = software.render(&camera, glam::Mat4::IDENTITY, config.width, config.height);
    frame.write_png(&config.headless_out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_reports_once_per_second() {
        let t0 = Instant::now();
        let mut fps = FpsCounter::new(t0);
        for i in 1..60 {
            assert!(fps.tick(t0 + Duration::from_millis(i * 16)).is_none());
        }
        let rate = fps.tick(t0 + Duration::from_secs(1)).unwrap();
        assert!((rate - 60.0).abs() < 0.5);
        assert!(fps.tick(t0 + Duration::from_millis(1010)).is_none());
    }

    #[test]
    fn headless_frame_is_written() {
        let path = std::env::temp_dir().join(format!("globe-headless-{}.png", std::process::id()));
        let config = <Config as clap::Parser>::try_parse_from([
            "globe_viewer",
            "--seed",
            "11",
            "--width",
            "64",
            "--height",
            "32",
            "--headless-out",
            path.to_str().unwrap(),
        ])
        .unwrap();

        render_headless(&config).unwrap();
        let img = image::open(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!((img.width(), img.height()), (64, 32));
    }
}
