//! CPU ray-caster for the alternate renderer. Draws the same textured, sunlit globe
//! as the earth shader into an RGBA8 (sRGB) frame, one row per rayon task.

use crate::{
    camera::{ray_sphere, ray_through, Camera},
    config::RenderTunables,
};
use anyhow::{Context, Result};
use glam::{Mat4, Vec3};
use globe_core::{
    geo::{cartesian_to_geo, geo_to_uv},
    TextureKind, TextureSet,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;
use std::{path::Path, sync::Arc};

/// Direction towards the sun, world space. Matches `SUN_DIR` in the WGSL.
pub const SUN_DIR: Vec3 = Vec3::new(0.577_350_3, 0.577_350_3, 0.577_350_3);

const BACKGROUND: [u8; 4] = [0, 0, 13, 255];
const OCEAN: Vec3 = Vec3::new(0.0, 0.2, 0.6);
const RIM: Vec3 = Vec3::new(0.3, 0.6, 1.0);
/// Roughly one pixel in this many is a star.
const STAR_DENSITY: u32 = 700;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftwareFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl SoftwareFrame {
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]]
    }

    pub fn write_png(&self, path: &Path) -> Result<()> {
        let img = image::RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .context("frame buffer does not match its dimensions")?;
        img.save(path)
            .with_context(|| format!("writing {}", path.display()))?;
        log::info!("Wrote {}x{} software frame to {}", self.width, self.height, path.display());
        Ok(())
    }
}

pub struct SoftwareRenderer {
    textures: Option<Arc<TextureSet>>,
    tunables: RenderTunables,
    seed: u64,
}

impl SoftwareRenderer {
    pub fn new(tunables: RenderTunables, seed: u64) -> Self {
        Self { textures: None, tunables, seed }
    }

    pub fn set_textures(&mut self, textures: Arc<TextureSet>) {
        self.textures = Some(textures);
    }

    pub fn has_textures(&self) -> bool {
        self.textures.is_some()
    }

    pub fn render(&self, camera: &Camera, model: Mat4, width: u32, height: u32) -> SoftwareFrame {
        let (width, height) = (width.max(1), height.max(1));
        let inv_view_proj = camera.view_proj().inverse();
        let inv_model = model.inverse();
        let eye = camera.eye();

        let mut pixels = vec![0u8; width as usize * height as usize * 4];
        pixels
            .par_chunks_mut(width as usize * 4)
            .enumerate()
            .for_each(|(y, row)| {
                // One stream per row keeps the star field independent of thread scheduling.
                let mut stars = StdRng::seed_from_u64(self.seed.wrapping_add(y as u64));
                let ndc_y = 1.0 - 2.0 * (y as f32 + 0.5) / height as f32;
                for (x, px) in row.chunks_exact_mut(4).enumerate() {
                    let ndc_x = 2.0 * (x as f32 + 0.5) / width as f32 - 1.0;
                    let (origin, dir) = ray_through(&inv_view_proj, ndc_x, ndc_y);
                    let star = sky(&mut stars);

                    let color = match ray_sphere(origin, dir, 1.0) {
                        Some(t) => self.shade(origin + dir * t, eye, &inv_model),
                        None => star,
                    };
                    px.copy_from_slice(&color);
                }
            });

        SoftwareFrame { width, height, pixels }
    }

    fn sample(&self, kind: TextureKind, uv: (f64, f64)) -> Option<Vec3> {
        let texture = self.textures.as_ref()?.get(kind);
        let [r, g, b, _] = texture.sample_nearest(uv.0 as f32, uv.1 as f32);
        Some(Vec3::new(r as f32, g as f32, b as f32) / 255.0)
    }

    fn shade(&self, hit: Vec3, eye: Vec3, inv_model: &Mat4) -> [u8; 4] {
        let n = hit.normalize_or_zero();
        let local = inv_model.transform_point3(hit);
        let (lat, lon, _) = cartesian_to_geo(local.as_dvec3(), 1.0);
        let uv = geo_to_uv(lat, lon);

        let albedo = self.sample(TextureKind::Diffuse, uv).unwrap_or(OCEAN);
        let lights = self.sample(TextureKind::Night, uv).unwrap_or(Vec3::ZERO);

        let ndl = n.dot(SUN_DIR);
        let day = smoothstep(-0.1, 0.2, ndl);
        let lit = albedo * (0.08 + 0.92 * ndl.max(0.0));
        let mut color = lights.lerp(lit, day);

        let view_dir = (eye - hit).normalize_or_zero();
        let rim = (1.0 - n.dot(view_dir).max(0.0)).powi(3);
        color += RIM * rim * self.tunables.atmosphere_density * 0.4;

        to_rgba8(color)
    }
}

/// Next pixel of the star field. Two draws per pixel, covered or not.
fn sky(rng: &mut StdRng) -> [u8; 4] {
    let is_star = rng.gen_ratio(1, STAR_DENSITY);
    let level: u8 = rng.gen_range(80..=255);
    if is_star {
        [level, level, level, 255]
    } else {
        BACKGROUND
    }
}

fn smoothstep(e0: f32, e1: f32, x: f32) -> f32 {
    let t = ((x - e0) / (e1 - e0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn to_rgba8(c: Vec3) -> [u8; 4] {
    let c = c.clamp(Vec3::ZERO, Vec3::ONE) * 255.0;
    [c.x.round() as u8, c.y.round() as u8, c.z.round() as u8, 255]
}
