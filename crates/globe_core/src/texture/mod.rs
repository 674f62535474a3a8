//! Procedural earth maps, drawn from vector outlines and seeded noise.
//!
//! Each generator is independent and returns `None` when its canvas cannot be
//! allocated. [`TextureSet::synthesize`] runs all four and substitutes a flat
//! colour for any map that came back absent.

pub mod atlas;
pub mod canvas;

use self::atlas::{Continent, CONTINENTS, MAJOR_CITIES, MOUNTAIN_RANGES};
use self::canvas::{uv_to_pixel, Canvas, Ellipse};
use rand::{rngs::StdRng, Rng, SeedableRng};

pub const TEXTURE_WIDTH: u32 = 2048;
pub const TEXTURE_HEIGHT: u32 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Colour data, sampled with sRGB decode.
    Rgba8UnormSrgb,
    /// Linear data (normals, specular weights).
    Rgba8Unorm,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> u32 {
        4
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Diffuse,
    Night,
    Normal,
    Specular,
}

impl TextureKind {
    pub const ALL: [TextureKind; 4] = [
        TextureKind::Diffuse,
        TextureKind::Night,
        TextureKind::Normal,
        TextureKind::Specular,
    ];

    pub fn format(self) -> PixelFormat {
        match self {
            TextureKind::Diffuse | TextureKind::Night => PixelFormat::Rgba8UnormSrgb,
            TextureKind::Normal | TextureKind::Specular => PixelFormat::Rgba8Unorm,
        }
    }

    /// Flat colour used in place of a map that failed to synthesize.
    pub fn fallback_color(self) -> [u8; 4] {
        match self {
            TextureKind::Diffuse => [0, 51, 153, 255],
            TextureKind::Night => [0, 0, 0, 255],
            TextureKind::Normal => [128, 128, 255, 255],
            TextureKind::Specular => [204, 204, 204, 255],
        }
    }

    fn seed_salt(self) -> u64 {
        match self {
            TextureKind::Diffuse => 0x9E37_79B9_7F4A_7C15,
            TextureKind::Night => 0xC2B2_AE3D_27D4_EB4F,
            TextureKind::Normal => 0x1656_67B1_9E37_79F9,
            TextureKind::Specular => 0x27D4_EB2F_1656_67C5,
        }
    }
}

impl std::fmt::Display for TextureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TextureKind::Diffuse => "diffuse",
            TextureKind::Night => "night",
            TextureKind::Normal => "normal",
            TextureKind::Specular => "specular",
        };

        f.write_str(s)
    }
}

/// A CPU-side raster ready for GPU upload. Rows are tightly packed, top row first.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureAsset {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl TextureAsset {
    pub fn solid(width: u32, height: u32, format: PixelFormat, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();

        Self { width, height, format, data }
    }

    pub fn bytes_per_row(&self) -> u32 {
        self.width * self.format.bytes_per_pixel()
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    /// Nearest-neighbour lookup with wrapping `u` and clamped `v`.
    pub fn sample_nearest(&self, u: f32, v: f32) -> [u8; 4] {
        let u = u.rem_euclid(1.0);
        let v = v.clamp(0.0, 1.0);
        let x = ((u * self.width as f32) as u32).min(self.width - 1);
        let y = ((v * self.height as f32) as u32).min(self.height - 1);
        self.pixel(x, y)
    }
}

/// Draws the four earth maps from a shared continent table.
#[derive(Debug, Clone, Copy)]
pub struct TextureSynthesizer<'a> {
    width: u32,
    height: u32,
    seed: u64,
    continents: &'a [Continent],
}

impl TextureSynthesizer<'static> {
    pub fn new(seed: u64) -> Self {
        Self {
            width: TEXTURE_WIDTH,
            height: TEXTURE_HEIGHT,
            seed,
            continents: &CONTINENTS,
        }
    }
}

impl<'a> TextureSynthesizer<'a> {
    /// Replaces the continent outlines; an empty table yields open ocean.
    pub fn with_continents<'b>(self, continents: &'b [Continent]) -> TextureSynthesizer<'b> {
        TextureSynthesizer {
            width: self.width,
            height: self.height,
            seed: self.seed,
            continents,
        }
    }

    /// Overrides the raster size. Pixel-sized features scale with the width.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn generate(&self, kind: TextureKind) -> Option<TextureAsset> {
        let canvas = match kind {
            TextureKind::Diffuse => self.diffuse_canvas()?,
            TextureKind::Night => self.night_canvas()?,
            TextureKind::Normal => self.land_mask_canvas(atlas::NORMAL_FLAT, atlas::NORMAL_RAISED)?,
            TextureKind::Specular => {
                self.land_mask_canvas(atlas::SPECULAR_WATER, atlas::SPECULAR_LAND)?
            }
        };

        Some(TextureAsset {
            width: canvas.width(),
            height: canvas.height(),
            format: kind.format(),
            data: canvas.into_rgba8(),
        })
    }

    pub fn generate_diffuse(&self) -> Option<TextureAsset> {
        self.generate(TextureKind::Diffuse)
    }

    pub fn generate_night(&self) -> Option<TextureAsset> {
        self.generate(TextureKind::Night)
    }

    pub fn generate_normal(&self) -> Option<TextureAsset> {
        self.generate(TextureKind::Normal)
    }

    pub fn generate_specular(&self) -> Option<TextureAsset> {
        self.generate(TextureKind::Specular)
    }

    fn rng(&self, kind: TextureKind) -> StdRng {
        StdRng::seed_from_u64(self.seed ^ kind.seed_salt())
    }

    fn px_scale(&self) -> f32 {
        self.width as f32 / TEXTURE_WIDTH as f32
    }

    fn to_pixels(&self, ring: &[(f32, f32)]) -> Vec<(f32, f32)> {
        ring.iter()
            .map(|&(u, v)| uv_to_pixel(u, v, self.width, self.height))
            .collect()
    }

    fn diffuse_canvas(&self) -> Option<Canvas> {
        let mut canvas = Canvas::new(self.width, self.height)?;
        let mut rng = self.rng(TextureKind::Diffuse);
        let (w, h, s) = (self.width as f32, self.height as f32, self.px_scale());

        canvas.fill(atlas::OCEAN);

        for _ in 0..5 {
            let x = rng.gen_range(0.0..w);
            let y = rng.gen_range(0.0..h);
            let gw = rng.gen_range(300.0..600.0) * s;
            let gh = rng.gen_range(200.0..400.0) * s;
            canvas.linear_gradient((x, y), (x + gw, y + gh), atlas::OCEAN_DEEP, atlas::OCEAN_SHALLOW);
        }

        for continent in self.continents {
            canvas.fill_polygon(&self.to_pixels(continent.outline), continent.color);
        }

        for range in &MOUNTAIN_RANGES {
            canvas.fill_polygon(&self.to_pixels(range), atlas::MOUNTAIN);
        }

        for continent in self.continents {
            canvas.stroke_polyline(&self.to_pixels(continent.outline), 3.0 * s, atlas::COASTLINE);
        }

        for _ in 0..20 {
            canvas.fill_ellipses(&cloud_blob(&mut rng, w, h, s), atlas::CLOUD);
        }

        canvas.fill_ellipse(Ellipse::in_rect(0.0, 0.0, w, h * 0.2), atlas::ICE);
        canvas.fill_ellipse(Ellipse::in_rect(0.0, h * 0.8, w, h * 0.2), atlas::ICE);

        Some(canvas)
    }

    fn night_canvas(&self) -> Option<Canvas> {
        let mut canvas = Canvas::new(self.width, self.height)?;
        let mut rng = self.rng(TextureKind::Night);
        let (w, h, s) = (self.width as f32, self.height as f32, self.px_scale());

        canvas.fill(atlas::NIGHT_SKY);

        for city in &MAJOR_CITIES {
            let (cx, cy) = uv_to_pixel(city.u, city.v, self.width, self.height);
            for ring in 0..5 {
                let alpha = 1.0 - ring as f32 / 5.0;
                let d = city.radius_px * s * (1 + 2 * ring) as f32;
                let mut color = atlas::CITY_LIGHT;
                color[3] = alpha;
                canvas.fill_ellipse(Ellipse::centered(cx, cy, d), color);
            }
        }

        for _ in 0..200 {
            let x = rng.gen_range(0.0..w);
            let y = rng.gen_range(0.0..h);
            let d = rng.gen_range(1.0..3.0) * s;
            let mut color = atlas::CITY_LIGHT;
            color[3] = rng.gen_range(0.3..=1.0);
            canvas.fill_ellipse(Ellipse::centered(x, y, d), color);
        }

        Some(canvas)
    }

    fn land_mask_canvas(&self, base: canvas::Rgba, land: canvas::Rgba) -> Option<Canvas> {
        let mut canvas = Canvas::new(self.width, self.height)?;
        canvas.fill(base);
        for continent in self.continents {
            canvas.fill_polygon(&self.to_pixels(continent.outline), land);
        }
        Some(canvas)
    }
}

/// One cloud: a main ellipse plus five overlapping lobes around its centre.
fn cloud_blob(rng: &mut StdRng, w: f32, h: f32, s: f32) -> Vec<Ellipse> {
    let x = rng.gen_range(0.0..w);
    let y = rng.gen_range(0.0..h);
    let cw = rng.gen_range(50.0..200.0) * s;
    let ch = rng.gen_range(30.0..100.0) * s;

    let mut lobes = Vec::with_capacity(6);
    lobes.push(Ellipse::in_rect(x, y, cw, ch));

    for _ in 0..5 {
        let ox = rng.gen_range(-cw / 4.0..cw / 4.0);
        let oy = rng.gen_range(-ch / 4.0..ch / 4.0);
        let lw = rng.gen_range(cw / 3.0..cw / 2.0);
        let lh = rng.gen_range(ch / 3.0..ch / 2.0);
        lobes.push(Ellipse::in_rect(
            x + cw / 2.0 + ox - lw / 2.0,
            y + ch / 2.0 + oy - lh / 2.0,
            lw,
            lh,
        ));
    }

    lobes
}

/// All four maps; absent ones are replaced with their flat fallback colour.
#[derive(Debug, Clone)]
pub struct TextureSet {
    pub diffuse: TextureAsset,
    pub night: TextureAsset,
    pub normal: TextureAsset,
    pub specular: TextureAsset,
    /// Maps that were substituted with a flat colour.
    pub substituted: Vec<TextureKind>,
}

impl TextureSet {
    pub fn synthesize(seed: u64) -> Self {
        Self::from_synthesizer(&TextureSynthesizer::new(seed))
    }

    pub fn from_synthesizer(synth: &TextureSynthesizer<'_>) -> Self {
        let ((diffuse, night), (normal, specular)) = rayon::join(
            || rayon::join(|| synth.generate_diffuse(), || synth.generate_night()),
            || rayon::join(|| synth.generate_normal(), || synth.generate_specular()),
        );

        let mut substituted = Vec::new();
        let mut or_flat = |kind: TextureKind, asset: Option<TextureAsset>| {
            asset.unwrap_or_else(|| {
                log::warn!("{kind} map synthesis failed; using a flat colour");
                substituted.push(kind);
                TextureAsset::solid(2, 2, kind.format(), kind.fallback_color())
            })
        };

        let diffuse = or_flat(TextureKind::Diffuse, diffuse);
        let night = or_flat(TextureKind::Night, night);
        let normal = or_flat(TextureKind::Normal, normal);
        let specular = or_flat(TextureKind::Specular, specular);

        Self { diffuse, night, normal, specular, substituted }
    }

    pub fn get(&self, kind: TextureKind) -> &TextureAsset {
        match kind {
            TextureKind::Diffuse => &self.diffuse,
            TextureKind::Night => &self.night,
            TextureKind::Normal => &self.normal,
            TextureKind::Specular => &self.specular,
        }
    }
}

/// Diffuse map at full size with the built-in outlines.
pub fn generate_diffuse(seed: u64) -> Option<TextureAsset> {
    TextureSynthesizer::new(seed).generate_diffuse()
}

pub fn generate_night(seed: u64) -> Option<TextureAsset> {
    TextureSynthesizer::new(seed).generate_night()
}

pub fn generate_normal() -> Option<TextureAsset> {
    TextureSynthesizer::new(0).generate_normal()
}

pub fn generate_specular() -> Option<TextureAsset> {
    TextureSynthesizer::new(0).generate_specular()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(seed: u64) -> TextureSynthesizer<'static> {
        TextureSynthesizer::new(seed).with_size(256, 128)
    }

    #[test]
    fn land_and_water_differ_in_masks() {
        let synth = small(1);
        let normal = synth.generate_normal().unwrap();
        let spec = synth.generate_specular().unwrap();

        // Centre of Africa vs. mid-Pacific.
        let (land, sea) = ((0.50, 0.48), (0.05, 0.55));
        assert_eq!(normal.sample_nearest(land.0, land.1), [166, 166, 255, 255]);
        assert_eq!(normal.sample_nearest(sea.0, sea.1), [128, 128, 255, 255]);
        assert_eq!(spec.sample_nearest(land.0, land.1), [51, 51, 51, 255]);
        assert_eq!(spec.sample_nearest(sea.0, sea.1), [204, 204, 204, 255]);
    }

    #[test]
    fn same_seed_same_pixels() {
        let a = small(42).generate_diffuse().unwrap();
        let b = small(42).generate_diffuse().unwrap();
        let c = small(43).generate_diffuse().unwrap();
        assert_eq!(a, b);
        assert_ne!(a.data, c.data);
    }

    #[test]
    fn night_map_has_city_glow() {
        let night = small(7).generate_night().unwrap();
        let tokyo = night.sample_nearest(0.70, 0.38);
        assert!(tokyo[0] > 200, "{tokyo:?}");
        assert_eq!(night.format, PixelFormat::Rgba8UnormSrgb);
    }

    #[test]
    fn absent_maps_are_substituted() {
        let synth = TextureSynthesizer::new(0).with_size(0, 0);
        assert!(synth.generate_diffuse().is_none());

        let set = TextureSet::from_synthesizer(&synth);
        assert_eq!(set.substituted.len(), 4);
        assert_eq!(set.diffuse.pixel(1, 1), TextureKind::Diffuse.fallback_color());
        assert_eq!(set.normal.format, PixelFormat::Rgba8Unorm);
    }

    #[test]
    fn solid_asset_layout() {
        let t = TextureAsset::solid(3, 2, PixelFormat::Rgba8Unorm, [1, 2, 3, 4]);
        assert_eq!(t.data.len(), 24);
        assert_eq!(t.bytes_per_row(), 12);
        assert_eq!(t.pixel(2, 1), [1, 2, 3, 4]);
        assert_eq!(t.sample_nearest(1.5, -3.0), [1, 2, 3, 4]);
    }
}
