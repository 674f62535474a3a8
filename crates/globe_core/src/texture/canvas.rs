//! A small RGBA8 software rasterizer: solid fills, even-odd polygons, thick polylines,
//! ellipse unions and linear gradients, all composited source-over.
//!
//! Shapes are sampled at pixel centres. There is no anti-aliasing.

use rayon::prelude::*;

/// Straight (non-premultiplied) colour in `[0, 1]`.
pub type Rgba = [f32; 4];

/// Ellipse inscribed in the rectangle `(x, y, w, h)`, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipse {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Ellipse {
    pub const fn in_rect(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Circle of diameter `d` centred on `(cx, cy)`.
    pub fn centered(cx: f32, cy: f32, d: f32) -> Self {
        Self::in_rect(cx - d / 2.0, cy - d / 2.0, d, d)
    }

    #[inline]
    fn contains(&self, px: f32, py: f32) -> bool {
        let (rx, ry) = (self.w / 2.0, self.h / 2.0);
        if rx <= 0.0 || ry <= 0.0 {
            return false;
        }
        let dx = (px - (self.x + rx)) / rx;
        let dy = (py - (self.y + ry)) / ry;
        dx * dx + dy * dy <= 1.0
    }
}

/// Inclusive pixel rectangle.
#[derive(Debug, Clone, Copy)]
struct PixelBox {
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
}

pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    /// Allocates a transparent canvas, or `None` when the pixel store cannot be obtained.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }

        let len = (width as usize).checked_mul(height as usize)?.checked_mul(4)?;
        let mut pixels = Vec::new();
        pixels.try_reserve_exact(len).ok()?;
        pixels.resize(len, 0);

        Some(Self { width, height, pixels })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]]
    }

    pub fn into_rgba8(self) -> Vec<u8> {
        self.pixels
    }

    /// Composites `color` over the whole canvas.
    pub fn fill(&mut self, color: Rgba) {
        self.pixels
            .par_chunks_mut(4)
            .for_each(|px| blend_into(px, color));
    }

    /// Fills a polygon (pixel coordinates) with the even-odd rule.
    /// Fewer than three vertices draws nothing.
    pub fn fill_polygon(&mut self, poly: &[(f32, f32)], color: Rgba) {
        if poly.len() < 3 {
            return;
        }

        let Some(bbox) = self.bounds_of(poly.iter().copied(), 0.0) else {
            return;
        };

        self.fill_where(bbox, color, |x, y| even_odd_contains(poly, x, y));
    }

    /// Strokes consecutive segments with a line of total `width` pixels.
    /// Overlapping joints are composited once.
    pub fn stroke_polyline(&mut self, line: &[(f32, f32)], width: f32, color: Rgba) {
        if line.len() < 2 {
            return;
        }

        let radius = (width / 2.0).max(0.5);
        let radius_sq = radius * radius;

        let Some(bbox) = self.bounds_of(line.iter().copied(), radius) else {
            return;
        };

        self.fill_where(bbox, color, |x, y| {
            line.windows(2)
                .any(|seg| dist_sq_to_segment((x, y), seg[0], seg[1]) <= radius_sq)
        });
    }

    pub fn fill_ellipse(&mut self, e: Ellipse, color: Rgba) {
        self.fill_ellipses(&[e], color);
    }

    /// Fills the union of several ellipses, compositing each covered pixel once.
    ///
    /// Shapes too small to cover any pixel centre still light the pixel under their centre.
    pub fn fill_ellipses(&mut self, shapes: &[Ellipse], color: Rgba) {
        let corners = shapes
            .iter()
            .flat_map(|e| [(e.x, e.y), (e.x + e.w, e.y + e.h)]);
        let Some(bbox) = self.bounds_of(corners, 0.0) else {
            return;
        };

        let painted = self.fill_where(bbox, color, |x, y| shapes.iter().any(|e| e.contains(x, y)));
        if painted > 0 {
            return;
        }

        for e in shapes {
            let (cx, cy) = ((e.x + e.w / 2.0).floor() as i32, (e.y + e.h / 2.0).floor() as i32);
            if let Some(px) = self.pixel_mut(cx, cy) {
                blend_into(px, color);
            }
        }
    }

    /// Axial gradient from `start` (colour `c0`) to `end` (colour `c1`).
    ///
    /// Only the band between the two perpendiculars through the end points is painted.
    pub fn linear_gradient(&mut self, start: (f32, f32), end: (f32, f32), c0: Rgba, c1: Rgba) {
        let (dx, dy) = (end.0 - start.0, end.1 - start.1);
        let len_sq = dx * dx + dy * dy;
        if len_sq <= f32::EPSILON {
            return;
        }

        let w = self.width as usize;
        self.pixels
            .par_chunks_mut(w * 4)
            .enumerate()
            .for_each(|(y, row)| {
                let py = y as f32 + 0.5;
                for (x, px) in row.chunks_mut(4).enumerate() {
                    let px_x = x as f32 + 0.5;
                    let t = ((px_x - start.0) * dx + (py - start.1) * dy) / len_sq;
                    if (0.0..=1.0).contains(&t) {
                        blend_into(px, lerp_rgba(c0, c1, t));
                    }
                }
            });
    }

    /// Composites `color` on every pixel of `bbox` whose centre satisfies `inside`.
    /// Returns the number of pixels painted.
    fn fill_where<F>(&mut self, bbox: PixelBox, color: Rgba, inside: F) -> usize
    where
        F: Fn(f32, f32) -> bool,
    {
        let mut painted = 0;
        for y in bbox.y0..=bbox.y1 {
            for x in bbox.x0..=bbox.x1 {
                if inside(x as f32 + 0.5, y as f32 + 0.5) {
                    if let Some(px) = self.pixel_mut(x, y) {
                        blend_into(px, color);
                        painted += 1;
                    }
                }
            }
        }
        painted
    }

    /// Bounding box of `points` grown by `pad`, clipped to the canvas.
    fn bounds_of<I>(&self, points: I, pad: f32) -> Option<PixelBox>
    where
        I: Iterator<Item = (f32, f32)>,
    {
        let (mut xmin, mut ymin, mut xmax, mut ymax) =
            (f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY);
        for (x, y) in points {
            xmin = xmin.min(x);
            xmax = xmax.max(x);
            ymin = ymin.min(y);
            ymax = ymax.max(y);
        }
        if !(xmin.is_finite() && ymin.is_finite() && xmax.is_finite() && ymax.is_finite()) {
            return None;
        }

        let clip = |v: f32, hi: u32| (v.floor() as i32).clamp(0, hi as i32 - 1);
        let bbox = PixelBox {
            x0: clip(xmin - pad, self.width),
            y0: clip(ymin - pad, self.height),
            x1: clip(xmax + pad, self.width),
            y1: clip(ymax + pad, self.height),
        };

        // Entirely off-canvas shapes clip to an edge row; the predicate rejects them there.
        Some(bbox)
    }

    fn pixel_mut(&mut self, x: i32, y: i32) -> Option<&mut [u8]> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some(&mut self.pixels[i..i + 4])
    }
}

/// Maps normalised `[0, 1]²` texture coordinates to pixel coordinates.
#[inline]
pub fn uv_to_pixel(u: f32, v: f32, width: u32, height: u32) -> (f32, f32) {
    (u * width as f32, v * height as f32)
}

fn even_odd_contains(poly: &[(f32, f32)], x: f32, y: f32) -> bool {
    let mut inside = false;
    let mut j = poly.len() - 1;

    for i in 0..poly.len() {
        let (xi, yi) = poly[i];
        let (xj, yj) = poly[j];

        if (yi > y) != (yj > y) {
            let x_inter = (xj - xi) * (y - yi) / (yj - yi) + xi;
            if x < x_inter {
                inside = !inside;
            }
        }
        j = i;
    }

    inside
}

fn dist_sq_to_segment(p: (f32, f32), a: (f32, f32), b: (f32, f32)) -> f32 {
    let (abx, aby) = (b.0 - a.0, b.1 - a.1);
    let (apx, apy) = (p.0 - a.0, p.1 - a.1);
    let len_sq = abx * abx + aby * aby;

    let t = if len_sq > 0.0 {
        ((apx * abx + apy * aby) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let (cx, cy) = (a.0 + t * abx - p.0, a.1 + t * aby - p.1);
    cx * cx + cy * cy
}

#[inline]
fn lerp_rgba(a: Rgba, b: Rgba, t: f32) -> Rgba {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
        a[3] + (b[3] - a[3]) * t,
    ]
}

/// Source-over on one RGBA8 pixel.
#[inline]
fn blend_into(px: &mut [u8], src: Rgba) {
    let a = src[3].clamp(0.0, 1.0);
    for c in 0..3 {
        let dst = px[c] as f32 / 255.0;
        let out = src[c].clamp(0.0, 1.0) * a + dst * (1.0 - a);
        px[c] = (out * 255.0).round() as u8;
    }
    let dst_a = px[3] as f32 / 255.0;
    px[3] = ((a + dst_a * (1.0 - a)) * 255.0).round() as u8;
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba = [1.0, 0.0, 0.0, 1.0];

    #[test]
    fn zero_sized_canvas_is_absent() {
        assert!(Canvas::new(0, 16).is_none());
        assert!(Canvas::new(16, 0).is_none());
    }

    #[test]
    fn polygon_even_odd_fill() {
        let mut c = Canvas::new(10, 10).unwrap();
        c.fill_polygon(&[(2.0, 2.0), (8.0, 2.0), (8.0, 8.0), (2.0, 8.0)], RED);
        assert_eq!(c.pixel(5, 5), [255, 0, 0, 255]);
        assert_eq!(c.pixel(1, 5), [0, 0, 0, 0]);
        assert_eq!(c.pixel(8, 5), [0, 0, 0, 0]);
    }

    #[test]
    fn degenerate_polygons_draw_nothing() {
        let mut c = Canvas::new(8, 8).unwrap();
        c.fill_polygon(&[], RED);
        c.fill_polygon(&[(1.0, 1.0), (6.0, 6.0)], RED);
        c.fill_polygon(&[(1.0, 1.0), (6.0, 1.0), (3.0, 1.0)], RED);
        assert!(c.into_rgba8().iter().all(|&b| b == 0));
    }

    #[test]
    fn off_canvas_shapes_are_clipped() {
        let mut c = Canvas::new(8, 8).unwrap();
        c.fill_polygon(&[(20.0, 20.0), (30.0, 20.0), (30.0, 30.0)], RED);
        c.fill_ellipse(Ellipse::in_rect(-40.0, -40.0, 10.0, 10.0), RED);
        assert!(c.into_rgba8().iter().all(|&b| b == 0));
    }

    #[test]
    fn translucent_blend_over_opaque() {
        let mut c = Canvas::new(2, 2).unwrap();
        c.fill([0.0, 0.0, 0.0, 1.0]);
        c.fill([1.0, 1.0, 1.0, 0.5]);
        assert_eq!(c.pixel(0, 0), [128, 128, 128, 255]);
    }

    #[test]
    fn stroke_joints_composite_once() {
        let mut c = Canvas::new(20, 20).unwrap();
        c.fill([0.0, 0.0, 0.0, 1.0]);
        c.stroke_polyline(&[(2.0, 10.0), (10.0, 10.0), (10.0, 2.0)], 3.0, [1.0, 1.0, 1.0, 0.5]);
        assert_eq!(c.pixel(9, 9), [128, 128, 128, 255]);
        assert_eq!(c.pixel(5, 10), [128, 128, 128, 255]);
        assert_eq!(c.pixel(17, 17), [0, 0, 0, 255]);
    }

    #[test]
    fn tiny_ellipse_lights_centre_pixel() {
        let mut c = Canvas::new(8, 8).unwrap();
        c.fill_ellipse(Ellipse::centered(3.0, 3.0, 0.4), RED);
        assert_eq!(c.pixel(3, 3), [255, 0, 0, 255]);
    }

    #[test]
    fn gradient_band_only() {
        let mut c = Canvas::new(10, 1).unwrap();
        c.linear_gradient((2.0, 0.0), (8.0, 0.0), [0.0, 0.0, 0.0, 1.0], [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(c.pixel(0, 0)[3], 0);
        assert_eq!(c.pixel(9, 0)[3], 0);
        assert!(c.pixel(3, 0)[0] < c.pixel(7, 0)[0]);
    }
}
