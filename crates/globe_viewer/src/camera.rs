use glam::{Mat4, Vec3, Vec4Swizzles};
use globe_core::{geo::cartesian_to_geo, GeoCoordinate};
use std::{f32::consts::FRAC_PI_3, time::Duration};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

/// Converts OpenGL clip space (Z in [-1, 1]) to WebGPU clip space (Z in [0, 1]).
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Mat4 = Mat4::from_cols_array(&[
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
]);

const MIN_DISTANCE: f32 = 1.2;
const MAX_DISTANCE: f32 = 20.0;

/// Orbit camera around the globe centre, Y up.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub target: Vec3,
    pub distance: f32,
    /// Rotation about +Y, radians. Zero looks down -Z from +Z.
    pub azimuth: f32,
    /// Angle above the equatorial plane, radians.
    pub elevation: f32,
    pub fovy: f32,
    pub aspect: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl Camera {
    /// Eye at (0, 0, 3) looking at the origin.
    pub fn new(aspect: f32) -> Self {
        Self {
            target: Vec3::ZERO,
            distance: 3.0,
            azimuth: 0.0,
            elevation: 0.0,
            fovy: FRAC_PI_3,
            aspect,
            znear: 0.1,
            zfar: 100.0,
        }
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
    }

    pub fn eye(&self) -> Vec3 {
        let (sin_az, cos_az) = self.azimuth.sin_cos();
        let (sin_el, cos_el) = self.elevation.sin_cos();
        self.target + self.distance * Vec3::new(cos_el * sin_az, sin_el, cos_el * cos_az)
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), self.target, Vec3::Y)
    }

    pub fn proj(&self) -> Mat4 {
        OPENGL_TO_WGPU_MATRIX * Mat4::perspective_rh_gl(self.fovy, self.aspect, self.znear, self.zfar)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.proj() * self.view()
    }

    /// World-space ray through a pixel. Returns `(origin, unit direction)`.
    pub fn ray(&self, cursor: (f64, f64), width: u32, height: u32) -> (Vec3, Vec3) {
        let ndc_x = 2.0 * cursor.0 as f32 / width.max(1) as f32 - 1.0;
        let ndc_y = 1.0 - 2.0 * cursor.1 as f32 / height.max(1) as f32;

        ray_through(&self.view_proj().inverse(), ndc_x, ndc_y)
    }
}

/// Unprojects an NDC position through an inverse view-projection into a world-space ray.
pub fn ray_through(inv_view_proj: &Mat4, ndc_x: f32, ndc_y: f32) -> (Vec3, Vec3) {
    let near = *inv_view_proj * glam::Vec4::new(ndc_x, ndc_y, 0.0, 1.0);
    let far = *inv_view_proj * glam::Vec4::new(ndc_x, ndc_y, 1.0, 1.0);
    let (near, far) = (near.xyz() / near.w, far.xyz() / far.w);

    (near, (far - near).normalize_or_zero())
}

/// Nearest intersection of a ray with a sphere at the origin, as a ray parameter.
pub fn ray_sphere(origin: Vec3, dir: Vec3, radius: f32) -> Option<f32> {
    let b = origin.dot(dir);
    let c = origin.length_squared() - radius * radius;
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let sq = disc.sqrt();
    [-b - sq, -b + sq].into_iter().find(|&t| t >= 0.0)
}

/// Geographic position under the cursor on a unit globe spun by `model`.
pub fn pick(camera: &Camera, model: Mat4, cursor: (f64, f64), width: u32, height: u32) -> Option<GeoCoordinate> {
    let (origin, dir) = camera.ray(cursor, width, height);
    let t = ray_sphere(origin, dir, 1.0)?;
    let local = model.inverse().transform_point3(origin + dir * t);

    let (lat, lon, _) = cartesian_to_geo(local.as_dvec3(), 1.0);
    Some(GeoCoordinate::new(lat, lon, 0.0))
}

/// Accumulated globe rotation about +Y.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobeSpin {
    pub angle: f32,
    /// Radians per frame, or per 1/60 s when `scale_by_dt` is set.
    pub speed: f32,
    pub scale_by_dt: bool,
}

impl GlobeSpin {
    pub fn new(speed: f32, scale_by_dt: bool) -> Self {
        Self { angle: 0.0, speed, scale_by_dt }
    }

    pub fn advance(&mut self, dt: Duration) {
        let step = if self.scale_by_dt {
            self.speed * dt.as_secs_f32() * 60.0
        } else {
            self.speed
        };
        self.angle = (self.angle + step).rem_euclid(std::f32::consts::TAU);
    }

    pub fn model(&self) -> Mat4 {
        Mat4::from_rotation_y(self.angle)
    }
}

/// Mouse orbit and wheel zoom. A press and release without dragging is a click.
#[derive(Debug, Default)]
pub struct CameraController {
    mouse_down: bool,
    dragged: bool,
    last_mouse: Option<(f64, f64)>,
}

impl CameraController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates the camera; returns the cursor position of a completed click.
    pub fn handle_event(&mut self, event: &WindowEvent, camera: &mut Camera) -> Option<(f64, f64)> {
        match event {
            WindowEvent::MouseInput { button: MouseButton::Left, state, .. } => {
                let pressed = *state == ElementState::Pressed;
                let click = (!pressed && self.mouse_down && !self.dragged)
                    .then_some(self.last_mouse)
                    .flatten();
                self.mouse_down = pressed;
                self.dragged = false;
                return click;
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.handle_cursor_orbit((position.x, position.y), camera);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 120.0,
                };
                self.handle_scroll(scroll, camera);
            }
            _ => {}
        }
        None
    }

    fn handle_scroll(&mut self, delta: f32, camera: &mut Camera) {
        camera.distance = (camera.distance * 1.1f32.powf(-delta)).clamp(MIN_DISTANCE, MAX_DISTANCE);
    }

    fn handle_cursor_orbit(&mut self, xy: (f64, f64), camera: &mut Camera) {
        if let (Some(last), true) = (self.last_mouse, self.mouse_down) {
            let dx = ((xy.0 - last.0) * 0.005) as f32;
            let dy = ((xy.1 - last.1) * 0.005) as f32;
            if dx != 0.0 || dy != 0.0 {
                self.dragged = true;
            }

            camera.azimuth -= dx;
            // Stop short of the poles so look_at keeps a valid up vector.
            camera.elevation = (camera.elevation + dy).clamp(-1.5, 1.5);
        }
        self.last_mouse = Some(xy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_eye_and_projection() {
        let cam = Camera::new(16.0 / 9.0);
        assert!((cam.eye() - Vec3::new(0.0, 0.0, 3.0)).length() < 1e-6);

        // The globe centre projects to the middle of the screen at depth in (0, 1).
        let clip = cam.view_proj() * glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.xyz() / clip.w;
        assert!(ndc.x.abs() < 1e-6 && ndc.y.abs() < 1e-6);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn centre_ray_hits_near_side() {
        let cam = Camera::new(1.0);
        let (o, d) = cam.ray((50.0, 50.0), 100, 100);
        let t = ray_sphere(o, d, 1.0).unwrap();
        assert!(((o + d * t) - Vec3::new(0.0, 0.0, 1.0)).length() < 1e-3);
        assert!(ray_sphere(o, Vec3::X, 1.0).is_none());
    }

    #[test]
    fn pick_undoes_globe_spin() {
        let cam = Camera::new(1.0);
        let hit = pick(&cam, Mat4::IDENTITY, (50.0, 50.0), 100, 100).unwrap();
        assert!(hit.latitude.abs() < 0.1 && hit.longitude.abs() < 0.1);

        // Spinning the globe by +90° about Y brings longitude -90 under the eye.
        let spun = Mat4::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let hit = pick(&cam, spun, (50.0, 50.0), 100, 100).unwrap();
        assert!((hit.longitude + 90.0).abs() < 0.1, "{hit:?}");

        assert!(pick(&cam, Mat4::IDENTITY, (0.0, 0.0), 100, 100).is_none());
    }

    #[test]
    fn spin_steps_per_frame_unless_scaled() {
        let mut fixed = GlobeSpin::new(0.003, false);
        fixed.advance(Duration::from_millis(100));
        assert!((fixed.angle - 0.003).abs() < 1e-7);

        let mut scaled = GlobeSpin::new(0.003, true);
        scaled.advance(Duration::from_millis(500));
        assert!((scaled.angle - 0.09).abs() < 1e-6);
    }
}
