//! Per-feature model matrices for instanced marker drawing.

use crate::mesh::MarkerShape;
use crate::model::{FeatureKind, GeoCoordinate, GeoFeature, GeoPoint};
use glam::{Mat4, Quat, Vec3};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::f32::consts::TAU;

/// Altitude at which data points float above the surface, in globe radii.
pub const DATA_POINT_LIFT: f64 = 0.01;

/// One instance's model matrix, column-major (`cols[0]` is the first column).
/// Must match the four `vec4` instance attributes in the marker WGSL.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceTransform {
    pub model: [[f32; 4]; 4],
}

const _: [(); 64] = [(); core::mem::size_of::<InstanceTransform>()];

impl InstanceTransform {
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.model)
    }
}

impl From<Mat4> for InstanceTransform {
    fn from(m: Mat4) -> Self {
        Self { model: m.to_cols_array_2d() }
    }
}

/// How a feature kind looks on the globe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerStyle {
    pub shape: MarkerShape,
    /// Size of the unit marker mesh relative to the globe radius.
    pub base_scale: f32,
    /// Random per-instance scale factor bounds, inclusive.
    pub scale_range: (f32, f32),
    pub color: [f32; 4],
}

impl MarkerStyle {
    pub fn for_kind(kind: FeatureKind) -> Self {
        match kind {
            FeatureKind::Vegetation => Self {
                shape: MarkerShape::Pyramid,
                base_scale: 0.002,
                scale_range: (0.8, 1.2),
                color: [0.1, 0.6, 0.1, 1.0],
            },
            FeatureKind::Building => Self {
                shape: MarkerShape::Box,
                base_scale: 0.003,
                scale_range: (0.9, 1.5),
                color: [0.7, 0.7, 0.7, 1.0],
            },
            FeatureKind::Landmark => Self {
                shape: MarkerShape::Sphere,
                base_scale: 0.005,
                scale_range: (1.0, 1.0),
                color: [1.0, 0.84, 0.0, 1.0],
            },
            FeatureKind::General => Self {
                shape: MarkerShape::Sphere,
                base_scale: 0.004,
                scale_range: (0.8, 1.2),
                color: [1.0, 0.1, 0.1, 1.0],
            },
        }
    }
}

/// Transforms for one feature kind, uploaded as a single instance buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceBatch {
    pub kind: FeatureKind,
    pub transforms: Vec<InstanceTransform>,
}

impl InstanceBatch {
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

/// Seeded source of marker transforms on a sphere of `radius`.
pub struct InstanceTransformBuilder {
    rng: StdRng,
    radius: f64,
}

impl InstanceTransformBuilder {
    pub fn new(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed), radius: 1.0 }
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    /// Translate ∘ rotate ∘ scale for each coordinate.
    ///
    /// The rotation stands the marker's +Y on the surface normal, then spins it about
    /// that normal by a uniform random angle. The scale is the kind's base scale times
    /// a random factor from its range.
    pub fn build(&mut self, kind: FeatureKind, coords: &[GeoCoordinate]) -> Vec<InstanceTransform> {
        let style = MarkerStyle::for_kind(kind);
        let (lo, hi) = style.scale_range;

        let draws: Vec<(f32, f32)> = coords
            .iter()
            .map(|_| {
                let angle = self.rng.gen_range(0.0..TAU);
                let factor = if hi > lo { self.rng.gen_range(lo..=hi) } else { lo };
                (angle, factor)
            })
            .collect();

        let radius = self.radius;
        coords
            .par_iter()
            .zip(draws.par_iter())
            .map(|(c, &(angle, factor))| {
                let position = c.to_cartesian(radius).as_vec3();
                let up = position.try_normalize().unwrap_or(Vec3::Y);

                let rotation = Quat::from_axis_angle(up, angle) * Quat::from_rotation_arc(Vec3::Y, up);
                let scale = Vec3::splat(style.base_scale * factor);

                InstanceTransform::from(Mat4::from_scale_rotation_translation(scale, rotation, position))
            })
            .collect()
    }

    pub fn build_batch(&mut self, kind: FeatureKind, coords: &[GeoCoordinate]) -> InstanceBatch {
        InstanceBatch { kind, transforms: self.build(kind, coords) }
    }

    /// One batch per kind present in `features`, in kind order.
    pub fn build_feature_batches(&mut self, features: &[GeoFeature]) -> Vec<InstanceBatch> {
        group_by_kind(features)
            .into_iter()
            .map(|(kind, coords)| self.build_batch(kind, &coords))
            .collect()
    }
}

pub fn group_by_kind(features: &[GeoFeature]) -> BTreeMap<FeatureKind, Vec<GeoCoordinate>> {
    let mut groups: BTreeMap<FeatureKind, Vec<GeoCoordinate>> = BTreeMap::new();
    for f in features {
        groups.entry(f.kind).or_default().push(f.coordinate);
    }
    groups
}

/// Lifts data points just above the surface. `elevation_unit` converts the point's
/// elevation into globe radii (use `1 / wgs84::A` for meters).
pub fn data_point_coordinates(points: &[GeoPoint], elevation_unit: f64) -> Vec<GeoCoordinate> {
    points
        .iter()
        .map(|p| {
            GeoCoordinate::new(
                p.latitude,
                p.longitude,
                DATA_POINT_LIFT + p.elevation * elevation_unit,
            )
        })
        .collect()
}

/// Random placeholder layers: 1000 trees, 500 buildings, 100 landmarks.
pub fn demo_features(seed: u64) -> Vec<(FeatureKind, Vec<GeoCoordinate>)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut scatter = |n: usize, lat: f64, lon: f64| -> Vec<GeoCoordinate> {
        (0..n)
            .map(|_| {
                GeoCoordinate::new(rng.gen_range(-lat..=lat), rng.gen_range(-lon..=lon), 0.01)
            })
            .collect()
    };

    vec![
        (FeatureKind::Vegetation, scatter(1000, 80.0, 180.0)),
        (FeatureKind::Building, scatter(500, 60.0, 170.0)),
        (FeatureKind::Landmark, scatter(100, 70.0, 175.0)),
    ]
}

/// 100 random raw samples with small positive elevations.
pub fn demo_points(seed: u64) -> Vec<GeoPoint> {
    let mut rng = StdRng::seed_from_u64(seed ^ 0xD1B5_4A32_D192_ED03);
    (0..100)
        .map(|_| {
            GeoPoint::new(
                rng.gen_range(-80.0..=80.0),
                rng.gen_range(-180.0..=180.0),
                rng.gen_range(0.0..=0.05),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords() -> Vec<GeoCoordinate> {
        demo_features(3).into_iter().flat_map(|(_, c)| c).take(300).collect()
    }

    #[test]
    fn rotation_block_is_scaled_orthonormal() {
        let mut b = InstanceTransformBuilder::new(11);
        for kind in FeatureKind::ALL {
            let style = MarkerStyle::for_kind(kind);
            for t in b.build(kind, &coords()) {
                let m = t.matrix();
                let (x, y, z) = (m.x_axis.truncate(), m.y_axis.truncate(), m.z_axis.truncate());

                let s = x.length();
                assert!((y.length() - s).abs() < 1e-6 && (z.length() - s).abs() < 1e-6);
                assert!(x.dot(y).abs() < 1e-6 * s.max(1.0));
                assert!(y.dot(z).abs() < 1e-6 * s.max(1.0));
                assert!(x.dot(z).abs() < 1e-6 * s.max(1.0));

                let factor = s / style.base_scale;
                assert!(factor >= style.scale_range.0 - 1e-4 && factor <= style.scale_range.1 + 1e-4);
                assert_eq!(m.w_axis.w, 1.0);
            }
        }
    }

    #[test]
    fn translation_sits_at_radius_plus_altitude() {
        let cs = coords();
        let out = InstanceTransformBuilder::new(5).build(FeatureKind::Building, &cs);
        for (c, t) in cs.iter().zip(&out) {
            let p = t.matrix().w_axis.truncate();
            assert!((p.length() - (1.0 + c.altitude as f32)).abs() < 1e-5);

            // Marker +Y points away from the centre.
            let up = t.matrix().y_axis.truncate().normalize();
            assert!((up - p.normalize()).length() < 1e-4);
        }
    }

    #[test]
    fn landmark_scale_is_fixed() {
        let out = InstanceTransformBuilder::new(1).build(FeatureKind::Landmark, &coords());
        for t in out {
            assert!((t.matrix().x_axis.truncate().length() - 0.005).abs() < 1e-7);
        }
    }

    #[test]
    fn seeded_builds_repeat_and_vary() {
        let cs = coords();
        let a = InstanceTransformBuilder::new(9).build(FeatureKind::Vegetation, &cs);
        let b = InstanceTransformBuilder::new(9).build(FeatureKind::Vegetation, &cs);
        let c = InstanceTransformBuilder::new(10).build(FeatureKind::Vegetation, &cs);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn features_grouped_into_batches() {
        let f = |id, kind| GeoFeature {
            id,
            kind,
            coordinate: GeoCoordinate::new(40.7, -74.0, 0.0),
            properties: Default::default(),
        };
        let feats = [
            f(1, FeatureKind::Landmark),
            f(2, FeatureKind::Building),
            f(3, FeatureKind::Building),
        ];

        let batches = InstanceTransformBuilder::new(0).build_feature_batches(&feats);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].kind, FeatureKind::Building);
        assert_eq!(batches[0].transforms.len(), 2);
        assert_eq!(batches[1].kind, FeatureKind::Landmark);
    }

    #[test]
    fn demo_layers_have_expected_sizes() {
        let layers = demo_features(0);
        let sizes: Vec<_> = layers.iter().map(|(k, c)| (*k, c.len())).collect();
        assert_eq!(
            sizes,
            vec![
                (FeatureKind::Vegetation, 1000),
                (FeatureKind::Building, 500),
                (FeatureKind::Landmark, 100)
            ]
        );
        assert!(layers[1].1.iter().all(|c| c.latitude.abs() <= 60.0));
        assert_eq!(demo_points(0).len(), 100);
    }

    #[test]
    fn empty_input_builds_nothing() {
        assert!(InstanceTransformBuilder::new(0).build(FeatureKind::General, &[]).is_empty());
    }
}
