//! Static geometry: the UV-sphere globe and the small marker shapes drawn per feature.

use crate::error::MeshError;
use std::f32::consts::PI;

/// Interleaved vertex shared by the globe and marker pipelines.
/// Must match `VertexIn` in the earth and marker WGSL.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

const _: [(); 32] = [(); core::mem::size_of::<Vertex>()];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Latitude/longitude sphere centred on the origin.
///
/// Stacks run from the south pole (φ = 0, -Y) to the north pole (φ = π); slices sweep
/// θ ∈ [0, 2π] westwards from the antimeridian, so every vertex agrees with
/// [`geo_to_cartesian`](crate::geo::geo_to_cartesian) at the geographic position its UV
/// maps to. The seam column is duplicated so UVs wrap cleanly. Triangles are
/// counter-clockwise when viewed from outside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereMeshBuilder {
    pub radius: f32,
    pub stacks: u32,
    pub slices: u32,
}

impl Default for SphereMeshBuilder {
    fn default() -> Self {
        Self { radius: 1.0, stacks: 100, slices: 100 }
    }
}

impl SphereMeshBuilder {
    pub fn new(radius: f32, stacks: u32, slices: u32) -> Self {
        Self { radius, stacks, slices }
    }

    pub fn validate(&self) -> Result<(), MeshError> {
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(MeshError::InvalidRadius(self.radius));
        }
        if self.stacks < 1 {
            return Err(MeshError::TooFewStacks(self.stacks));
        }
        if self.slices < 1 {
            return Err(MeshError::TooFewSlices(self.slices));
        }

        let (s, n) = (self.stacks as u64, self.slices as u64);
        if (s + 1) * (n + 1) > u32::MAX as u64 || s * n * 6 > u32::MAX as u64 {
            return Err(MeshError::IndexOverflow { stacks: self.stacks, slices: self.slices });
        }

        Ok(())
    }

    pub fn build(&self) -> Result<MeshData, MeshError> {
        self.validate()?;

        let (stacks, slices) = (self.stacks, self.slices);
        let mut vertices = Vec::with_capacity(((stacks + 1) * (slices + 1)) as usize);
        let mut indices = Vec::with_capacity((stacks * slices * 6) as usize);

        for stack in 0..=stacks {
            let phi = PI * stack as f32 / stacks as f32;
            let (sin_phi, cos_phi) = phi.sin_cos();

            for slice in 0..=slices {
                let theta = 2.0 * PI * slice as f32 / slices as f32;
                let (sin_theta, cos_theta) = theta.sin_cos();

                let n = [sin_phi * sin_theta, -cos_phi, -sin_phi * cos_theta];
                vertices.push(Vertex {
                    position: [n[0] * self.radius, n[1] * self.radius, n[2] * self.radius],
                    normal: n,
                    uv: [
                        1.0 - slice as f32 / slices as f32,
                        1.0 - stack as f32 / stacks as f32,
                    ],
                });
            }
        }

        let row = slices + 1;
        for stack in 0..stacks {
            for slice in 0..slices {
                let first = stack * row + slice;
                let second = first + row;

                indices.extend_from_slice(&[first, second, first + 1]);
                indices.extend_from_slice(&[second, second + 1, first + 1]);
            }
        }

        Ok(MeshData { vertices, indices })
    }
}

/// Builds a sphere mesh; shorthand for [`SphereMeshBuilder::build`].
pub fn build_sphere(radius: f32, stacks: u32, slices: u32) -> Result<MeshData, MeshError> {
    SphereMeshBuilder::new(radius, stacks, slices).build()
}

/// Marker silhouettes. Local +Y is the surface normal; the base sits on y = 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerShape {
    Pyramid,
    Box,
    Sphere,
}

impl MarkerShape {
    /// Unit-sized geometry; the instance transform and base scale size it on the globe.
    pub fn mesh(self) -> MeshData {
        match self {
            MarkerShape::Pyramid => pyramid(0.5, 2.0),
            MarkerShape::Box => cuboid(0.5, 1.5),
            MarkerShape::Sphere => {
                let mut m = build_sphere(1.0, 8, 12).unwrap_or_default();
                for v in &mut m.vertices {
                    v.position[1] += 1.0;
                }
                m
            }
        }
    }
}

fn push_face(mesh: &mut MeshData, corners: &[[f32; 3]], normal: [f32; 3]) {
    let base = mesh.vertices.len() as u32;
    for &position in corners {
        mesh.vertices.push(Vertex { position, normal, uv: [0.0, 0.0] });
    }
    for i in 1..corners.len() as u32 - 1 {
        mesh.indices.extend_from_slice(&[base, base + i, base + i + 1]);
    }
}

fn face_normal(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> [f32; 3] {
    let u = glam::Vec3::from(b) - glam::Vec3::from(a);
    let v = glam::Vec3::from(c) - glam::Vec3::from(a);
    u.cross(v).normalize_or_zero().into()
}

fn pyramid(half: f32, height: f32) -> MeshData {
    let mut m = MeshData::default();
    let apex = [0.0, height, 0.0];
    let base = [
        [-half, 0.0, -half],
        [half, 0.0, -half],
        [half, 0.0, half],
        [-half, 0.0, half],
    ];

    for i in 0..4 {
        let (a, b) = (base[i], base[(i + 1) % 4]);
        push_face(&mut m, &[a, apex, b], face_normal(a, apex, b));
    }
    push_face(&mut m, &base, [0.0, -1.0, 0.0]);
    m
}

fn cuboid(half: f32, height: f32) -> MeshData {
    let mut m = MeshData::default();
    let (h, y) = (half, height);

    push_face(&mut m, &[[-h, y, -h], [-h, y, h], [h, y, h], [h, y, -h]], [0.0, 1.0, 0.0]);
    push_face(&mut m, &[[-h, 0.0, -h], [h, 0.0, -h], [h, 0.0, h], [-h, 0.0, h]], [0.0, -1.0, 0.0]);
    push_face(&mut m, &[[-h, 0.0, h], [h, 0.0, h], [h, y, h], [-h, y, h]], [0.0, 0.0, 1.0]);
    push_face(&mut m, &[[h, 0.0, -h], [-h, 0.0, -h], [-h, y, -h], [h, y, -h]], [0.0, 0.0, -1.0]);
    push_face(&mut m, &[[h, 0.0, h], [h, 0.0, -h], [h, y, -h], [h, y, h]], [1.0, 0.0, 0.0]);
    push_face(&mut m, &[[-h, 0.0, -h], [-h, 0.0, h], [-h, y, h], [-h, y, -h]], [-1.0, 0.0, 0.0]);
    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rejects_degenerate_parameters() {
        assert_eq!(build_sphere(1.0, 0, 10), Err(MeshError::TooFewStacks(0)));
        assert_eq!(build_sphere(1.0, 10, 0), Err(MeshError::TooFewSlices(0)));
        assert_eq!(build_sphere(0.0, 10, 10), Err(MeshError::InvalidRadius(0.0)));
        assert!(matches!(build_sphere(f32::NAN, 10, 10), Err(MeshError::InvalidRadius(_))));
        assert!(matches!(
            build_sphere(1.0, 100_000, 100_000),
            Err(MeshError::IndexOverflow { .. })
        ));
    }

    #[test]
    fn minimal_sphere_layout() {
        let m = build_sphere(2.0, 1, 1).unwrap();
        assert_eq!(m.vertices.len(), 4);
        assert_eq!(m.indices, vec![0, 2, 1, 2, 3, 1]);
        assert_eq!(m.vertices[0].uv, [1.0, 1.0]);
        assert_eq!(m.vertices[3].uv, [0.0, 0.0]);
        assert!((m.vertices[0].position[1] + 2.0).abs() < 1e-6);
    }

    #[test]
    fn vertices_agree_with_geographic_placement() {
        let m = build_sphere(1.0, 12, 24).unwrap();
        for v in &m.vertices {
            let (lat, lon) = crate::geo::uv_to_geo(v.uv[0] as f64, v.uv[1] as f64);
            let expected = crate::geo::geo_to_cartesian(lat, lon, 0.0, 1.0).as_vec3();
            assert!((glam::Vec3::from(v.position) - expected).length() < 1e-5, "{v:?}");
        }
    }

    #[test]
    fn triangles_face_outwards() {
        let m = build_sphere(1.0, 6, 8).unwrap();
        for tri in m.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| glam::Vec3::from(m.vertices[i as usize].position));
            let n = (b - a).cross(c - a);
            // Pole fans have one collapsed edge.
            if n.length() > 1e-6 {
                assert!(n.dot(a + b + c) > 0.0);
            }
        }
    }

    #[test]
    fn seam_columns_share_positions() {
        let m = build_sphere(1.0, 8, 16).unwrap();
        let row = 17;
        for stack in 0..=8 {
            let a = glam::Vec3::from(m.vertices[stack * row].position);
            let b = glam::Vec3::from(m.vertices[stack * row + 16].position);
            assert!((a - b).length() < 1e-5);
        }
    }

    #[test]
    fn build_is_deterministic() {
        let a = build_sphere(1.0, 37, 53).unwrap();
        let b = build_sphere(1.0, 37, 53).unwrap();
        assert_eq!(a.vertex_bytes(), b.vertex_bytes());
        assert_eq!(a.index_bytes(), b.index_bytes());
    }

    #[test]
    fn marker_meshes_are_well_formed() {
        for shape in [MarkerShape::Pyramid, MarkerShape::Box, MarkerShape::Sphere] {
            let m = shape.mesh();
            assert!(!m.indices.is_empty());
            assert_eq!(m.indices.len() % 3, 0);
            assert!(m.indices.iter().all(|&i| (i as usize) < m.vertices.len()));
            assert!(m.vertices.iter().all(|v| v.position[1] >= -1e-5));
        }
    }

    proptest! {
        #[test]
        fn counts_and_radius(r in 0.01f32..100.0, s in 1u32..48, n in 1u32..48) {
            let m = build_sphere(r, s, n).unwrap();
            prop_assert_eq!(m.vertices.len(), ((s + 1) * (n + 1)) as usize);
            prop_assert_eq!(m.indices.len(), (s * n * 6) as usize);

            for v in &m.vertices {
                let len = glam::Vec3::from(v.position).length();
                prop_assert!((len - r).abs() <= r * 1e-5);
                let nl = glam::Vec3::from(v.normal).length();
                prop_assert!((nl - 1.0).abs() < 1e-5);
                prop_assert!((0.0..=1.0).contains(&v.uv[0]) && (0.0..=1.0).contains(&v.uv[1]));
            }
            prop_assert!(m.indices.iter().all(|&i| (i as usize) < m.vertices.len()));
        }
    }
}
