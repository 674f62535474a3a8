// src/lib.rs
//! CPU side of the procedural globe.
//!
//! Everything here is deterministic for a given seed and free of GPU or window
//! dependencies: geodesy, the UV-sphere mesh, the four synthesized earth maps,
//! geo-point preprocessing and per-feature instance transforms.

pub mod error;
pub mod geo;
pub mod instancing;
pub mod mesh;
pub mod model;
pub mod preprocess;
pub mod texture;

pub use self::error::MeshError;
pub use self::instancing::{InstanceBatch, InstanceTransform, InstanceTransformBuilder, MarkerStyle};
pub use self::mesh::{MarkerShape, MeshData, SphereMeshBuilder, Vertex};
pub use self::model::{BoundingBox, FeatureKind, GeoCoordinate, GeoFeature, GeoPoint, WeatherData};
pub use self::preprocess::{preprocess, PreprocessReport, Preprocessor};
pub use self::texture::{PixelFormat, TextureAsset, TextureKind, TextureSet, TextureSynthesizer};

/// Seed derived from the wall clock, for runs that do not ask for reproducibility.
pub fn clock_seed() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
