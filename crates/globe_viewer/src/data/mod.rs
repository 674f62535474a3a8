// src/data/mod.rs
//! GPU-side data for the globe viewer:
//! - buffer layouts and uniform structs,
//! - marker instance layers, rebuilt wholesale whenever feature data changes.

pub mod instances;
pub mod types;

pub use self::instances::{InstanceLayer, InstanceLayers};
pub use self::types::{GlobeUniforms, MarkerUniform, MeshGpu, StarVertex};
