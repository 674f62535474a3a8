// src/lib.rs
//! Procedurally textured, rotating 3-D earth.
//!
//! The GPU renderer (wgpu) draws the globe, a star field and instanced feature
//! markers. A fallback controller decides per session whether that renderer or a
//! software ray-caster is shown. Textures, marker data and network fetches are
//! produced on background threads and handed to the render thread over channels.

pub mod app;
pub mod camera;
pub mod config;
pub mod data;
pub mod fallback;
pub mod net;
pub mod renderer;
pub mod worker;
