//! Satellite point collection - the renderer-visible sink
//!
//! One instance slot per registered satellite, allocated once at creation
//! with its color and size fixed (altitude bands). The consumption step
//! writes positions into the slots in place each frame; the wgpu scene
//! uploads the same storage, shared behind a lock, so no per-frame vectors
//! are built.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use parking_lot::RwLock;

use crate::propagation::{PositionSample, SatelliteMetadata};

/// Render unit: one Earth radius.
pub const EARTH_RADIUS_KM: f64 = 6371.0;
pub const EARTH_RADIUS_M: f32 = (EARTH_RADIUS_KM * 1000.0) as f32;

/// Instance data for each satellite point
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct PointInstance {
    /// Position in world space (Earth radii)
    pub position: [f32; 3],
    /// Color fixed at creation (RGBA)
    pub color: [f32; 4],
    /// Size multiplier
    pub size: f32,
}

impl PointInstance {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<PointInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 12,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: 28,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32,
                },
            ],
        }
    }
}

/// Color for a satellite based on its mean altitude (km)
pub fn altitude_to_color(altitude_km: f64) -> [f32; 4] {
    let alt = altitude_km as f32;

    if alt < 500.0 {
        // Very low LEO: deep blue
        [0.2, 0.4, 1.0, 1.0]
    } else if alt < 2000.0 {
        // LEO: blue to cyan
        let t = (alt - 500.0) / 1500.0;
        [0.2, 0.4 + 0.6 * t, 1.0, 1.0]
    } else if alt < 20000.0 {
        // MEO lower: cyan to green
        let t = (alt - 2000.0) / 18000.0;
        [0.2 * (1.0 - t), 1.0, 1.0 - t, 1.0]
    } else if alt < 35000.0 {
        // MEO upper: green to yellow
        let t = (alt - 20000.0) / 15000.0;
        [t, 1.0, 0.0, 1.0]
    } else if alt < 40000.0 {
        // GEO region: yellow
        [1.0, 1.0, 0.0, 1.0]
    } else {
        // HEO: orange to red
        let t = ((alt - 40000.0) / 50000.0).min(1.0);
        [1.0, 1.0 - 0.5 * t, 0.0, 1.0]
    }
}

/// Renderer-visible point collection.
pub struct PointCollection {
    instances: Arc<RwLock<Vec<PointInstance>>>,
    transform: Mat4,
}

impl PointCollection {
    /// Allocate one slot per satellite. Colors and sizes are fixed here and
    /// never touched again.
    pub fn new(metadata: &[SatelliteMetadata]) -> Self {
        let instances = metadata
            .iter()
            .map(|m| PointInstance {
                position: [0.0; 3],
                color: altitude_to_color(m.mean_altitude_km),
                size: 1.0,
            })
            .collect();

        Self {
            instances: Arc::new(RwLock::new(instances)),
            transform: Mat4::IDENTITY,
        }
    }

    pub fn len(&self) -> usize {
        self.instances.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Uniform transform applied to the whole collection by the scene.
    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    /// Shared storage handed to the scene for uploading.
    pub fn shared_instances(&self) -> Arc<RwLock<Vec<PointInstance>>> {
        Arc::clone(&self.instances)
    }

    /// Write current-buffer samples (meters) into the slots (Earth radii),
    /// in place. Sample index i maps to slot i.
    pub fn write_positions(&self, samples: &[PositionSample]) {
        let mut instances = self.instances.write();
        for (slot, sample) in instances.iter_mut().zip(samples) {
            let p = sample.position / EARTH_RADIUS_M;
            slot.position = p.to_array();
        }
    }

    /// Position of slot `index` in render units.
    pub fn position(&self, index: usize) -> Option<Vec3> {
        self.instances
            .read()
            .get(index)
            .map(|i| Vec3::from_array(i.position))
    }
}
