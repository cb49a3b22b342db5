//! Earth mesh - a unit UV sphere shaded procedurally

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct EarthVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl EarthVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<EarthVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 12,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Generate a unit sphere. Returns (vertices, indices).
pub fn generate_earth_sphere(segments: u32, rings: u32) -> (Vec<EarthVertex>, Vec<u32>) {
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for ring in 0..=rings {
        let phi = std::f32::consts::PI * ring as f32 / rings as f32;
        let y = phi.cos();
        let ring_radius = phi.sin();

        for seg in 0..=segments {
            let theta = 2.0 * std::f32::consts::PI * seg as f32 / segments as f32;
            let x = ring_radius * theta.cos();
            let z = ring_radius * theta.sin();

            let position = Vec3::new(x, y, z);
            vertices.push(EarthVertex {
                position: position.to_array(),
                normal: position.normalize().to_array(),
            });
        }
    }

    for ring in 0..rings {
        for seg in 0..segments {
            let current = ring * (segments + 1) + seg;
            let next = current + segments + 1;

            indices.push(current);
            indices.push(next);
            indices.push(current + 1);

            indices.push(current + 1);
            indices.push(next);
            indices.push(next + 1);
        }
    }

    (vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_vertices_on_unit_radius() {
        let (vertices, indices) = generate_earth_sphere(16, 8);
        assert_eq!(vertices.len(), 17 * 9);
        assert_eq!(indices.len() as u32, 16 * 8 * 6);
        for v in &vertices {
            let r = Vec3::from_array(v.position).length();
            assert!((r - 1.0).abs() < 1e-5);
        }
        for &i in &indices {
            assert!((i as usize) < vertices.len());
        }
    }
}
