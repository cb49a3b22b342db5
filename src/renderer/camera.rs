//! Orbital viewport camera

use glam::{Mat4, Vec3};

/// Camera orbiting a target point (Earth center by default)
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    pub target: Vec3,
    /// Distance from target in Earth radii
    pub distance: f32,
    /// Rotation around Y in radians
    pub azimuth: f32,
    /// Elevation above the XZ plane in radians
    pub elevation: f32,
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            distance: 4.0,
            azimuth: 0.0,
            elevation: 0.3,
            fov: 45.0_f32.to_radians(),
            near: 0.01,
            far: 100.0,
        }
    }
}

impl OrbitCamera {
    pub fn position(&self) -> Vec3 {
        let x = self.distance * self.elevation.cos() * self.azimuth.sin();
        let y = self.distance * self.elevation.sin();
        let z = self.distance * self.elevation.cos() * self.azimuth.cos();
        self.target + Vec3::new(x, y, z)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self, aspect_ratio: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov, aspect_ratio, self.near, self.far)
    }

    pub fn view_projection_matrix(&self, aspect_ratio: f32) -> Mat4 {
        self.projection_matrix(aspect_ratio) * self.view_matrix()
    }

    pub fn orbit(&mut self, delta_x: f32, delta_y: f32) {
        self.azimuth += delta_x * 0.01;
        self.elevation = (self.elevation + delta_y * 0.01).clamp(
            -std::f32::consts::FRAC_PI_2 + 0.01,
            std::f32::consts::FRAC_PI_2 - 0.01,
        );
    }

    pub fn zoom(&mut self, delta: f32) {
        self.distance = (self.distance * (1.0 - delta * 0.1)).clamp(1.1, 50.0);
    }
}

/// Camera uniform data for shaders
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub camera_pos: [f32; 4],
}

impl CameraUniform {
    pub fn from_camera(camera: &OrbitCamera, aspect_ratio: f32) -> Self {
        let pos = camera.position();
        Self {
            view_proj: camera
                .view_projection_matrix(aspect_ratio)
                .to_cols_array_2d(),
            view: camera.view_matrix().to_cols_array_2d(),
            camera_pos: [pos.x, pos.y, pos.z, 1.0],
        }
    }
}
