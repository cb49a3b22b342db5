//! 3D rendering module using wgpu
//!
//! The point collection is the sink the propagation pipeline streams into;
//! the scene uploads its shared storage and draws it over a procedurally
//! shaded Earth.

mod camera;
mod earth;
mod points;
mod scene;

pub use camera::*;
pub use earth::*;
pub use points::*;
pub use scene::*;
