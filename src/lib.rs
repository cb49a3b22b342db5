//! satstream - real-time satellite constellation visualizer
//!
//! The core is a batched propagation pipeline: a worker thread recomputes
//! every registered satellite's position against a simulated clock, the
//! frame loop consumes the freshest finished batch through a double buffer,
//! and a lifecycle coordinator releases the backend's registered set only
//! once nothing is in flight. Around it sit the element feed, the simulated
//! clock, the earth-frame transform, and the egui/wgpu scene glue.

pub mod clock;
pub mod data;
pub mod frame;
pub mod propagation;
pub mod renderer;
pub mod ui;
