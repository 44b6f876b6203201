//! Core types and vector math shared by the fusion and streaming layers.

pub mod math;
pub mod types;

pub use math::{DegenerateVector, Vec3f};
pub use types::{AccelSample, DeviceFacing, DeviceMode, Orientation, Vec3};
