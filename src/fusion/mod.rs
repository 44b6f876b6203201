//! Sensor fusion: hinge angle, device mode and screen orientation.

pub mod gravity;
pub mod hinge;
pub mod mode;
pub mod orientation;
pub mod pipeline;

pub use gravity::GravityReading;
pub use hinge::{HingeAngleEstimator, HingeReading, HingeState, InvalidReading};
pub use mode::{ModeClassifier, ModeState, ModeTransition};
pub use orientation::{OrientationClassifier, OrientationState};
pub use pipeline::{FusionOutput, FusionPipeline};
