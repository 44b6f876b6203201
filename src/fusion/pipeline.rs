//! Estimator → mode → orientation, owned by the sensing thread.

use log::{trace, warn};

use crate::config::Config;
use crate::core::types::{AccelSample, DeviceFacing, DeviceMode, Orientation};

use super::gravity::GravityReading;
use super::hinge::{HingeAngleEstimator, HingeReading, InvalidReading};
use super::mode::ModeClassifier;
use super::orientation::OrientationClassifier;

/// Result of one accepted evaluation cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionOutput {
    pub angle_deg: f64,
    pub mode: DeviceMode,
    pub orientation: Orientation,
    /// Dominant axis of the lid vector, used as the mode classifier hint
    pub lid_facing: DeviceFacing,
    pub hinge: HingeReading,
}

/// The three classifier state machines wired together
#[derive(Debug, Clone)]
pub struct FusionPipeline {
    hinge: HingeAngleEstimator,
    mode: ModeClassifier,
    orientation: OrientationClassifier,
}

impl FusionPipeline {
    pub fn new(config: &Config) -> Self {
        Self {
            hinge: HingeAngleEstimator::new(config.hinge.clone()),
            mode: ModeClassifier::new(config.mode.clone()),
            orientation: OrientationClassifier::new(config.orientation.clone()),
        }
    }

    /// Run one cycle. Returns `None` when the pair was rejected; all state
    /// is retained in that case.
    pub fn process(
        &mut self,
        base: &AccelSample,
        lid: &AccelSample,
        base_scale: f64,
        lid_scale: f64,
    ) -> Option<FusionOutput> {
        let hinge = match self
            .hinge
            .evaluate_detailed(base, lid, base_scale, lid_scale)
        {
            Ok(reading) => reading,
            Err(e @ InvalidReading::BadScale { .. }) => {
                warn!("Skipping cycle: {}", e);
                return None;
            }
            Err(e) => {
                trace!("Skipping cycle: {}", e);
                return None;
            }
        };

        let l = hinge.lid_ms2;
        let lid_facing = DeviceFacing::from_components(l.x, l.y, l.z);
        let gravity = GravityReading::from_hinge(&hinge);

        let mode = self
            .mode
            .evaluate_with_gravity(hinge.angle_deg, lid_facing.code(), &gravity);
        let orientation = self.orientation.evaluate(lid.vector, base.vector, mode);

        trace!(
            "angle={:.1}° raw={:.1}° cross_y={:.2} mode={} orientation={}",
            hinge.angle_deg,
            hinge.raw_angle_deg,
            hinge.cross_y,
            mode,
            orientation
        );

        Some(FusionOutput {
            angle_deg: hinge.angle_deg,
            mode,
            orientation,
            lid_facing,
            hinge,
        })
    }

    pub fn mode(&self) -> DeviceMode {
        self.mode.current()
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation.current()
    }

    pub fn hinge(&self) -> &HingeAngleEstimator {
        &self.hinge
    }

    pub fn mode_classifier(&self) -> &ModeClassifier {
        &self.mode
    }

    pub fn orientation_classifier(&self) -> &OrientationClassifier {
        &self.orientation
    }

    /// Fail-safe Laptop / Landscape
    pub fn reset(&mut self) {
        self.hinge.reset();
        self.mode.reset();
        self.orientation.reset();
    }
}

impl Default for FusionPipeline {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}
