//! Hinge angle estimation from the base and lid gravity vectors.
//!
//! A plain dot-product angle only covers 0–180° and cannot tell an opening
//! laptop from one folding back into tent/tablet. The estimator therefore:
//!
//! 1. Computes the unsigned angle between the two gravity vectors.
//! 2. Corrects it upward when the whole chassis is tilted inside the
//!    ambiguous 90–110° zone (large in-plane acceleration on either half).
//! 3. Resolves the fold direction from the sign of `cross(base, lid).y`,
//!    with an asymmetric deadband so noise around 180° cannot flip it.
//!
//! ```text
//!   cross_y      < -5        -5 ..= +5       >= +5
//!   normal       fold        stay normal     stay normal
//!   folded       stay        stay            unfold
//! ```

use log::{debug, trace};

use crate::config::HingeConfig;
use crate::core::math::{self, Vec3f};
use crate::core::types::AccelSample;

/// Why a pair of samples produced no angle
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InvalidReading {
    /// One of the vectors is too weak to carry a direction (shock, free-fall)
    WeakGravity { base_ms2: f64, lid_ms2: f64 },
    /// A calibration scale is zero, negative or not finite
    BadScale { base_scale: f64, lid_scale: f64 },
}

impl std::fmt::Display for InvalidReading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidReading::WeakGravity { base_ms2, lid_ms2 } => write!(
                f,
                "weak gravity (base {:.2} m/s², lid {:.2} m/s²)",
                base_ms2, lid_ms2
            ),
            InvalidReading::BadScale {
                base_scale,
                lid_scale,
            } => write!(f, "bad scale (base {}, lid {})", base_scale, lid_scale),
        }
    }
}

impl std::error::Error for InvalidReading {}

/// Estimator state carried between evaluations
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HingeState {
    /// Last reported angle in [0, 360)
    pub last_angle: f64,
    /// Hinge is past 180° (tent/tablet side)
    pub folded_back: bool,
}

/// Everything computed for one accepted sample pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HingeReading {
    /// Final angle in [0, 360)
    pub angle_deg: f64,
    /// Unsigned dot-product angle before compensation (0–180)
    pub raw_angle_deg: f64,
    /// Tilt compensation changed the angle
    pub compensated: bool,
    pub cross_y: f64,
    pub folded_back: bool,
    /// Base vector in m/s²
    pub base_ms2: Vec3f,
    /// Lid vector in m/s²
    pub lid_ms2: Vec3f,
}

/// Turns base/lid sample pairs into a continuous 0–360° hinge angle
#[derive(Debug, Clone)]
pub struct HingeAngleEstimator {
    config: HingeConfig,
    state: HingeState,
}

impl HingeAngleEstimator {
    pub fn new(config: HingeConfig) -> Self {
        Self {
            config,
            state: HingeState::default(),
        }
    }

    pub fn state(&self) -> HingeState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = HingeState::default();
    }

    /// Angle in degrees, or why the pair was rejected.
    ///
    /// Rejected pairs leave the fold state untouched.
    pub fn evaluate(
        &mut self,
        base: &AccelSample,
        lid: &AccelSample,
        base_scale: f64,
        lid_scale: f64,
    ) -> Result<f64, InvalidReading> {
        self.evaluate_detailed(base, lid, base_scale, lid_scale)
            .map(|r| r.angle_deg)
    }

    /// Like [`evaluate`](Self::evaluate), with the intermediate values
    pub fn evaluate_detailed(
        &mut self,
        base: &AccelSample,
        lid: &AccelSample,
        base_scale: f64,
        lid_scale: f64,
    ) -> Result<HingeReading, InvalidReading> {
        if !valid_scale(base_scale) || !valid_scale(lid_scale) {
            return Err(InvalidReading::BadScale {
                base_scale,
                lid_scale,
            });
        }

        let b = Vec3f::scaled(base.vector, base_scale);
        let l = Vec3f::scaled(lid.vector, lid_scale);
        let base_mag = math::magnitude(b);
        let lid_mag = math::magnitude(l);

        let min = self.config.min_gravity;
        if base_mag < min || lid_mag < min {
            return Err(InvalidReading::WeakGravity {
                base_ms2: base_mag,
                lid_ms2: lid_mag,
            });
        }

        let cos_theta = math::clamp(math::dot(b, l) / (base_mag * lid_mag), -1.0, 1.0);
        let raw = cos_theta.acos().to_degrees();
        let theta = self.compensate(raw, b, l);

        let cross_y = math::cross(b, l).y;
        let folded_back = if self.state.folded_back {
            cross_y < self.config.fold_exit_threshold
        } else {
            cross_y < self.config.fold_enter_threshold
        };
        if folded_back != self.state.folded_back {
            debug!(
                "Hinge fold state: {} (cross_y={:.2}, raw={:.1}°)",
                if folded_back { "folded back" } else { "normal" },
                cross_y,
                raw
            );
        }

        let mut angle = if folded_back { 360.0 - theta } else { theta };
        angle = angle.rem_euclid(360.0);

        self.state = HingeState {
            last_angle: angle,
            folded_back,
        };

        Ok(HingeReading {
            angle_deg: angle,
            raw_angle_deg: raw,
            compensated: theta != raw,
            cross_y,
            folded_back,
            base_ms2: b,
            lid_ms2: l,
        })
    }

    /// Gravity-tilt compensation for the 90–110° transition zone.
    ///
    /// Result is always within `[theta, theta + max_correction_deg]`.
    fn compensate(&self, theta: f64, base: Vec3f, lid: Vec3f) -> f64 {
        let c = &self.config;
        if theta < c.compensation_min_deg || theta > c.compensation_max_deg {
            return theta;
        }

        let base_h = math::planar_magnitude(base);
        let lid_h = math::planar_magnitude(lid);
        if base_h <= c.base_horizontal_threshold && lid_h <= c.lid_horizontal_threshold {
            return theta;
        }

        let total_h = math::horizontal_magnitude(base, lid);
        let factor = if total_h > c.tilt_reference {
            math::clamp(
                1.0 + (total_h - c.tilt_reference) * c.tilt_gain,
                1.0,
                c.max_tilt_factor,
            )
        } else {
            1.0
        };
        let boost = if theta >= c.boost_start_deg {
            (theta - c.boost_start_deg) * c.boost_gain
        } else {
            0.0
        };

        let corrected = math::clamp(theta * factor + boost, theta, theta + c.max_correction_deg);
        if corrected > theta + c.min_correction_deg {
            trace!(
                "Tilt compensation: {:.1}° -> {:.1}° (base_h={:.1}, lid_h={:.1})",
                theta,
                corrected,
                base_h,
                lid_h
            );
            corrected
        } else {
            theta
        }
    }
}

impl Default for HingeAngleEstimator {
    fn default() -> Self {
        Self::new(HingeConfig::default())
    }
}

fn valid_scale(scale: f64) -> bool {
    scale.is_finite() && scale > 0.0
}
