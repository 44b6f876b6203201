//! Gravity-confidence gate for mode transitions.
//!
//! While the chassis is being carried or shaken, the accelerometers report
//! more than gravity and the hinge angle is unreliable. The gate judges
//! each sample pair against the tolerances of a given mode; the mode
//! classifier holds its current mode when the pair is implausible both for
//! the current mode and for the mode the angle suggests.

use crate::config::GravityConfig;
use crate::core::math::{self, Vec3f};
use crate::core::types::DeviceMode;

use super::hinge::HingeReading;

/// Raw-angle window in which the lid stands upright and its X axis
/// carries gravity
const UPRIGHT_LID_MIN_DEG: f64 = 70.0;
const UPRIGHT_LID_MAX_DEG: f64 = 110.0;

/// Magnitudes and in-plane acceleration of one sample pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GravityReading {
    pub base_magnitude: f64,
    pub lid_magnitude: f64,
    /// Base X/Y plus lid in-plane acceleration (m/s²)
    pub total_horizontal: f64,
}

impl GravityReading {
    /// Reading of a device at rest
    pub const NOMINAL: GravityReading = GravityReading {
        base_magnitude: 9.8,
        lid_magnitude: 9.8,
        total_horizontal: 0.0,
    };

    /// Build from vectors in m/s² and the unsigned hinge angle.
    ///
    /// With the lid upright (raw angle 70–110°) its X axis is expected to
    /// carry gravity, so only Y and Z count as disturbance.
    pub fn from_vectors(base: Vec3f, lid: Vec3f, raw_angle_deg: f64) -> Self {
        let lid_horizontal =
            if (UPRIGHT_LID_MIN_DEG..=UPRIGHT_LID_MAX_DEG).contains(&raw_angle_deg) {
                (lid.y * lid.y + lid.z * lid.z).sqrt()
            } else {
                math::planar_magnitude(lid)
            };

        Self {
            base_magnitude: math::magnitude(base),
            lid_magnitude: math::magnitude(lid),
            total_horizontal: math::planar_magnitude(base) + lid_horizontal,
        }
    }

    pub fn from_hinge(reading: &HingeReading) -> Self {
        Self::from_vectors(reading.base_ms2, reading.lid_ms2, reading.raw_angle_deg)
    }
}

/// Whether `reading` is plausible gravity for `mode`
pub fn is_confident_for(
    config: &GravityConfig,
    reading: &GravityReading,
    mode: DeviceMode,
) -> bool {
    let min = if mode == DeviceMode::Tent {
        config.tent_min_magnitude
    } else {
        config.min_magnitude
    };
    let in_range = |m: f64| (min..=config.max_magnitude).contains(&m);

    in_range(reading.base_magnitude)
        && in_range(reading.lid_magnitude)
        && reading.total_horizontal < tolerance(config, mode)
}

fn tolerance(config: &GravityConfig, mode: DeviceMode) -> f64 {
    match mode {
        DeviceMode::Closing => config.closing_tolerance,
        DeviceMode::Laptop => config.laptop_tolerance,
        DeviceMode::Flat => config.flat_tolerance,
        DeviceMode::Tent => config.tent_tolerance,
        DeviceMode::Tablet => config.tablet_tolerance,
    }
}
