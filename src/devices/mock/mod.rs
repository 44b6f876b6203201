//! Simulated accelerometer pair for hardware-free runs
//!
//! The base lies flat; the lid rotates about the hinge (device Y axis):
//!
//! ```text
//! base = g · (0, 0, -1)
//! lid  = g · (-sin θ, 0, -cos θ)
//! ```
//!
//! which yields a hinge angle of θ over the whole 0–360° travel and a
//! `cross_y` of g²·sin θ, negative once the lid folds past 180°.
//!
//! Enable with `convertd --mock`; the `[mock]` config section controls the
//! angle, an optional back-and-forth sweep, noise and dropouts.

mod noise;

pub use noise::NoiseGenerator;

use std::sync::Arc;

use parking_lot::Mutex;

use super::AccelSource;
use crate::config::MockConfig;
use crate::core::types::{AccelSample, Vec3};
use crate::error::Result;

/// Standard gravity, m/s²
const GRAVITY: f64 = 9.81;

/// Hinge simulator producing base/lid sample pairs
pub struct MockHinge {
    config: MockConfig,
    angle_deg: f64,
    step_deg: f64,
    noise: NoiseGenerator,
    pending_lid: Option<AccelSample>,
}

impl MockHinge {
    pub fn new(config: MockConfig) -> Self {
        Self {
            angle_deg: config.angle_deg.rem_euclid(360.0),
            step_deg: config.sweep_deg_per_sample,
            noise: NoiseGenerator::new(config.seed),
            pending_lid: None,
            config,
        }
    }

    pub fn angle_deg(&self) -> f64 {
        self.angle_deg
    }

    pub fn set_angle(&mut self, angle_deg: f64) {
        self.angle_deg = angle_deg.rem_euclid(360.0);
    }

    /// Samples for the current angle, then advance the sweep
    pub fn sample_pair(&mut self) -> (AccelSample, AccelSample) {
        let r = self.angle_deg.to_radians();
        let base = self.raw_reading([0.0, 0.0, -GRAVITY]);
        let lid = self.raw_reading([-GRAVITY * r.sin(), 0.0, -GRAVITY * r.cos()]);
        self.advance();
        (AccelSample::now(base), AccelSample::now(lid))
    }

    /// Split into a base and a lid source sharing this simulator
    pub fn into_sources(self) -> (MockAccelSource, MockAccelSource) {
        let scale = self.config.scale;
        let shared = Arc::new(Mutex::new(self));
        (
            MockAccelSource {
                name: "mock-base".to_string(),
                half: Half::Base,
                scale,
                hinge: Arc::clone(&shared),
            },
            MockAccelSource {
                name: "mock-lid".to_string(),
                half: Half::Lid,
                scale,
                hinge: shared,
            },
        )
    }

    fn advance(&mut self) {
        if self.step_deg == 0.0 {
            return;
        }
        let (min, max) = (self.config.sweep_min_deg, self.config.sweep_max_deg);
        let mut next = self.angle_deg + self.step_deg;
        if next > max {
            next = max;
            self.step_deg = -self.step_deg.abs();
        } else if next < min {
            next = min;
            self.step_deg = self.step_deg.abs();
        }
        self.angle_deg = next;
    }

    fn raw_reading(&mut self, ms2: [f64; 3]) -> Vec3 {
        let stddev = self.config.noise_stddev;
        let scale = self.config.scale;
        let mut raw = [0i32; 3];
        for (out, v) in raw.iter_mut().zip(ms2) {
            *out = ((v + self.noise.gaussian(stddev)) / scale).round() as i32;
        }
        Vec3::from(raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Half {
    Base,
    Lid,
}

/// One half of a [`MockHinge`].
///
/// Polling the base generates a new pair and parks the lid sample; the
/// lid source hands it out. A dropout on the base therefore leaves the lid
/// without data too, so pairs never mix angles.
pub struct MockAccelSource {
    name: String,
    half: Half,
    scale: f64,
    hinge: Arc<Mutex<MockHinge>>,
}

impl AccelSource for MockAccelSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn scale(&self) -> f64 {
        self.scale
    }

    fn next_sample(&mut self) -> Result<Option<AccelSample>> {
        let mut hinge = self.hinge.lock();
        match self.half {
            Half::Base => {
                let dropout = hinge.config.dropout_probability;
                if hinge.noise.chance(dropout) {
                    hinge.pending_lid = None;
                    return Ok(None);
                }
                let (base, lid) = hinge.sample_pair();
                hinge.pending_lid = Some(lid);
                Ok(Some(base))
            }
            Half::Lid => Ok(hinge.pending_lid.take()),
        }
    }
}
