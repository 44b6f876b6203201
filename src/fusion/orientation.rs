//! Screen orientation state machine.
//!
//! The dominant axis of the reference gravity vector proposes an
//! orientation. Two filters sit on top of it:
//!
//! - **Tilt lock**: rapid tilt changes (device being picked up or turned)
//!   freeze the output until the tilt settles again.
//! - **Reading protection**: a reclined tablet that has been in portrait
//!   for a while does not flip to landscape.

use log::{debug, info, trace};

use crate::config::OrientationConfig;
use crate::core::math::{self, Vec3f};
use crate::core::types::{DeviceFacing, DeviceMode, Orientation, Vec3};

/// Classifier state carried between evaluations
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrientationState {
    /// Reported orientation
    pub current: Orientation,
    /// Orientation that `stable_count` refers to
    pub stable_orientation: Option<Orientation>,
    /// Consecutive classified evaluations reporting `stable_orientation`
    pub stable_count: u32,
    pub tilt_lock_active: bool,
    /// Consecutive rapid tilt changes while unlocked
    pub tilt_lock_count: u32,
    /// Consecutive calm evaluations while locked
    pub stability_count: u32,
    pub last_tilt_deg: Option<f64>,
}

/// Gravity vectors + device mode → stabilized [`Orientation`]
#[derive(Debug, Clone)]
pub struct OrientationClassifier {
    config: OrientationConfig,
    state: OrientationState,
}

impl OrientationClassifier {
    pub fn new(config: OrientationConfig) -> Self {
        Self {
            config,
            state: OrientationState::default(),
        }
    }

    pub fn current(&self) -> Orientation {
        self.state.current
    }

    pub fn state(&self) -> &OrientationState {
        &self.state
    }

    pub fn is_tilt_locked(&self) -> bool {
        self.state.tilt_lock_active
    }

    pub fn reset(&mut self) {
        self.state = OrientationState::default();
    }

    /// Classify one sample pair. Raw LSB vectors are enough since only
    /// direction and tilt matter.
    pub fn evaluate(&mut self, lid: Vec3, base: Vec3, mode: DeviceMode) -> Orientation {
        // Tent and tablet hold the base as the stable reference
        let reference = if mode.is_folded() { base } else { lid };

        let v = Vec3f::from(reference);
        let (n, tilt) = match (math::normalize(v), math::tilt_from_horizontal_deg(v)) {
            (Ok(n), Some(tilt)) => (n, tilt),
            _ => {
                trace!("Orientation skipped: no direction in {:?}", reference);
                return self.state.current;
            }
        };

        if !self.update_tilt_lock(tilt) {
            return self.state.current;
        }

        let mut proposed = DeviceFacing::from_components(n.x, n.y, n.z).orientation();

        if proposed.is_landscape() && self.reading_protected(mode, tilt) {
            debug!(
                "Reading protection: holding {} over {} (tilt {:.1}°)",
                self.state.current,
                proposed,
                tilt
            );
            proposed = self.state.current;
        }

        if proposed == self.state.current {
            self.state.stable_count = self.state.stable_count.saturating_add(1);
        } else {
            info!(
                "Orientation: {} -> {} (tilt {:.1}°, {})",
                self.state.current,
                proposed,
                tilt,
                mode
            );
            self.state.current = proposed;
            self.state.stable_count = 1;
        }
        self.state.stable_orientation = Some(self.state.current);
        self.state.current
    }

    /// Advance the tilt lock. Returns true when this evaluation may classify.
    fn update_tilt_lock(&mut self, tilt: f64) -> bool {
        let c = &self.config;
        let s = &mut self.state;

        let delta = s.last_tilt_deg.map(|last| (tilt - last).abs());
        s.last_tilt_deg = Some(tilt);

        if !s.tilt_lock_active {
            if delta.is_some_and(|d| d > c.tilt_lock_delta_deg) {
                s.tilt_lock_count += 1;
            } else {
                s.tilt_lock_count = 0;
            }
            if s.tilt_lock_count >= c.tilt_lock_samples {
                debug!("Tilt lock engaged at {} ({:.1}°)", s.current, tilt);
                s.tilt_lock_active = true;
                s.tilt_lock_count = 0;
                s.stability_count = 0;
                return false;
            }
            return true;
        }

        if delta.is_some_and(|d| d < c.tilt_unlock_delta_deg) {
            s.stability_count += 1;
        } else {
            s.stability_count = 0;
        }
        if s.stability_count >= c.tilt_unlock_samples {
            debug!("Tilt lock released ({:.1}°)", tilt);
            s.tilt_lock_active = false;
            s.stability_count = 0;
            return true;
        }
        false
    }

    fn reading_protected(&self, mode: DeviceMode, tilt: f64) -> bool {
        mode == DeviceMode::Tablet
            && tilt > self.config.reading_tilt_deg
            && self.state.current.is_portrait()
            && self.state.stable_count >= self.config.reading_stable_samples
    }
}

impl Default for OrientationClassifier {
    fn default() -> Self {
        Self::new(OrientationConfig::default())
    }
}
