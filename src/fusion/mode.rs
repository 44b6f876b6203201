//! Device mode state machine.
//!
//! Maps the hinge angle onto five bins and filters the result so the
//! reported mode only ever walks along the hinge travel:
//!
//! ```text
//! Closing ↔ Laptop ↔ Flat ↔ Tent ↔ Tablet
//!  [0,45)   [45,160) [160,240) [240,330) [330,360]
//! ```
//!
//! A proposed mode must be adjacent to the current one, must clear the
//! shared boundary by the hysteresis margin, and must be seen on
//! `stability_samples` consecutive evaluations before it commits.

use std::collections::VecDeque;

use log::{debug, info};

use crate::config::ModeConfig;
use crate::core::types::DeviceMode;

use super::gravity::{self, GravityReading};

/// Classifier state carried between evaluations
#[derive(Debug, Clone, PartialEq)]
pub struct ModeState {
    pub current: DeviceMode,
    pub candidate: Option<DeviceMode>,
    pub stability_count: u32,
    pub orientation_freeze_remaining: u32,
    pub last_orientation_hint: Option<i32>,
    /// First evaluation has happened
    pub initialized: bool,
}

impl Default for ModeState {
    fn default() -> Self {
        Self {
            current: DeviceMode::Laptop,
            candidate: None,
            stability_count: 0,
            orientation_freeze_remaining: 0,
            last_orientation_hint: None,
            initialized: false,
        }
    }
}

/// One committed mode change
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeTransition {
    pub from: DeviceMode,
    pub to: DeviceMode,
    /// Angle of the evaluation that committed the change
    pub angle_deg: f64,
}

/// Hysteretic, stability-filtered hinge angle → [`DeviceMode`] classifier
#[derive(Debug, Clone)]
pub struct ModeClassifier {
    config: ModeConfig,
    state: ModeState,
    history: VecDeque<ModeTransition>,
}

impl ModeClassifier {
    pub fn new(config: ModeConfig) -> Self {
        Self {
            history: VecDeque::with_capacity(config.history_len),
            config,
            state: ModeState::default(),
        }
    }

    pub fn current(&self) -> DeviceMode {
        self.state.current
    }

    pub fn state(&self) -> &ModeState {
        &self.state
    }

    /// Most recent committed transitions, oldest first
    pub fn history(&self) -> impl Iterator<Item = &ModeTransition> {
        self.history.iter()
    }

    /// Back to the fail-safe Laptop mode; the next evaluation re-initializes
    pub fn reset(&mut self) {
        self.state = ModeState::default();
    }

    /// Bin an angle without any filtering.
    ///
    /// Non-finite or out-of-range angles fall back to Laptop.
    pub fn raw_mode(&self, angle_deg: f64) -> DeviceMode {
        let c = &self.config;
        if !angle_deg.is_finite() || !(0.0..=360.0).contains(&angle_deg) {
            return DeviceMode::Laptop;
        }
        if angle_deg < c.closing_max_deg {
            DeviceMode::Closing
        } else if angle_deg < c.laptop_max_deg {
            DeviceMode::Laptop
        } else if angle_deg < c.flat_max_deg {
            DeviceMode::Flat
        } else if angle_deg < c.tent_max_deg {
            DeviceMode::Tent
        } else {
            DeviceMode::Tablet
        }
    }

    /// Feed one hinge angle; returns the (possibly unchanged) current mode
    pub fn evaluate(&mut self, angle_deg: f64, orientation_hint: i32) -> DeviceMode {
        self.step(angle_deg, orientation_hint, None)
    }

    /// Like [`evaluate`](Self::evaluate), holding the mode while gravity
    /// readings are implausible (when the gate is enabled)
    pub fn evaluate_with_gravity(
        &mut self,
        angle_deg: f64,
        orientation_hint: i32,
        gravity: &GravityReading,
    ) -> DeviceMode {
        self.step(angle_deg, orientation_hint, Some(gravity))
    }

    fn step(
        &mut self,
        angle_deg: f64,
        orientation_hint: i32,
        gravity: Option<&GravityReading>,
    ) -> DeviceMode {
        if !self.state.initialized {
            let mode = self.raw_mode(angle_deg);
            info!("Initial mode: {} ({:.1}°)", mode, angle_deg);
            self.state.current = mode;
            self.state.initialized = true;
            self.state.last_orientation_hint = Some(orientation_hint);
            return mode;
        }

        let current = self.state.current;

        // A tablet folding a little further reads as a small angle
        let angle = if current == DeviceMode::Tablet
            && angle_deg.is_finite()
            && angle_deg < self.config.closing_max_deg
        {
            360.0 - angle_deg
        } else {
            angle_deg
        };

        if self.orientation_frozen(orientation_hint) {
            return current;
        }

        let raw = self.raw_mode(angle);

        if let Some(g) = gravity.filter(|_| self.config.gravity.enabled) {
            let gc = &self.config.gravity;
            if !gravity::is_confident_for(gc, g, current) && !gravity::is_confident_for(gc, g, raw)
            {
                debug!(
                    "Gravity unreliable for {} and {} (h={:.1}), holding",
                    current,
                    raw,
                    g.total_horizontal
                );
                self.clear_candidate();
                return current;
            }
        }

        if current.distance(raw) > 1 {
            debug!(
                "Rejected jump {} -> {} ({:.1}°)",
                current,
                raw,
                angle
            );
            self.clear_candidate();
            return current;
        }

        let proposed = if self.clears_boundary(current, raw, angle) {
            raw
        } else {
            current
        };

        if proposed == current {
            self.clear_candidate();
            return current;
        }

        if self.state.candidate == Some(proposed) {
            self.state.stability_count += 1;
        } else {
            self.state.candidate = Some(proposed);
            self.state.stability_count = 1;
        }

        if self.state.stability_count >= self.config.stability_samples {
            self.commit(proposed, angle);
        }
        self.state.current
    }

    /// Tracks hint changes; true while the freeze window is open
    fn orientation_frozen(&mut self, hint: i32) -> bool {
        let changed = self
            .state
            .last_orientation_hint
            .is_some_and(|previous| previous != hint);
        self.state.last_orientation_hint = Some(hint);

        if changed && self.config.orientation_freeze_samples > 0 {
            debug!(
                "Orientation hint changed to {}, freezing mode for {} samples",
                hint,
                self.config.orientation_freeze_samples
            );
            self.state.orientation_freeze_remaining = self.config.orientation_freeze_samples;
            self.clear_candidate();
        }

        if self.state.orientation_freeze_remaining > 0 {
            self.state.orientation_freeze_remaining -= 1;
            return true;
        }
        false
    }

    /// Angle is past the shared boundary by at least the hysteresis margin
    fn clears_boundary(&self, current: DeviceMode, target: DeviceMode, angle: f64) -> bool {
        let h = self.config.hysteresis_deg;
        if target > current {
            self.upper_boundary(current)
                .is_some_and(|upper| angle >= upper + h)
        } else if target < current {
            self.upper_boundary(target)
                .is_some_and(|lower| angle < lower - h)
        } else {
            false
        }
    }

    fn upper_boundary(&self, mode: DeviceMode) -> Option<f64> {
        let c = &self.config;
        match mode {
            DeviceMode::Closing => Some(c.closing_max_deg),
            DeviceMode::Laptop => Some(c.laptop_max_deg),
            DeviceMode::Flat => Some(c.flat_max_deg),
            DeviceMode::Tent => Some(c.tent_max_deg),
            DeviceMode::Tablet => None,
        }
    }

    fn commit(&mut self, to: DeviceMode, angle_deg: f64) {
        let from = self.state.current;
        info!("Mode: {} -> {} ({:.1}°)", from, to, angle_deg);

        if self.config.history_len > 0 {
            if self.history.len() == self.config.history_len {
                self.history.pop_front();
            }
            self.history.push_back(ModeTransition {
                from,
                to,
                angle_deg,
            });
        }

        self.state.current = to;
        self.clear_candidate();
    }

    fn clear_candidate(&mut self) {
        self.state.candidate = None;
        self.state.stability_count = 0;
    }
}

impl Default for ModeClassifier {
    fn default() -> Self {
        Self::new(ModeConfig::default())
    }
}
