//! End-to-end classification against the simulated hinge
#![cfg(feature = "mock")]

use approx::assert_relative_eq;

use convertd::config::{Config, MockConfig};
use convertd::core::types::{AccelSample, DeviceMode, Vec3};
use convertd::devices::mock::MockHinge;
use convertd::fusion::{FusionPipeline, HingeAngleEstimator};

const SCALE: f64 = 0.009582;

fn quiet_hinge(angle_deg: f64) -> MockHinge {
    MockHinge::new(MockConfig {
        angle_deg,
        noise_stddev: 0.0,
        ..MockConfig::default()
    })
}

/// Drive the hinge through `angles`, returning each distinct mode in order
fn mode_walk(
    pipeline: &mut FusionPipeline,
    hinge: &mut MockHinge,
    angles: impl Iterator<Item = f64>,
) -> Vec<DeviceMode> {
    let mut walk: Vec<DeviceMode> = Vec::new();
    for angle in angles {
        hinge.set_angle(angle);
        let (base, lid) = hinge.sample_pair();
        if let Some(out) = pipeline.process(&base, &lid, SCALE, SCALE) {
            if walk.last() != Some(&out.mode) {
                walk.push(out.mode);
            }
        }
    }
    walk
}

#[test]
fn reference_reading_is_laptop() {
    let mut pipeline = FusionPipeline::default();
    let base = AccelSample::new(Vec3::new(991, 2, -1346), 0);
    let lid = AccelSample::new(Vec3::new(-938, -38, 254), 0);

    let out = pipeline.process(&base, &lid, SCALE, SCALE).unwrap();
    assert_eq!(out.mode, DeviceMode::Laptop);
    assert_relative_eq!(out.angle_deg, 141.46, epsilon = 0.1);
    assert!(out.hinge.cross_y > 5.0);
    assert!(!out.hinge.compensated);
}

#[test]
fn full_opening_and_closing_walks_every_mode_in_order() {
    let mut pipeline = FusionPipeline::new(&Config::default());
    let mut hinge = quiet_hinge(10.0);

    let opening = mode_walk(&mut pipeline, &mut hinge, (10..=350).map(f64::from));
    assert_eq!(
        opening,
        vec![
            DeviceMode::Closing,
            DeviceMode::Laptop,
            DeviceMode::Flat,
            DeviceMode::Tent,
            DeviceMode::Tablet,
        ]
    );

    let closing = mode_walk(&mut pipeline, &mut hinge, (10..=350).rev().map(f64::from));
    assert_eq!(
        closing,
        vec![
            DeviceMode::Tablet,
            DeviceMode::Tent,
            DeviceMode::Flat,
            DeviceMode::Laptop,
            DeviceMode::Closing,
        ]
    );

    let history: Vec<_> = pipeline.mode_classifier().history().collect();
    assert_eq!(history.len(), 8);
    assert!(history.iter().all(|t| t.from.distance(t.to) == 1));
}

#[test]
fn hovering_near_a_boundary_does_not_flap() {
    let mut pipeline = FusionPipeline::default();
    let mut hinge = quiet_hinge(140.0);

    // Straddle the 160° Laptop/Flat boundary inside the hysteresis band
    let angles = (0..60).map(|i| if i % 2 == 0 { 155.0 } else { 165.0 });
    let walk = mode_walk(&mut pipeline, &mut hinge, std::iter::once(140.0).chain(angles));
    assert_eq!(walk, vec![DeviceMode::Laptop]);
}

#[test]
fn single_sample_spike_is_filtered() {
    let mut pipeline = FusionPipeline::default();
    let mut hinge = quiet_hinge(120.0);

    let angles = [120.0, 121.0, 200.0, 122.0, 123.0, 124.0].into_iter();
    let walk = mode_walk(&mut pipeline, &mut hinge, angles);
    assert_eq!(walk, vec![DeviceMode::Laptop]);
}

#[test]
fn fold_direction_has_a_deadband() {
    let mut hinge = quiet_hinge(185.0);
    let mut folded = HingeAngleEstimator::default();

    let (b, l) = hinge.sample_pair();
    assert_relative_eq!(folded.evaluate(&b, &l, SCALE, SCALE).unwrap(), 185.0, epsilon = 0.5);
    assert!(folded.state().folded_back);

    // Back to 179°: cross_y is slightly positive, still inside the deadband
    hinge.set_angle(179.0);
    let (b, l) = hinge.sample_pair();
    assert_relative_eq!(folded.evaluate(&b, &l, SCALE, SCALE).unwrap(), 181.0, epsilon = 0.5);
    assert!(folded.state().folded_back);

    // A fresh estimator reads the same pair as not folded
    let mut fresh = HingeAngleEstimator::default();
    assert_relative_eq!(fresh.evaluate(&b, &l, SCALE, SCALE).unwrap(), 179.0, epsilon = 0.5);
    assert!(!fresh.state().folded_back);

    // Far enough back releases the fold
    hinge.set_angle(170.0);
    let (b, l) = hinge.sample_pair();
    assert_relative_eq!(folded.evaluate(&b, &l, SCALE, SCALE).unwrap(), 170.0, epsilon = 0.5);
    assert!(!folded.state().folded_back);
}

#[test]
fn sensor_dropouts_keep_state() {
    let mut pipeline = FusionPipeline::default();
    let mut hinge = quiet_hinge(300.0);
    let walk = mode_walk(&mut pipeline, &mut hinge, std::iter::repeat(300.0).take(5));
    assert_eq!(walk, vec![DeviceMode::Tent]);

    let base = AccelSample::new(Vec3::new(0, 0, 0), 0);
    let lid = AccelSample::new(Vec3::new(0, 0, 0), 0);
    assert!(pipeline.process(&base, &lid, SCALE, SCALE).is_none());
    assert_eq!(pipeline.mode(), DeviceMode::Tent);
    assert!(pipeline.hinge().state().folded_back);
}
