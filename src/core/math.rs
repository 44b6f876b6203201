//! Vector primitives for gravity readings.
//!
//! Everything here is pure. The only failure mode is a degenerate
//! (near-zero) vector, which is a normal outcome during free-fall or shock
//! and is reported through [`DegenerateVector`] rather than [`crate::Error`].

use super::types::Vec3;

/// Magnitude below which a vector has no usable direction
pub const DEGENERATE_EPSILON: f64 = 1e-6;

/// Magnitude below which a reading is too weak to carry a tilt (m/s²)
pub const MIN_TILT_MAGNITUDE: f64 = 1.0;

/// 3-vector in physical units (m/s²) or unit length after normalization
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3f {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3f {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Convert a raw reading to physical units.
    ///
    /// # Example
    /// ```
    /// use convertd::core::{Vec3, Vec3f};
    ///
    /// let v = Vec3f::scaled(Vec3::new(1000, 0, -2000), 0.01);
    /// assert!((v.x - 10.0).abs() < 1e-9);
    /// assert!((v.z + 20.0).abs() < 1e-9);
    /// ```
    pub fn scaled(raw: Vec3, scale: f64) -> Self {
        Self {
            x: raw.x as f64 * scale,
            y: raw.y as f64 * scale,
            z: raw.z as f64 * scale,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<Vec3> for Vec3f {
    fn from(v: Vec3) -> Self {
        Self::scaled(v, 1.0)
    }
}

/// The vector had no usable direction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DegenerateVector {
    pub magnitude: f64,
}

impl std::fmt::Display for DegenerateVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "degenerate vector (|v| = {:.3e})", self.magnitude)
    }
}

impl std::error::Error for DegenerateVector {}

#[inline]
pub fn magnitude(v: Vec3f) -> f64 {
    (v.x * v.x + v.y * v.y + v.z * v.z).sqrt()
}

/// Scale to unit length. Fails when `|v| < 1e-6`.
pub fn normalize(v: Vec3f) -> Result<Vec3f, DegenerateVector> {
    let mag = magnitude(v);
    if mag.is_nan() || mag < DEGENERATE_EPSILON {
        return Err(DegenerateVector { magnitude: mag });
    }
    Ok(Vec3f::new(v.x / mag, v.y / mag, v.z / mag))
}

#[inline]
pub fn dot(a: Vec3f, b: Vec3f) -> f64 {
    a.x * b.x + a.y * b.y + a.z * b.z
}

#[inline]
pub fn cross(a: Vec3f, b: Vec3f) -> Vec3f {
    Vec3f::new(
        a.y * b.z - a.z * b.y,
        a.z * b.x - a.x * b.z,
        a.x * b.y - a.y * b.x,
    )
}

/// Clamp `x` into `[lo, hi]`. NaN passes through unchanged.
#[inline]
pub fn clamp(x: f64, lo: f64, hi: f64) -> f64 {
    if x < lo {
        lo
    } else if x > hi {
        hi
    } else {
        x
    }
}

/// Magnitude of the X/Y (in-plane) part of a reading
#[inline]
pub fn planar_magnitude(v: Vec3f) -> f64 {
    (v.x * v.x + v.y * v.y).sqrt()
}

/// Combined in-plane acceleration of the base and lid readings
pub fn horizontal_magnitude(base: Vec3f, lid: Vec3f) -> f64 {
    planar_magnitude(base) + planar_magnitude(lid)
}

/// Angle between the reading and the device Z axis, in degrees.
///
/// 0° when the half lies flat, 90° when it stands upright. Returns `None`
/// for readings weaker than [`MIN_TILT_MAGNITUDE`].
pub fn tilt_from_horizontal_deg(v: Vec3f) -> Option<f64> {
    let mag = magnitude(v);
    if mag.is_nan() || mag < MIN_TILT_MAGNITUDE {
        return None;
    }
    Some(clamp(v.z.abs() / mag, 0.0, 1.0).acos().to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_magnitude() {
        assert_relative_eq!(magnitude(Vec3f::new(3.0, 4.0, 12.0)), 13.0);
        assert_relative_eq!(magnitude(Vec3f::default()), 0.0);
    }

    #[test]
    fn test_normalize_unit_length() {
        let n = normalize(Vec3f::new(0.0, -9.81, 0.0)).unwrap();
        assert_relative_eq!(n.y, -1.0);
        assert_relative_eq!(magnitude(n), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_normalize_degenerate() {
        let err = normalize(Vec3f::new(1e-8, 0.0, 0.0)).unwrap_err();
        assert!(err.magnitude < DEGENERATE_EPSILON);
        assert!(normalize(Vec3f::new(f64::NAN, 0.0, 0.0)).is_err());
    }

    #[test]
    fn test_dot_and_cross() {
        let x = Vec3f::new(1.0, 0.0, 0.0);
        let y = Vec3f::new(0.0, 1.0, 0.0);
        assert_relative_eq!(dot(x, y), 0.0);
        assert_eq!(cross(x, y), Vec3f::new(0.0, 0.0, 1.0));
        assert_eq!(cross(y, x), Vec3f::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn test_cross_y_component() {
        // cross_y = a.z * b.x - a.x * b.z
        let base = Vec3f::new(0.0, 0.0, -9.8);
        let lid = Vec3f::new(-9.8, 0.0, 0.0);
        assert_relative_eq!(cross(base, lid).y, 9.8 * 9.8);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(-2.0, -1.0, 1.0), -1.0);
        assert_eq!(clamp(2.0, -1.0, 1.0), 1.0);
        assert_eq!(clamp(0.25, -1.0, 1.0), 0.25);
    }

    #[test]
    fn test_tilt() {
        assert_relative_eq!(
            tilt_from_horizontal_deg(Vec3f::new(0.0, 0.0, -9.8)).unwrap(),
            0.0
        );
        assert_relative_eq!(
            tilt_from_horizontal_deg(Vec3f::new(0.0, 9.8, 0.0)).unwrap(),
            90.0
        );
        assert_relative_eq!(
            tilt_from_horizontal_deg(Vec3f::new(0.0, 1.0, 1.0)).unwrap(),
            45.0,
            epsilon = 1e-9
        );
        assert!(tilt_from_horizontal_deg(Vec3f::new(0.1, 0.1, 0.1)).is_none());
    }

    #[test]
    fn test_horizontal_magnitude() {
        let base = Vec3f::new(3.0, 4.0, -9.0);
        let lid = Vec3f::new(0.0, 0.0, 9.8);
        assert_relative_eq!(horizontal_magnitude(base, lid), 5.0);
    }
}
