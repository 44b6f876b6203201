//! Core data types for accelerometer samples and classifier outputs.
//!
//! Key types:
//! - [`Vec3`] / [`AccelSample`]: raw readings handed over by the sensor layer
//! - [`DeviceMode`]: hinge-derived posture (closing → tablet)
//! - [`Orientation`]: screen orientation published to consumers
//! - [`DeviceFacing`]: six-way dominant gravity axis

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Raw 3-axis accelerometer reading in sensor LSB units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Vec3 {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

impl From<[i32; 3]> for Vec3 {
    fn from(v: [i32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

/// One accelerometer sample as delivered by a sensor source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccelSample {
    /// Raw reading
    pub vector: Vec3,
    /// Capture time in nanoseconds (monotonic or epoch, source-defined)
    pub timestamp: u64,
}

impl AccelSample {
    pub fn new(vector: Vec3, timestamp: u64) -> Self {
        Self { vector, timestamp }
    }

    /// Sample stamped with the current wall-clock time
    pub fn now(vector: Vec3) -> Self {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self { vector, timestamp }
    }
}

/// Device posture derived from the hinge angle.
///
/// Variants are ordered along the hinge travel; only neighbours in this
/// order are valid single-step transitions.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DeviceMode {
    Closing,
    #[default]
    Laptop,
    Flat,
    Tent,
    Tablet,
}

impl DeviceMode {
    /// All modes in adjacency order
    pub const ALL: [DeviceMode; 5] = [
        DeviceMode::Closing,
        DeviceMode::Laptop,
        DeviceMode::Flat,
        DeviceMode::Tent,
        DeviceMode::Tablet,
    ];

    /// Position along the hinge travel (Closing = 0, Tablet = 4)
    pub fn index(self) -> usize {
        self as usize
    }

    /// Number of adjacency steps between two modes
    pub fn distance(self, other: DeviceMode) -> usize {
        self.index().abs_diff(other.index())
    }

    /// Wire/sysfs string
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceMode::Closing => "closing",
            DeviceMode::Laptop => "laptop",
            DeviceMode::Flat => "flat",
            DeviceMode::Tent => "tent",
            DeviceMode::Tablet => "tablet",
        }
    }

    /// Modes in which the base half is the stable orientation reference
    pub fn is_folded(self) -> bool {
        matches!(self, DeviceMode::Tent | DeviceMode::Tablet)
    }
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceMode::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| Error::Protocol(format!("unknown mode '{}'", s)))
    }
}

/// Screen orientation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    #[default]
    Landscape,
    LandscapeFlipped,
    Portrait,
    PortraitFlipped,
}

impl Orientation {
    pub const ALL: [Orientation; 4] = [
        Orientation::Landscape,
        Orientation::LandscapeFlipped,
        Orientation::Portrait,
        Orientation::PortraitFlipped,
    ];

    /// Wire/sysfs string
    pub fn as_str(self) -> &'static str {
        match self {
            Orientation::Landscape => "landscape",
            Orientation::LandscapeFlipped => "landscape-flipped",
            Orientation::Portrait => "portrait",
            Orientation::PortraitFlipped => "portrait-flipped",
        }
    }

    pub fn is_portrait(self) -> bool {
        matches!(self, Orientation::Portrait | Orientation::PortraitFlipped)
    }

    pub fn is_landscape(self) -> bool {
        !self.is_portrait()
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Orientation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Orientation::ALL
            .into_iter()
            .find(|o| o.as_str() == s)
            .ok_or_else(|| Error::Protocol(format!("unknown orientation '{}'", s)))
    }
}

/// Which device axis gravity dominates, and in which direction.
///
/// The integer codes (see [`DeviceFacing::code`]) double as the coarse
/// orientation hint fed to the mode classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceFacing {
    XUp,
    XDown,
    YUp,
    YDown,
    ZUp,
    ZDown,
}

impl DeviceFacing {
    /// Classify a vector by its dominant-magnitude axis.
    ///
    /// Z wins only when strictly larger than both X and Y; Y wins over X
    /// only when strictly larger. Ties therefore fall through to X.
    pub fn from_components(x: f64, y: f64, z: f64) -> Self {
        let (ax, ay, az) = (x.abs(), y.abs(), z.abs());
        if az > ax && az > ay {
            if z > 0.0 {
                DeviceFacing::ZUp
            } else {
                DeviceFacing::ZDown
            }
        } else if ay > ax {
            if y > 0.0 {
                DeviceFacing::YUp
            } else {
                DeviceFacing::YDown
            }
        } else if x > 0.0 {
            DeviceFacing::XUp
        } else {
            DeviceFacing::XDown
        }
    }

    /// Stable integer code
    pub fn code(self) -> i32 {
        match self {
            DeviceFacing::XDown => 0,
            DeviceFacing::XUp => 1,
            DeviceFacing::YDown => 2,
            DeviceFacing::YUp => 3,
            DeviceFacing::ZDown => 4,
            DeviceFacing::ZUp => 5,
        }
    }

    /// Screen orientation for this facing. Z cases are near-flat readings
    /// with no meaningful screen direction and map to landscape.
    pub fn orientation(self) -> Orientation {
        match self {
            DeviceFacing::XDown => Orientation::Landscape,
            DeviceFacing::XUp => Orientation::LandscapeFlipped,
            DeviceFacing::YUp => Orientation::Portrait,
            DeviceFacing::YDown => Orientation::PortraitFlipped,
            DeviceFacing::ZUp | DeviceFacing::ZDown => Orientation::Landscape,
        }
    }
}
