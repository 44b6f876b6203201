//! Accelerometer sources and state sinks
//!
//! The daemon loop only sees the [`AccelSource`] and [`StateSink`] traits.
//! Real hardware goes through sysfs; `--mock` swaps in a simulated hinge.

#[cfg(feature = "mock")]
pub mod mock;
pub mod sysfs;

use log::info;

use crate::config::Config;
use crate::core::types::{AccelSample, DeviceMode, Orientation};
use crate::error::Result;

pub use sysfs::{NullSink, SysfsAccelSource, SysfsStateSink};

/// One accelerometer
pub trait AccelSource: Send {
    /// Device name for logs
    fn name(&self) -> &str;

    /// Calibration scale, m/s² per LSB
    fn scale(&self) -> f64;

    /// Next reading without blocking. `Ok(None)` means no data yet.
    fn next_sample(&mut self) -> Result<Option<AccelSample>>;
}

/// Consumer of the classification, called once per evaluation cycle
pub trait StateSink: Send {
    fn write_mode(&mut self, mode: DeviceMode) -> Result<()>;
    fn write_orientation(&mut self, orientation: Orientation) -> Result<()>;
}

/// Base and lid accelerometers
pub struct SensorPair {
    pub base: Box<dyn AccelSource>,
    pub lid: Box<dyn AccelSource>,
}

/// Open the accelerometers named by the configuration.
///
/// Names missing from `[sensors]` are read from the platform device's
/// `iio_base_device` / `iio_lid_device` attributes.
pub fn create_sensors(config: &Config) -> Result<SensorPair> {
    let s = &config.sensors;
    let base_name = match &s.base_device {
        Some(name) => name.clone(),
        None => sysfs::discover_device(&config.output.sysfs_path, "iio_base_device")?,
    };
    let lid_name = match &s.lid_device {
        Some(name) => name.clone(),
        None => sysfs::discover_device(&config.output.sysfs_path, "iio_lid_device")?,
    };

    let base = SysfsAccelSource::open(&s.iio_root, &base_name, s.default_scale)?;
    let lid = SysfsAccelSource::open(&s.iio_root, &lid_name, s.default_scale)?;
    info!(
        "Sensors: base={} (scale {}), lid={} (scale {})",
        base.name(),
        base.scale(),
        lid.name(),
        lid.scale()
    );

    Ok(SensorPair {
        base: Box::new(base),
        lid: Box::new(lid),
    })
}

/// Simulated hinge from the `[mock]` section
#[cfg(feature = "mock")]
pub fn create_mock_sensors(config: &Config) -> SensorPair {
    let (base, lid) = mock::MockHinge::new(config.mock.clone()).into_sources();
    info!(
        "Sensors: simulated hinge at {:.1}° (sweep {:.2}°/sample)",
        config.mock.angle_deg,
        config.mock.sweep_deg_per_sample
    );
    SensorPair {
        base: Box::new(base),
        lid: Box::new(lid),
    }
}

/// Sysfs sink when output is enabled, otherwise a no-op
pub fn create_sink(config: &Config) -> Box<dyn StateSink> {
    if config.output.enabled {
        Box::new(SysfsStateSink::new(&config.output.sysfs_path))
    } else {
        Box::new(NullSink)
    }
}
