//! IIO accelerometers and the platform-driver state attributes, via sysfs

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use super::{AccelSource, StateSink};
use crate::core::types::{AccelSample, DeviceMode, Orientation, Vec3};
use crate::error::{Error, Result};

const AXES: [&str; 3] = ["in_accel_x_raw", "in_accel_y_raw", "in_accel_z_raw"];
const SCALE_ATTR: &str = "in_accel_scale";

/// Read a device name such as `iio:device1` from a platform attribute
pub fn discover_device(sysfs_path: &Path, attribute: &str) -> Result<String> {
    let path = sysfs_path.join(attribute);
    let name = fs::read_to_string(&path).map_err(|e| Error::Sensor {
        sensor: attribute.to_string(),
        reason: format!("cannot read {}: {}", path.display(), e),
    })?;
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Sensor {
            sensor: attribute.to_string(),
            reason: format!("{} is empty", path.display()),
        });
    }
    Ok(name.to_string())
}

/// Accelerometer exposed as `<iio_root>/<device>/in_accel_*`
#[derive(Debug)]
pub struct SysfsAccelSource {
    name: String,
    dir: PathBuf,
    scale: f64,
}

impl SysfsAccelSource {
    /// Open a device; the scale falls back to `default_scale` when the
    /// attribute is missing or not a positive number
    pub fn open(iio_root: &Path, device: &str, default_scale: f64) -> Result<Self> {
        let dir = iio_root.join(device);
        if !dir.is_dir() {
            return Err(Error::Sensor {
                sensor: device.to_string(),
                reason: format!("{} not found", dir.display()),
            });
        }

        let scale = match read_trimmed(&dir.join(SCALE_ATTR)) {
            Ok(text) => match text.parse::<f64>() {
                Ok(s) if s.is_finite() && s > 0.0 => s,
                _ => {
                    warn!(
                        "{}: invalid scale '{}', using {}",
                        device,
                        text,
                        default_scale
                    );
                    default_scale
                }
            },
            Err(e) => {
                warn!("{}: no {} ({}), using {}", device, SCALE_ATTR, e, default_scale);
                default_scale
            }
        };

        Ok(Self {
            name: device.to_string(),
            dir,
            scale,
        })
    }

    fn read_axis(&self, attr: &str) -> Result<Option<i32>> {
        let text = match read_trimmed(&self.dir.join(attr)) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(e) => {
                return Err(Error::Sensor {
                    sensor: self.name.clone(),
                    reason: format!("{}: {}", attr, e),
                })
            }
        };
        if text.is_empty() {
            return Ok(None);
        }
        text.parse::<i32>().map(Some).map_err(|e| Error::Sensor {
            sensor: self.name.clone(),
            reason: format!("{}: '{}': {}", attr, text, e),
        })
    }
}

impl AccelSource for SysfsAccelSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn scale(&self) -> f64 {
        self.scale
    }

    fn next_sample(&mut self) -> Result<Option<AccelSample>> {
        let mut v = [0i32; 3];
        for (slot, attr) in v.iter_mut().zip(AXES) {
            match self.read_axis(attr)? {
                Some(raw) => *slot = raw,
                None => return Ok(None),
            }
        }
        Ok(Some(AccelSample::now(Vec3::from(v))))
    }
}

fn read_trimmed(path: &Path) -> io::Result<String> {
    fs::read_to_string(path).map(|s| s.trim().to_string())
}

/// Writes `<sysfs_path>/mode` and `<sysfs_path>/orientation` on change
#[derive(Debug)]
pub struct SysfsStateSink {
    dir: PathBuf,
    last_mode: Option<DeviceMode>,
    last_orientation: Option<Orientation>,
}

impl SysfsStateSink {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            last_mode: None,
            last_orientation: None,
        }
    }

    fn write_attr(&self, attr: &str, value: &str) -> Result<()> {
        fs::write(self.dir.join(attr), value)?;
        debug!("sysfs {} <- {}", attr, value);
        Ok(())
    }
}

impl StateSink for SysfsStateSink {
    fn write_mode(&mut self, mode: DeviceMode) -> Result<()> {
        if self.last_mode != Some(mode) {
            self.write_attr("mode", mode.as_str())?;
            self.last_mode = Some(mode);
        }
        Ok(())
    }

    fn write_orientation(&mut self, orientation: Orientation) -> Result<()> {
        if self.last_orientation != Some(orientation) {
            self.write_attr("orientation", orientation.as_str())?;
            self.last_orientation = Some(orientation);
        }
        Ok(())
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl StateSink for NullSink {
    fn write_mode(&mut self, _mode: DeviceMode) -> Result<()> {
        Ok(())
    }

    fn write_orientation(&mut self, _orientation: Orientation) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fake_device(root: &Path, name: &str, xyz: [&str; 3], scale: Option<&str>) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        for (attr, value) in AXES.iter().zip(xyz) {
            fs::write(dir.join(attr), format!("{}\n", value)).unwrap();
        }
        if let Some(scale) = scale {
            fs::write(dir.join(SCALE_ATTR), format!("{}\n", scale)).unwrap();
        }
    }

    #[test]
    fn test_read_sample() {
        let root = TempDir::new().unwrap();
        fake_device(root.path(), "iio:device0", ["991", "2", "-1346"], Some("0.009582"));

        let mut src = SysfsAccelSource::open(root.path(), "iio:device0", 1.0).unwrap();
        assert_eq!(src.scale(), 0.009582);
        let sample = src.next_sample().unwrap().unwrap();
        assert_eq!(sample.vector, Vec3::new(991, 2, -1346));
    }

    #[test]
    fn test_scale_fallback() {
        let root = TempDir::new().unwrap();
        fake_device(root.path(), "a", ["0", "0", "0"], None);
        fake_device(root.path(), "b", ["0", "0", "0"], Some("-3"));

        let a = SysfsAccelSource::open(root.path(), "a", 0.009582).unwrap();
        let b = SysfsAccelSource::open(root.path(), "b", 0.009582).unwrap();
        assert_eq!(a.scale(), 0.009582);
        assert_eq!(b.scale(), 0.009582);
    }

    #[test]
    fn test_empty_attribute_is_no_data() {
        let root = TempDir::new().unwrap();
        fake_device(root.path(), "dev", ["1", "", "3"], Some("1"));
        let mut src = SysfsAccelSource::open(root.path(), "dev", 1.0).unwrap();
        assert!(src.next_sample().unwrap().is_none());
    }

    #[test]
    fn test_garbage_attribute_is_error() {
        let root = TempDir::new().unwrap();
        fake_device(root.path(), "dev", ["1", "x", "3"], Some("1"));
        let mut src = SysfsAccelSource::open(root.path(), "dev", 1.0).unwrap();
        assert!(matches!(src.next_sample(), Err(Error::Sensor { .. })));
    }

    #[test]
    fn test_missing_device() {
        let root = TempDir::new().unwrap();
        assert!(matches!(
            SysfsAccelSource::open(root.path(), "nope", 1.0),
            Err(Error::Sensor { .. })
        ));
    }

    #[test]
    fn test_discover_device() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("iio_base_device"), "iio:device3\n").unwrap();
        fs::write(dir.path().join("iio_lid_device"), "\n").unwrap();

        assert_eq!(
            discover_device(dir.path(), "iio_base_device").unwrap(),
            "iio:device3"
        );
        assert!(discover_device(dir.path(), "iio_lid_device").is_err());
        assert!(discover_device(dir.path(), "missing").is_err());
    }

    #[test]
    fn test_sink_writes_on_change_only() {
        let dir = TempDir::new().unwrap();
        let mut sink = SysfsStateSink::new(dir.path());

        sink.write_mode(DeviceMode::Tent).unwrap();
        sink.write_orientation(Orientation::PortraitFlipped).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("mode")).unwrap(), "tent");
        assert_eq!(
            fs::read_to_string(dir.path().join("orientation")).unwrap(),
            "portrait-flipped"
        );

        // Unchanged values are not rewritten
        fs::write(dir.path().join("mode"), "sentinel").unwrap();
        sink.write_mode(DeviceMode::Tent).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("mode")).unwrap(), "sentinel");

        sink.write_mode(DeviceMode::Tablet).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("mode")).unwrap(), "tablet");
    }

    #[test]
    fn test_sink_retries_after_failure() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("gone");
        let mut sink = SysfsStateSink::new(&missing);
        assert!(sink.write_mode(DeviceMode::Flat).is_err());

        fs::create_dir(&missing).unwrap();
        sink.write_mode(DeviceMode::Flat).unwrap();
        assert_eq!(fs::read_to_string(missing.join("mode")).unwrap(), "flat");
    }
}
