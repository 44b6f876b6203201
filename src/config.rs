//! Configuration for convertd
//!
//! Every calibration constant of the fusion pipeline lives here so that
//! different chassis can be tuned without a rebuild. All sections are
//! optional in the TOML file; missing keys take the defaults below.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level daemon configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub sensors: SensorsConfig,
    pub output: OutputConfig,
    pub hinge: HingeConfig,
    pub mode: ModeConfig,
    pub orientation: OrientationConfig,
    pub events: EventBusConfig,
    pub dbus: DbusConfig,
    pub logging: LoggingConfig,
    pub mock: MockConfig,
}

/// Accelerometer discovery and polling
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SensorsConfig {
    /// IIO device name of the base accelerometer (e.g. `iio:device0`).
    ///
    /// When unset, the name is read from `<output.sysfs_path>/iio_base_device`.
    pub base_device: Option<String>,
    /// IIO device name of the lid accelerometer
    pub lid_device: Option<String>,
    /// Directory holding the IIO devices
    pub iio_root: PathBuf,
    /// Scale (m/s² per LSB) used when `in_accel_scale` is missing or invalid
    pub default_scale: f64,
    /// Evaluation cycle period
    pub poll_interval_ms: u64,
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            base_device: None,
            lid_device: None,
            iio_root: PathBuf::from("/sys/bus/iio/devices"),
            default_scale: 0.009582,
            poll_interval_ms: 100,
        }
    }
}

/// Kernel-module sysfs state sink
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub enabled: bool,
    /// Platform device directory holding the `mode` and `orientation` attributes
    pub sysfs_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sysfs_path: PathBuf::from("/sys/devices/platform/cmx"),
        }
    }
}

/// Hinge-angle estimator thresholds
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HingeConfig {
    /// Readings weaker than this (m/s²) are rejected as shock/vibration
    pub min_gravity: f64,
    /// `cross_y` must drop below this to enter fold-back
    pub fold_enter_threshold: f64,
    /// `cross_y` must stay below this to remain folded back
    pub fold_exit_threshold: f64,
    /// Transition zone where chassis tilt compensation may apply (degrees)
    pub compensation_min_deg: f64,
    pub compensation_max_deg: f64,
    /// In-plane acceleration (m/s²) that marks the base as tilted
    pub base_horizontal_threshold: f64,
    /// In-plane acceleration (m/s²) that marks the lid as tilted
    pub lid_horizontal_threshold: f64,
    /// Combined in-plane acceleration above which the factor grows
    pub tilt_reference: f64,
    /// Factor growth per m/s² above `tilt_reference`
    pub tilt_gain: f64,
    pub max_tilt_factor: f64,
    /// Angle from which the additive boost starts
    pub boost_start_deg: f64,
    /// Boost per degree past `boost_start_deg`
    pub boost_gain: f64,
    /// Upper bound on the correction (degrees)
    pub max_correction_deg: f64,
    /// Corrections smaller than this are discarded
    pub min_correction_deg: f64,
}

impl Default for HingeConfig {
    fn default() -> Self {
        Self {
            min_gravity: 1.0,
            fold_enter_threshold: -5.0,
            fold_exit_threshold: 5.0,
            compensation_min_deg: 90.0,
            compensation_max_deg: 110.0,
            base_horizontal_threshold: 6.0,
            lid_horizontal_threshold: 8.0,
            tilt_reference: 10.0,
            tilt_gain: 0.05,
            max_tilt_factor: 1.3,
            boost_start_deg: 95.0,
            boost_gain: 0.5,
            max_correction_deg: 50.0,
            min_correction_deg: 2.0,
        }
    }
}

/// Mode classifier bins, hysteresis and stability
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModeConfig {
    /// Upper (exclusive) bound of the closing bin
    pub closing_max_deg: f64,
    pub laptop_max_deg: f64,
    pub flat_max_deg: f64,
    /// Upper bound of the tent bin; tablet runs from here to 360
    pub tent_max_deg: f64,
    /// Margin an angle must clear past a boundary to leave the current bin
    pub hysteresis_deg: f64,
    /// Consecutive agreeing evaluations before a transition commits
    pub stability_samples: u32,
    /// Evaluations to hold the mode after the orientation hint changes (0 = off)
    pub orientation_freeze_samples: u32,
    /// Number of committed transitions kept for inspection
    pub history_len: usize,
    pub gravity: GravityConfig,
}

impl Default for ModeConfig {
    fn default() -> Self {
        Self {
            closing_max_deg: 45.0,
            laptop_max_deg: 160.0,
            flat_max_deg: 240.0,
            tent_max_deg: 330.0,
            hysteresis_deg: 10.0,
            stability_samples: 3,
            orientation_freeze_samples: 0,
            history_len: 16,
            gravity: GravityConfig::default(),
        }
    }
}

/// Gravity-confidence gate for mode changes
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GravityConfig {
    pub enabled: bool,
    /// Plausible gravity magnitude range (m/s²)
    pub min_magnitude: f64,
    pub max_magnitude: f64,
    /// Lower magnitude bound while in tent, where inverted readings run weak
    pub tent_min_magnitude: f64,
    /// Per-mode limit on combined in-plane acceleration (m/s²)
    pub closing_tolerance: f64,
    pub laptop_tolerance: f64,
    pub flat_tolerance: f64,
    pub tent_tolerance: f64,
    pub tablet_tolerance: f64,
}

impl Default for GravityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_magnitude: 7.5,
            max_magnitude: 13.0,
            tent_min_magnitude: 5.5,
            closing_tolerance: 12.0,
            laptop_tolerance: 12.0,
            flat_tolerance: 18.0,
            tent_tolerance: 20.0,
            tablet_tolerance: 15.0,
        }
    }
}

/// Orientation classifier thresholds
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OrientationConfig {
    /// Tilt change (degrees per evaluation) counted as rapid movement
    pub tilt_lock_delta_deg: f64,
    /// Consecutive rapid changes that engage the lock
    pub tilt_lock_samples: u32,
    /// Tilt change below which an evaluation counts as calm
    pub tilt_unlock_delta_deg: f64,
    /// Consecutive calm evaluations that release the lock
    pub tilt_unlock_samples: u32,
    /// Tilt above which a tablet is considered reclined for reading
    pub reading_tilt_deg: f64,
    /// Consecutive portrait evaluations before reading protection engages
    pub reading_stable_samples: u32,
}

impl Default for OrientationConfig {
    fn default() -> Self {
        Self {
            tilt_lock_delta_deg: 15.0,
            tilt_lock_samples: 3,
            tilt_unlock_delta_deg: 2.0,
            tilt_unlock_samples: 10,
            reading_tilt_deg: 70.0,
            reading_stable_samples: 10,
        }
    }
}

/// Unix-socket event bus
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EventBusConfig {
    pub enabled: bool,
    pub socket_path: PathBuf,
    /// Accept-thread wait between polls
    pub poll_interval_ms: u64,
    /// How long `start` waits for the accept thread to report running
    pub startup_timeout_ms: u64,
    /// How long `shutdown` waits for the accept thread before detaching it
    pub shutdown_grace_ms: u64,
    /// Connections beyond this are refused
    pub max_clients: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            socket_path: PathBuf::from("/run/convertd/events.sock"),
            poll_interval_ms: 50,
            startup_timeout_ms: 5000,
            shutdown_grace_ms: 5000,
            max_clients: 32,
        }
    }
}

impl EventBusConfig {
    /// Defaults with a different socket path
    pub fn with_socket<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            socket_path: path.into(),
            ..Self::default()
        }
    }
}

/// D-Bus publishing; only used when built with the `dbus` feature
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DbusConfig {
    pub enabled: bool,
    /// Connect to the session bus instead of the system bus
    pub session_bus: bool,
    /// Well-known name requested on the bus
    pub service_name: String,
    /// `net.hadess.SensorProxy` at `/net/hadess/SensorProxy`
    pub sensor_proxy: bool,
    /// `com.noonshy.TabletMode1` at the service object path
    pub tablet_mode: bool,
    /// `org.freedesktop.TabletMode1` at the service object path
    pub freedesktop: bool,
}

impl Default for DbusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            session_bus: false,
            service_name: "com.noonshy.cmxd".to_string(),
            sensor_proxy: true,
            tablet_mode: true,
            freedesktop: true,
        }
    }
}

/// Synthetic accelerometer pair used by `convertd --mock`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MockConfig {
    /// Initial hinge angle
    pub angle_deg: f64,
    /// Hinge travel per sample; 0 holds the angle
    pub sweep_deg_per_sample: f64,
    /// Sweep bounces between these angles
    pub sweep_min_deg: f64,
    pub sweep_max_deg: f64,
    /// Gaussian noise per axis (m/s²)
    pub noise_stddev: f64,
    /// Chance that a poll reports no data yet
    pub dropout_probability: f64,
    /// Scale reported by both simulated sensors
    pub scale: f64,
    /// 0 draws a fresh seed each run
    pub seed: u64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            angle_deg: 110.0,
            sweep_deg_per_sample: 0.0,
            sweep_min_deg: 10.0,
            sweep_max_deg: 350.0,
            noise_stddev: 0.05,
            dropout_probability: 0.0,
            scale: 0.009582,
            seed: 42,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter (trace, debug, info, warn, error); `RUST_LOG` wins
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Parse configuration from a TOML file
    ///
    /// # Example
    /// ```no_run
    /// use convertd::config::Config;
    ///
    /// let config = Config::from_file("/etc/convertd.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::from_file`], but a missing file yields the defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Reject values the classifiers cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(self.sensors.default_scale.is_finite() && self.sensors.default_scale > 0.0) {
            return Err(Error::Config(format!(
                "sensors.default_scale must be positive, got {}",
                self.sensors.default_scale
            )));
        }
        if self.sensors.poll_interval_ms == 0 {
            return Err(Error::Config("sensors.poll_interval_ms must be > 0".into()));
        }

        let h = &self.hinge;
        if h.fold_enter_threshold > h.fold_exit_threshold {
            return Err(Error::Config(format!(
                "hinge.fold_enter_threshold ({}) must not exceed fold_exit_threshold ({})",
                h.fold_enter_threshold, h.fold_exit_threshold
            )));
        }
        if h.max_tilt_factor < 1.0 || h.max_correction_deg < 0.0 {
            return Err(Error::Config(
                "hinge compensation must never reduce the angle".into(),
            ));
        }

        let m = &self.mode;
        let bounds = [
            0.0,
            m.closing_max_deg,
            m.laptop_max_deg,
            m.flat_max_deg,
            m.tent_max_deg,
            360.0,
        ];
        if bounds
            .windows(2)
            .any(|w| w[0].partial_cmp(&w[1]) != Some(std::cmp::Ordering::Less))
        {
            return Err(Error::Config(format!(
                "mode boundaries must be strictly increasing within (0, 360): {:?}",
                &bounds[1..5]
            )));
        }
        if m.hysteresis_deg.is_nan() || m.hysteresis_deg < 0.0 {
            return Err(Error::Config("mode.hysteresis_deg must be >= 0".into()));
        }
        if m.stability_samples == 0 {
            return Err(Error::Config("mode.stability_samples must be >= 1".into()));
        }

        let o = &self.orientation;
        if o.tilt_lock_samples == 0 || o.tilt_unlock_samples == 0 {
            return Err(Error::Config(
                "orientation tilt lock sample counts must be >= 1".into(),
            ));
        }

        let mk = &self.mock;
        if !(mk.scale.is_finite() && mk.scale > 0.0) {
            return Err(Error::Config(format!("mock.scale must be positive, got {}", mk.scale)));
        }
        if mk.sweep_min_deg > mk.sweep_max_deg {
            return Err(Error::Config(
                "mock.sweep_min_deg must not exceed sweep_max_deg".into(),
            ));
        }

        let e = &self.events;
        if e.poll_interval_ms == 0 {
            return Err(Error::Config("events.poll_interval_ms must be > 0".into()));
        }
        if e.max_clients == 0 {
            return Err(Error::Config("events.max_clients must be >= 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.mode.laptop_max_deg, 160.0);
        assert_eq!(config.mode.stability_samples, 3);
        assert_eq!(config.hinge.fold_enter_threshold, -5.0);
        assert_eq!(config.sensors.default_scale, 0.009582);
        assert_eq!(
            config.events.socket_path,
            PathBuf::from("/run/convertd/events.sock")
        );
        assert!(!config.mode.gravity.enabled);
        assert!(config.dbus.enabled);
        assert!(!config.dbus.session_bus);
        assert_eq!(config.dbus.service_name, "com.noonshy.cmxd");
        config.validate().unwrap();
    }

    #[test]
    fn test_dbus_section() {
        let config: Config = toml::from_str(
            r#"
[dbus]
session_bus = true
sensor_proxy = false
"#,
        )
        .unwrap();
        assert!(config.dbus.enabled);
        assert!(config.dbus.session_bus);
        assert!(!config.dbus.sensor_proxy);
        assert!(config.dbus.tablet_mode);
    }

    #[test]
    fn test_partial_toml() {
        let toml_content = r#"
[mode]
laptop_max_deg = 145.0
hysteresis_deg = 15.0

[events]
socket_path = "/tmp/convertd-test.sock"

[logging]
level = "debug"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.mode.laptop_max_deg, 145.0);
        assert_eq!(config.mode.hysteresis_deg, 15.0);
        assert_eq!(config.mode.flat_max_deg, 240.0);
        assert_eq!(config.events.max_clients, 32);
        assert_eq!(config.logging.level, "debug");
        config.validate().unwrap();
    }

    #[test]
    fn test_gravity_subtable() {
        let config: Config = toml::from_str(
            r#"
[mode.gravity]
enabled = true
tablet_tolerance = 16.5
"#,
        )
        .unwrap();
        assert!(config.mode.gravity.enabled);
        assert_eq!(config.mode.gravity.tablet_tolerance, 16.5);
        assert_eq!(config.mode.gravity.flat_tolerance, 18.0);
    }

    #[test]
    fn test_rejects_unordered_boundaries() {
        let mut config = Config::default();
        config.mode.flat_max_deg = 100.0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.mode.tent_max_deg = 360.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_stability() {
        let mut config = Config::default();
        config.mode.stability_samples = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_fold_thresholds() {
        let mut config = Config::default();
        config.hinge.fold_enter_threshold = 6.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.mode.tent_max_deg, 330.0);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("convertd.toml");

        let mut config = Config::default();
        config.sensors.base_device = Some("iio:device1".to_string());
        config.orientation.reading_tilt_deg = 65.0;
        config.to_file(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.sensors.base_device.as_deref(), Some("iio:device1"));
        assert_eq!(loaded.orientation.reading_tilt_deg, 65.0);
    }

    #[test]
    fn test_parse_error_surfaces() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[mode\nlaptop_max_deg = ").unwrap();
        assert!(matches!(Config::load(&path), Err(Error::ConfigParse(_))));
    }
}
