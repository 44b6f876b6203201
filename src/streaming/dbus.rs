//! D-Bus mirror of the classified state
//!
//! Exposes the current orientation through the iio-sensor-proxy interface
//! (`net.hadess.SensorProxy`) so desktop shells rotate without extra glue,
//! and the device mode through `com.noonshy.TabletMode1` and
//! `org.freedesktop.TabletMode1`. Property changes are announced with the
//! standard `PropertiesChanged` signal.
//!
//! The bus connection itself needs the `dbus` feature; the state tracking
//! below is always built.

use crate::core::types::{DeviceMode, Orientation};

/// Object path of the tablet-mode interfaces
pub const OBJECT_PATH: &str = "/com/noonshy/cmxd";
/// Object path of the sensor-proxy interface
pub const SENSOR_PROXY_PATH: &str = "/net/hadess/SensorProxy";

/// iio-sensor-proxy name for a screen orientation
pub fn sensor_proxy_orientation(orientation: Orientation) -> &'static str {
    match orientation {
        Orientation::Landscape => "normal",
        Orientation::Portrait => "right-up",
        Orientation::PortraitFlipped => "left-up",
        Orientation::LandscapeFlipped => "bottom-up",
    }
}

/// Which exported properties changed in one update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropertyChanges {
    pub device_mode: bool,
    pub tablet_mode: bool,
    pub orientation: bool,
}

impl PropertyChanges {
    pub fn any(&self) -> bool {
        self.device_mode || self.tablet_mode || self.orientation
    }
}

/// Last state exported on the bus. Nothing has been exported until the
/// first update, so that update reports every property as changed.
#[derive(Debug, Clone, Copy, Default)]
pub struct DbusState {
    mode: Option<DeviceMode>,
    orientation: Option<Orientation>,
}

impl DbusState {
    pub fn update(&mut self, mode: DeviceMode, orientation: Orientation) -> PropertyChanges {
        let was_tablet = self.mode.map(|m| m == DeviceMode::Tablet);
        let changes = PropertyChanges {
            device_mode: self.mode != Some(mode),
            tablet_mode: was_tablet != Some(mode == DeviceMode::Tablet),
            orientation: self.orientation != Some(orientation),
        };
        self.mode = Some(mode);
        self.orientation = Some(orientation);
        changes
    }

    pub fn device_mode(&self) -> DeviceMode {
        self.mode.unwrap_or_default()
    }

    pub fn tablet_mode(&self) -> bool {
        self.mode == Some(DeviceMode::Tablet)
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation.unwrap_or_default()
    }
}

#[cfg(feature = "dbus")]
pub use service::DbusPublisher;

#[cfg(feature = "dbus")]
mod service {
    use std::sync::Arc;

    use log::{debug, info, warn};
    use parking_lot::Mutex;
    use zbus::blocking::{connection, Connection};
    use zbus::interface;

    use super::{sensor_proxy_orientation, DbusState, PropertyChanges, OBJECT_PATH, SENSOR_PROXY_PATH};
    use crate::config::DbusConfig;
    use crate::core::types::{DeviceMode, Orientation};
    use crate::error::{Error, Result};

    type SharedState = Arc<Mutex<DbusState>>;

    struct SensorProxy {
        state: SharedState,
    }

    #[interface(name = "net.hadess.SensorProxy")]
    impl SensorProxy {
        /// Readings are always flowing; claims are accepted and ignored
        fn claim_accelerometer(&self) {}

        fn release_accelerometer(&self) {}

        #[zbus(property)]
        fn has_accelerometer(&self) -> bool {
            true
        }

        #[zbus(property)]
        fn accelerometer_orientation(&self) -> String {
            sensor_proxy_orientation(self.state.lock().orientation()).to_string()
        }
    }

    struct TabletMode {
        state: SharedState,
    }

    #[interface(name = "com.noonshy.TabletMode1")]
    impl TabletMode {
        #[zbus(property)]
        fn tablet_mode(&self) -> bool {
            self.state.lock().tablet_mode()
        }

        #[zbus(property)]
        fn device_mode(&self) -> String {
            self.state.lock().device_mode().as_str().to_string()
        }
    }

    struct FreedesktopTabletMode {
        state: SharedState,
    }

    #[interface(name = "org.freedesktop.TabletMode1")]
    impl FreedesktopTabletMode {
        #[zbus(property)]
        fn tablet_mode(&self) -> bool {
            self.state.lock().tablet_mode()
        }
    }

    fn dbus_err(e: zbus::Error) -> Error {
        Error::Other(format!("D-Bus: {}", e))
    }

    /// Owns the bus name and the exported objects
    pub struct DbusPublisher {
        conn: Connection,
        config: DbusConfig,
        state: SharedState,
    }

    impl DbusPublisher {
        pub fn connect(config: &DbusConfig) -> Result<Self> {
            let state = SharedState::default();

            let builder = if config.session_bus {
                connection::Builder::session()
            } else {
                connection::Builder::system()
            }
            .map_err(dbus_err)?;
            let mut builder = builder
                .name(config.service_name.as_str())
                .map_err(dbus_err)?;

            if config.sensor_proxy {
                let iface = SensorProxy {
                    state: Arc::clone(&state),
                };
                builder = builder.serve_at(SENSOR_PROXY_PATH, iface).map_err(dbus_err)?;
            }
            if config.tablet_mode {
                let iface = TabletMode {
                    state: Arc::clone(&state),
                };
                builder = builder.serve_at(OBJECT_PATH, iface).map_err(dbus_err)?;
            }
            if config.freedesktop {
                let iface = FreedesktopTabletMode {
                    state: Arc::clone(&state),
                };
                builder = builder.serve_at(OBJECT_PATH, iface).map_err(dbus_err)?;
            }

            let conn = builder.build().map_err(dbus_err)?;
            info!(
                "D-Bus: {} on the {} bus",
                config.service_name,
                if config.session_bus { "session" } else { "system" }
            );

            Ok(Self {
                conn,
                config: config.clone(),
                state,
            })
        }

        /// Update the exported state, signalling only what changed
        pub fn publish(&self, mode: DeviceMode, orientation: Orientation) {
            let changes = self.state.lock().update(mode, orientation);
            if !changes.any() {
                return;
            }
            debug!("D-Bus update: {} {} {:?}", mode, orientation, changes);
            if let Err(e) = self.emit(changes) {
                warn!("D-Bus: PropertiesChanged failed: {}", e);
            }
        }

        fn emit(&self, changes: PropertyChanges) -> zbus::Result<()> {
            let server = self.conn.object_server();

            if changes.orientation && self.config.sensor_proxy {
                let iface = server.interface::<_, SensorProxy>(SENSOR_PROXY_PATH)?;
                zbus::block_on(
                    iface
                        .get()
                        .accelerometer_orientation_changed(iface.signal_context()),
                )?;
            }

            if self.config.tablet_mode && (changes.tablet_mode || changes.device_mode) {
                let iface = server.interface::<_, TabletMode>(OBJECT_PATH)?;
                let ctxt = iface.signal_context();
                if changes.tablet_mode {
                    zbus::block_on(iface.get().tablet_mode_changed(ctxt))?;
                }
                if changes.device_mode {
                    zbus::block_on(iface.get().device_mode_changed(ctxt))?;
                }
            }

            if changes.tablet_mode && self.config.freedesktop {
                let iface = server.interface::<_, FreedesktopTabletMode>(OBJECT_PATH)?;
                zbus::block_on(iface.get().tablet_mode_changed(iface.signal_context()))?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_names() {
        let names: Vec<&str> = Orientation::ALL
            .iter()
            .map(|o| sensor_proxy_orientation(*o))
            .collect();
        assert_eq!(names, vec!["normal", "bottom-up", "right-up", "left-up"]);
    }

    #[test]
    fn test_first_update_changes_everything() {
        let mut state = DbusState::default();
        assert!(!state.tablet_mode());
        assert_eq!(state.orientation(), Orientation::Landscape);

        let changes = state.update(DeviceMode::Laptop, Orientation::Landscape);
        assert_eq!(
            changes,
            PropertyChanges {
                device_mode: true,
                tablet_mode: true,
                orientation: true,
            }
        );
        assert!(!state.update(DeviceMode::Laptop, Orientation::Landscape).any());
    }

    #[test]
    fn test_tablet_flag_follows_mode() {
        let mut state = DbusState::default();
        state.update(DeviceMode::Flat, Orientation::Landscape);

        // Flat -> Tent changes the mode but not the tablet flag
        let changes = state.update(DeviceMode::Tent, Orientation::Landscape);
        assert!(changes.device_mode);
        assert!(!changes.tablet_mode);
        assert!(!changes.orientation);

        let changes = state.update(DeviceMode::Tablet, Orientation::Portrait);
        assert!(changes.device_mode && changes.tablet_mode && changes.orientation);
        assert!(state.tablet_mode());
        assert_eq!(state.device_mode(), DeviceMode::Tablet);

        let changes = state.update(DeviceMode::Tent, Orientation::Portrait);
        assert!(changes.tablet_mode);
        assert!(!changes.orientation);
        assert!(!state.tablet_mode());
    }
}
