//! Event bus: mode and orientation changes over a Unix socket, optionally
//! mirrored on D-Bus

pub mod dbus;
pub mod event_bus;
pub mod protocol;
pub mod registry;
pub mod subscriber;

#[cfg(feature = "dbus")]
pub use dbus::DbusPublisher;
pub use event_bus::{AcceptState, EventBus};
pub use protocol::{is_tablet_mode, Event, EventKind, MAX_LINE_LEN, MAX_VALUE_LEN};
pub use registry::{BroadcastReport, ClientRegistry, EventClient};
pub use subscriber::EventSubscriber;
