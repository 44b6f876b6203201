//! Unix-socket event bus
//!
//! Subscribers connect to a filesystem socket and receive one JSON line per
//! mode or orientation change (see [`super::protocol`]).
//!
//! # Threads
//!
//! - **Accept thread** (`event-bus-accept`): owns the listener. Every
//!   `poll_interval_ms` it accepts pending connections and drops clients
//!   whose peer has gone away.
//! - **Caller** (the sensing loop): [`EventBus::publish`] writes to every
//!   client before returning. Client sockets are non-blocking; a client
//!   whose send fails or would block is dropped, never retried.
//!
//! The client registry is the only state the two share.
//!
//! # Lifecycle
//!
//! ```text
//! Starting ──▶ Running ──▶ StopRequested ──▶ Stopped
//! ```
//!
//! [`EventBus::start`] returns once the accept thread reports `Running`.
//! [`EventBus::shutdown`] (also run on drop) stops the thread, waits up to
//! `shutdown_grace_ms`, sends a final `shutdown` event, closes every client
//! and removes the socket file. A thread that misses the grace period is
//! detached.

use std::fs;
use std::io;
use std::os::unix::fs::{DirBuilderExt, FileTypeExt, PermissionsExt};
use std::os::unix::net::UnixListener;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};

use super::protocol::{Event, EventKind, SHUTDOWN_VALUE};
use super::registry::{BroadcastReport, ClientRegistry};
use crate::config::EventBusConfig;
use crate::core::types::{DeviceMode, Orientation};
use crate::error::{Error, Result};

/// Accept thread lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AcceptState {
    Starting = 0,
    Running = 1,
    StopRequested = 2,
    Stopped = 3,
}

impl AcceptState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => AcceptState::Starting,
            1 => AcceptState::Running,
            2 => AcceptState::StopRequested,
            _ => AcceptState::Stopped,
        }
    }
}

/// State shared with the accept thread
struct Shared {
    registry: ClientRegistry<UnixStream>,
    state: AtomicU8,
    stop: AtomicBool,
}

impl Shared {
    fn set_state(&self, state: AcceptState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn state(&self) -> AcceptState {
        AcceptState::from_u8(self.state.load(Ordering::Acquire))
    }
}

/// Handle to a running event bus
pub struct EventBus {
    config: EventBusConfig,
    shared: Arc<Shared>,
    accept_thread: Option<JoinHandle<()>>,
    /// Closed by the accept thread when it exits
    exited: Receiver<()>,
    last_mode: Option<String>,
    last_orientation: Option<String>,
    shut_down: bool,
}

impl EventBus {
    /// Bind the socket and start accepting subscribers
    pub fn start(config: &EventBusConfig) -> Result<Self> {
        let path = config.socket_path.clone();
        let listener = bind_listener(&path)?;

        let shared = Arc::new(Shared {
            registry: ClientRegistry::new(),
            state: AtomicU8::new(AcceptState::Starting as u8),
            stop: AtomicBool::new(false),
        });

        let (ready_tx, ready_rx) = bounded::<()>(1);
        let (exit_tx, exit_rx) = bounded::<()>(1);
        let thread_shared = Arc::clone(&shared);
        let poll_interval = Duration::from_millis(config.poll_interval_ms);
        let max_clients = config.max_clients;

        let handle = thread::Builder::new()
            .name("event-bus-accept".to_string())
            .spawn(move || {
                accept_loop(
                    listener,
                    &thread_shared,
                    poll_interval,
                    max_clients,
                    ready_tx,
                );
                drop(exit_tx);
            })
            .map_err(|e| {
                remove_socket(&path);
                Error::AcceptThread(format!("spawn failed: {}", e))
            })?;

        let timeout = Duration::from_millis(config.startup_timeout_ms);
        if let Err(e) = ready_rx.recv_timeout(timeout) {
            shared.stop.store(true, Ordering::Release);
            remove_socket(&path);
            return Err(Error::AcceptThread(match e {
                RecvTimeoutError::Timeout => {
                    format!("not running after {} ms", config.startup_timeout_ms)
                }
                RecvTimeoutError::Disconnected => "exited during startup".to_string(),
            }));
        }

        info!("Event bus listening on {}", path.display());

        Ok(Self {
            config: config.clone(),
            shared,
            accept_thread: Some(handle),
            exited: exit_rx,
            last_mode: None,
            last_orientation: None,
            shut_down: false,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.config.socket_path
    }

    pub fn state(&self) -> AcceptState {
        self.shared.state()
    }

    pub fn client_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// Broadcast one event to every connected subscriber.
    ///
    /// Never fails: clients that cannot take the message are dropped, and a
    /// value the protocol cannot carry is logged and skipped.
    pub fn publish(
        &self,
        kind: EventKind,
        value: &str,
        previous: Option<&str>,
    ) -> BroadcastReport {
        let line = match Event::new(kind, value, previous).to_line() {
            Ok(line) => line,
            Err(e) => {
                warn!("Not publishing {} '{}': {}", kind, value, e);
                return BroadcastReport::default();
            }
        };

        let report = self.shared.registry.broadcast(line.as_bytes());
        if report.dropped > 0 {
            info!(
                "Dropped {} event client(s) on {} broadcast, {} remain",
                report.dropped,
                kind,
                report.delivered
            );
        }
        debug!("Published {} {} to {} client(s)", kind, value, report.delivered);
        report
    }

    /// Publish whichever of mode and orientation differs from the last
    /// broadcast value; returns the number of events published
    pub fn broadcast_if_changed(&mut self, mode: DeviceMode, orientation: Orientation) -> usize {
        let mut published = 0;

        let mode = mode.as_str();
        if self.last_mode.as_deref() != Some(mode) {
            let previous = self.last_mode.replace(mode.to_string());
            self.publish(EventKind::Mode, mode, previous.as_deref());
            published += 1;
        }

        let orientation = orientation.as_str();
        if self.last_orientation.as_deref() != Some(orientation) {
            let previous = self.last_orientation.replace(orientation.to_string());
            self.publish(EventKind::Orientation, orientation, previous.as_deref());
            published += 1;
        }

        published
    }

    /// Stop accepting, notify and disconnect subscribers, remove the socket.
    /// Idempotent.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        self.shared.set_state(AcceptState::StopRequested);
        self.shared.stop.store(true, Ordering::Release);

        if let Some(handle) = self.accept_thread.take() {
            let grace = Duration::from_millis(self.config.shutdown_grace_ms);
            match self.exited.recv_timeout(grace) {
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        "Event bus accept thread still running after {} ms, detaching",
                        self.config.shutdown_grace_ms
                    );
                }
                _ => {
                    if handle.join().is_err() {
                        error!("Event bus accept thread panicked");
                    }
                }
            }
        }

        let previous = self.last_mode.take();
        self.publish(EventKind::Mode, SHUTDOWN_VALUE, previous.as_deref());
        let closed = self.shared.registry.close_all();
        remove_socket(&self.config.socket_path);

        info!("Event bus stopped ({} client(s) closed)", closed);
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Create the parent directory, clear a stale socket and bind
fn bind_listener(path: &Path) -> Result<UnixListener> {
    let bind_err = |source: io::Error| Error::Bind {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            fs::DirBuilder::new()
                .recursive(true)
                .mode(0o755)
                .create(parent)
                .map_err(bind_err)?;
        }
    }

    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            debug!("Removing stale socket {}", path.display());
            fs::remove_file(path).map_err(bind_err)?;
        }
        Ok(_) => {
            return Err(bind_err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "path exists and is not a socket",
            )));
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(bind_err(e)),
    }

    let listener = UnixListener::bind(path).map_err(bind_err)?;
    listener.set_nonblocking(true).map_err(bind_err)?;

    // Unprivileged desktop clients must be able to connect
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o666)) {
        warn!("Cannot chmod {}: {}", path.display(), e);
    }

    Ok(listener)
}

fn remove_socket(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Cannot remove {}: {}", path.display(), e),
    }
}

fn accept_loop(
    listener: UnixListener,
    shared: &Shared,
    poll_interval: Duration,
    max_clients: usize,
    ready: Sender<()>,
) {
    shared.set_state(AcceptState::Running);
    let _ = ready.send(());

    while !shared.stop.load(Ordering::Acquire) {
        loop {
            match listener.accept() {
                Ok((stream, _)) => {
                    if shared.registry.len() >= max_clients {
                        warn!("Refusing event client: {} already connected", max_clients);
                        continue;
                    }
                    if let Err(e) = stream.set_nonblocking(true) {
                        warn!("Refusing event client: set_nonblocking: {}", e);
                        continue;
                    }
                    let count = shared.registry.add(stream);
                    info!("Event client connected ({} total)", count);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("Event bus accept error: {}", e);
                    break;
                }
            }
        }

        let gone = shared.registry.reap_disconnected();
        if gone > 0 {
            info!(
                "{} event client(s) disconnected, {} remain",
                gone,
                shared.registry.len()
            );
        }

        thread::sleep(poll_interval);
    }

    shared.set_state(AcceptState::Stopped);
    debug!("Event bus accept thread exiting");
}
