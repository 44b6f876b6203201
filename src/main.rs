//! convertd - convertible laptop mode daemon
//!
//! Polls the base and lid accelerometers, classifies the device mode and
//! screen orientation, writes both to the platform driver's sysfs
//! attributes and broadcasts changes on a Unix socket.
//!
//! ```text
//! convertd -c /etc/convertd.toml
//! convertd --mock -v          # simulated hinge, debug logging
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use log::{error, info, warn};

use convertd::core::types::{AccelSample, DeviceMode, Orientation};
use convertd::devices::{create_sensors, create_sink, AccelSource, SensorPair, StateSink};
use convertd::fusion::{FusionOutput, FusionPipeline};
use convertd::streaming::EventBus;
use convertd::{Config, Error, Result};

/// Convertible laptop mode and orientation daemon
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (defaults are used when it does not exist)
    #[arg(short, long, default_value = "/etc/convertd.toml")]
    config: PathBuf,

    /// Debug logging (overrides `[logging] level`)
    #[arg(short, long)]
    verbose: bool,

    /// Use the simulated hinge instead of IIO devices
    #[cfg(feature = "mock")]
    #[arg(long)]
    mock: bool,

    /// Do not start the event socket
    #[arg(long)]
    no_events: bool,

    /// Do not publish on D-Bus
    #[cfg(feature = "dbus")]
    #[arg(long)]
    no_dbus: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.config)?;

    let level = if args.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    info!("convertd v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Using config: {}", args.config.display());

    let mut sensors = open_sensors(&args, &config)?;
    let mut sink = create_sink(&config);

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    // The daemon keeps classifying without subscribers if the socket fails
    let mut bus = if config.events.enabled && !args.no_events {
        match EventBus::start(&config.events) {
            Ok(bus) => Some(bus),
            Err(e) => {
                error!("Event bus disabled: {}", e);
                None
            }
        }
    } else {
        info!("Event bus disabled");
        None
    };

    #[cfg(feature = "dbus")]
    let dbus = open_dbus(&args, &config);

    let mut pipeline = FusionPipeline::new(&config);
    let poll_interval = Duration::from_millis(config.sensors.poll_interval_ms);

    info!("convertd running. Press Ctrl-C to stop.");

    while running.load(Ordering::Relaxed) {
        if let Some(output) = poll_once(&mut sensors, &mut pipeline) {
            write_state(sink.as_mut(), output.mode, output.orientation);
            if let Some(bus) = bus.as_mut() {
                bus.broadcast_if_changed(output.mode, output.orientation);
            }
            #[cfg(feature = "dbus")]
            if let Some(dbus) = dbus.as_ref() {
                dbus.publish(output.mode, output.orientation);
            }
        }
        thread::sleep(poll_interval);
    }

    info!("Shutting down...");
    pipeline.reset();
    write_state(sink.as_mut(), DeviceMode::Laptop, Orientation::Landscape);
    #[cfg(feature = "dbus")]
    if let Some(dbus) = dbus.as_ref() {
        dbus.publish(DeviceMode::Laptop, Orientation::Landscape);
    }
    if let Some(mut bus) = bus.take() {
        bus.shutdown();
    }

    info!("convertd stopped");
    Ok(())
}

fn open_sensors(args: &Args, config: &Config) -> Result<SensorPair> {
    #[cfg(feature = "mock")]
    if args.mock {
        return Ok(convertd::devices::create_mock_sensors(config));
    }
    let _ = args;
    create_sensors(config)
}

/// The daemon runs without D-Bus if the bus is unreachable
#[cfg(feature = "dbus")]
fn open_dbus(args: &Args, config: &Config) -> Option<convertd::streaming::DbusPublisher> {
    if !config.dbus.enabled || args.no_dbus {
        info!("D-Bus disabled");
        return None;
    }
    match convertd::streaming::DbusPublisher::connect(&config.dbus) {
        Ok(publisher) => Some(publisher),
        Err(e) => {
            error!("D-Bus disabled: {}", e);
            None
        }
    }
}

/// Read one pair and run the classifiers. A missing or unreadable sample
/// skips the cycle.
fn poll_once(
    sensors: &mut SensorPair,
    pipeline: &mut FusionPipeline,
) -> Option<FusionOutput> {
    let base = read_sample(sensors.base.as_mut())?;
    let lid = read_sample(sensors.lid.as_mut())?;
    pipeline.process(&base, &lid, sensors.base.scale(), sensors.lid.scale())
}

fn read_sample(source: &mut dyn AccelSource) -> Option<AccelSample> {
    match source.next_sample() {
        Ok(sample) => sample,
        Err(e) => {
            warn!("{}: {}", source.name(), e);
            None
        }
    }
}

fn write_state(sink: &mut dyn StateSink, mode: DeviceMode, orientation: Orientation) {
    if let Err(e) = sink.write_mode(mode) {
        warn!("Failed to write mode: {}", e);
    }
    if let Err(e) = sink.write_orientation(orientation) {
        warn!("Failed to write orientation: {}", e);
    }
}
