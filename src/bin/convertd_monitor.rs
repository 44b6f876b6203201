//! Print events from a running convertd
//!
//! ```text
//! convertd-monitor                       # until the daemon exits
//! convertd-monitor --count 2 --json
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use convertd::config::EventBusConfig;
use convertd::streaming::{is_tablet_mode, EventKind, EventSubscriber};

/// Subscribe to convertd mode and orientation events
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Event socket
    #[arg(short, long, default_value_os_t = EventBusConfig::default().socket_path)]
    socket: PathBuf,

    /// Exit after this many events (0 = until the daemon disconnects)
    #[arg(short = 'n', long, default_value = "0")]
    count: usize,

    /// Print raw JSON lines
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let mut subscriber = match EventSubscriber::connect(&args.socket) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut seen = 0;
    for event in &mut subscriber {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                eprintln!("Read error: {}", e);
                return ExitCode::FAILURE;
            }
        };

        if args.json {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => eprintln!("{}", e),
            }
        } else {
            let previous = event.previous.as_deref().unwrap_or("-");
            let marker = if event.kind == EventKind::Mode && is_tablet_mode(&event.value) {
                " [tablet]"
            } else {
                ""
            };
            println!(
                "{:.3} {:<11} {} -> {}{}",
                event.timestamp,
                event.kind.as_str(),
                previous,
                event.value,
                marker
            );
        }

        seen += 1;
        if args.count > 0 && seen >= args.count {
            break;
        }
    }

    ExitCode::SUCCESS
}
