// remoted - remote-control input translation daemon
// Grabs the remote's keyboard and mouse halves and re-emits translated
// events through the selected output transport

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};

use remoted_core::exit;
use remoted_core::keymap;
use remoted_core::mux::{Multiplexer, MuxError};
use remoted_core::table::KeyTable;
use remoted_core::transport::{DeviceFileSink, LircSink, Transport, TransportError, UinputSink};
use remoted_core::KeymapError;

#[derive(Parser, Debug)]
#[command(name = "remoted")]
#[command(version)]
#[command(about = "Translate a composite remote control into regular input events")]
struct Args {
    /// Keyboard-like and mouse-like event devices, in that order
    #[arg(value_name = "DEVICE")]
    devices: Vec<PathBuf>,

    /// Select the sources by event-device index instead: "<kbd> <mouse>"
    #[arg(short, long, value_name = "\"KBD MOUSE\"")]
    events: Option<String>,

    /// Keymap file patching the compiled lookup table
    #[arg(short, long, value_name = "FILE")]
    keymap: Option<PathBuf>,

    /// Output transport
    #[arg(short, long, value_enum, default_value = "uinput")]
    mode: OutputMode,

    /// Target device file for --mode dev
    #[arg(short = 'd', long, value_name = "FILE")]
    device: Option<PathBuf>,

    /// Socket path for --mode lirc
    #[arg(short, long, value_name = "PATH", conflicts_with = "systemd")]
    socket: Option<PathBuf>,

    /// Accept the listening socket from the service supervisor
    #[arg(short = 'S', long)]
    systemd: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputMode {
    /// Write raw event records to a device file
    Dev,
    /// Create a virtual input device
    Uinput,
    /// Serve lirc-style lines over a Unix socket
    Lirc,
}

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Keymap(#[from] KeymapError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Mux(#[from] MuxError),

    #[error("failed to install signal handler: {0}")]
    Signals(#[source] std::io::Error),
}

impl AppError {
    fn code(&self) -> u8 {
        match self {
            AppError::Usage(_) => exit::USAGE,
            AppError::Keymap(KeymapError::Open { .. }) => exit::NOINPUT,
            AppError::Keymap(_) => exit::DATAERR,
            AppError::Transport(_) => exit::OSERR,
            AppError::Mux(_) => exit::IOERR,
            AppError::Signals(_) => exit::OSERR,
        }
    }
}

fn event_path(index: u32) -> PathBuf {
    PathBuf::from(format!("/dev/input/event{index}"))
}

fn parse_event_indices(spec: &str) -> Option<(u32, u32)> {
    let mut parts = spec.split_whitespace();
    let kbd = parts.next()?.parse().ok()?;
    let mouse = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((kbd, mouse))
}

fn resolve_sources(args: &Args) -> Result<(PathBuf, PathBuf), AppError> {
    if let Some(spec) = &args.events {
        let (kbd, mouse) = parse_event_indices(spec)
            .ok_or_else(|| AppError::Usage(format!("invalid --events specification '{spec}'")))?;
        Ok((event_path(kbd), event_path(mouse)))
    } else if args.devices.len() >= 2 {
        Ok((args.devices[0].clone(), args.devices[1].clone()))
    } else {
        Err(AppError::Usage(
            "expected two input device paths or --events".into(),
        ))
    }
}

fn build_transport(args: &Args, table: &Arc<KeyTable>) -> Result<Transport, AppError> {
    match args.mode {
        OutputMode::Uinput => Ok(Transport::Uinput(UinputSink::create(table)?)),
        OutputMode::Dev => {
            let path = args
                .device
                .as_deref()
                .ok_or_else(|| AppError::Usage("--mode dev requires --device".into()))?;
            Ok(Transport::File(DeviceFileSink::open(path)?))
        }
        OutputMode::Lirc => {
            let sink = if args.systemd {
                LircSink::from_supervisor(table.clone())?
            } else {
                let path = args.socket.as_deref().ok_or_else(|| {
                    AppError::Usage("--mode lirc requires --socket or --systemd".into())
                })?;
                LircSink::bind(path, table.clone())?
            };
            Ok(Transport::Lirc(sink))
        }
    }
}

fn run(args: Args) -> Result<(), AppError> {
    let (kbd, mouse) = resolve_sources(&args)?;

    let mut table = KeyTable::with_defaults();
    if let Some(path) = &args.keymap {
        let applied = keymap::load_file(path, &mut table)?;
        log::info!("applied {applied} keymap override(s) from {}", path.display());
    }
    let table = Arc::new(table);

    let transport = build_transport(&args, &table)?;

    // The flag is raised by the signal handler; the wait loop notices on
    // its next wakeup (poll returns EINTR when the signal lands). SIGPIPE
    // is routed here too so a vanished socket client surfaces as a write
    // error instead of killing the process outright.
    let stop = Arc::new(AtomicBool::new(false));
    for signal in [
        signal_hook::consts::SIGINT,
        signal_hook::consts::SIGTERM,
        signal_hook::consts::SIGPIPE,
    ] {
        signal_hook::flag::register(signal, stop.clone()).map_err(AppError::Signals)?;
    }

    let mut mux = Multiplexer::open(&[kbd, mouse], table, transport)?;
    log::info!("translating events");
    mux.run(&stop)?;

    log::info!("shutting down");
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = err.print();
            return ExitCode::from(exit::OK);
        }
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(exit::USAGE);
        }
    };

    match run(args) {
        Ok(()) => ExitCode::from(exit::OK),
        Err(err) => {
            log::error!("{err}");
            ExitCode::from(err.code())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_positional_devices() {
        let args = Args::parse_from(["remoted", "/dev/input/event4", "/dev/input/event5"]);
        assert_eq!(args.devices.len(), 2);
        assert_eq!(args.mode, OutputMode::Uinput);
        let (kbd, mouse) = resolve_sources(&args).unwrap();
        assert_eq!(kbd, PathBuf::from("/dev/input/event4"));
        assert_eq!(mouse, PathBuf::from("/dev/input/event5"));
    }

    #[test]
    fn test_args_event_indices_override_positionals() {
        let args = Args::parse_from(["remoted", "-e", "4 5", "/dev/input/event9"]);
        let (kbd, mouse) = resolve_sources(&args).unwrap();
        assert_eq!(kbd, PathBuf::from("/dev/input/event4"));
        assert_eq!(mouse, PathBuf::from("/dev/input/event5"));
    }

    #[test]
    fn test_args_missing_devices_is_a_usage_error() {
        let args = Args::parse_from(["remoted", "/dev/input/event4"]);
        assert!(matches!(
            resolve_sources(&args),
            Err(AppError::Usage(_))
        ));
    }

    #[test]
    fn test_bad_event_spec_is_a_usage_error() {
        for spec in ["4", "4 x", "4 5 6", ""] {
            assert_eq!(parse_event_indices(spec), None, "spec '{spec}'");
        }
        assert_eq!(parse_event_indices("4 5"), Some((4, 5)));
    }

    #[test]
    fn test_socket_and_systemd_are_mutually_exclusive() {
        let result = Args::try_parse_from([
            "remoted", "-m", "lirc", "-s", "/run/remoted.sock", "-S", "a", "b",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_mode_values_parse() {
        for (text, mode) in [
            ("dev", OutputMode::Dev),
            ("uinput", OutputMode::Uinput),
            ("lirc", OutputMode::Lirc),
        ] {
            let args = Args::parse_from(["remoted", "-m", text, "a", "b"]);
            assert_eq!(args.mode, mode);
        }
    }

    #[test]
    fn test_dev_mode_requires_a_target() {
        let args = Args::parse_from(["remoted", "-m", "dev", "a", "b"]);
        let table = Arc::new(KeyTable::with_defaults());
        assert!(matches!(
            build_transport(&args, &table),
            Err(AppError::Usage(_))
        ));
    }
}
