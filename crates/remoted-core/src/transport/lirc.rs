// Line-protocol sink
// lirc-style text lines over a Unix socket, one client per process

use std::env;
use std::fs;
use std::io::Write;
use std::net::Shutdown;
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::process;
use std::sync::Arc;

use evdev::{EventType, InputEvent};

use super::TransportError;
use crate::table::KeyTable;

/// First descriptor passed down by a socket-activating supervisor.
const LISTEN_FDS_START: RawFd = 3;

/// Write-only line-protocol connection to a single client.
#[derive(Debug)]
pub struct LircSink {
    stream: UnixStream,
    table: Arc<KeyTable>,
}

impl LircSink {
    /// Bind a listening socket on `path`, then wait for the one client this
    /// process will serve. A stale socket file from a previous run is
    /// removed before binding.
    pub fn bind(path: &Path, table: Arc<KeyTable>) -> Result<Self, TransportError> {
        let _ = fs::remove_file(path);
        let listener = UnixListener::bind(path).map_err(TransportError::Socket)?;
        log::info!("listening on {}", path.display());
        Self::accept_on(listener, table)
    }

    /// Take the listening socket from a socket-activating supervisor
    /// (LISTEN_PID/LISTEN_FDS handover), then wait for the one client.
    pub fn from_supervisor(table: Arc<KeyTable>) -> Result<Self, TransportError> {
        let pid = env::var("LISTEN_PID")
            .ok()
            .and_then(|v| v.parse::<u32>().ok());
        if pid != Some(process::id()) {
            return Err(TransportError::NoActivationSocket);
        }

        let fds = env::var("LISTEN_FDS")
            .ok()
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(0);
        if fds < 1 {
            return Err(TransportError::NoActivationSocket);
        }
        if fds > 1 {
            log::warn!("ignoring {} extra supervisor descriptor(s)", fds - 1);
        }

        let listener = unsafe { UnixListener::from_raw_fd(LISTEN_FDS_START) };
        Self::accept_on(listener, table)
    }

    fn accept_on(listener: UnixListener, table: Arc<KeyTable>) -> Result<Self, TransportError> {
        log::info!("waiting for a client connection");
        let (stream, _) = listener.accept().map_err(TransportError::Socket)?;
        // Write-only channel: nothing a client sends is ever read.
        stream
            .shutdown(Shutdown::Read)
            .map_err(TransportError::Socket)?;
        log::info!("client connected");
        Ok(Self { stream, table })
    }

    pub fn poll_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }

    /// Emit one line per key or relative record with a positive value;
    /// releases, terminators, and synthesized scan echoes produce no line.
    pub fn emit(&mut self, batch: &[InputEvent]) -> Result<(), TransportError> {
        for ev in batch {
            if ev.value() <= 0 {
                continue;
            }
            let ty = ev.event_type();
            let name = if ty == EventType::KEY {
                self.table.reverse_resolve(ev.code())
            } else if ty == EventType::RELATIVE {
                None
            } else {
                continue;
            };

            let line = format_line(ty.0, ev.code(), ev.value(), name);
            self.stream
                .write_all(line.as_bytes())
                .map_err(TransportError::Write)?;
        }
        Ok(())
    }
}

/// One protocol line: the composite code (event type in the high 16 bits,
/// key code in the low 16), the value as a zero-based repeat count, and the
/// display name or a typed hex placeholder.
fn format_line(ty: u16, code: u16, value: i32, name: Option<&str>) -> String {
    let composite = (u32::from(ty) << 16) | u32::from(code);
    let count = value - 1;
    match name {
        Some(name) => format!("{composite:010x} {count} {name}\n"),
        None => {
            let prefix = if ty == EventType::KEY.0 {
                "KEY_"
            } else if ty == EventType::RELATIVE.0 {
                "REL_"
            } else {
                "EV_"
            };
            format!("{composite:010x} {count} {prefix}{composite:08x}\n")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evdev::Key;
    use std::io::Read;
    use std::thread;

    #[test]
    fn test_format_line_with_resolved_name() {
        assert_eq!(format_line(0x0001, 0x0004, 3, Some("KEY_3")), "0000010004 2 KEY_3\n");
    }

    #[test]
    fn test_format_line_placeholder_for_unresolved_key() {
        assert_eq!(
            format_line(0x0001, 0x0123, 1, None),
            "0000010123 0 KEY_00010123\n"
        );
    }

    #[test]
    fn test_format_line_placeholder_for_relative_axis() {
        assert_eq!(format_line(0x0002, 0x0008, 5, None), "0000020008 4 REL_00020008\n");
    }

    #[test]
    fn test_emit_skips_releases_and_terminators() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("remoted.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let client = thread::spawn({
            let path = path.clone();
            move || {
                let mut stream = UnixStream::connect(path).unwrap();
                let mut received = String::new();
                stream.read_to_string(&mut received).unwrap();
                received
            }
        });

        let table = Arc::new(KeyTable::with_defaults());
        let mut sink = LircSink::accept_on(listener, table).unwrap();

        let batch = [
            InputEvent::new(EventType::KEY, Key::KEY_VOLUMEUP.0, 1),
            InputEvent::new(EventType::SYNCHRONIZATION, 0, 0),
            InputEvent::new(EventType::KEY, Key::KEY_VOLUMEUP.0, 0),
        ];
        sink.emit(&batch).unwrap();
        drop(sink);

        let received = client.join().unwrap();
        let composite = (u32::from(EventType::KEY.0) << 16) | u32::from(Key::KEY_VOLUMEUP.0);
        assert_eq!(received, format!("{composite:010x} 0 KEY_VOLUMEUP\n"));
    }

    #[test]
    fn test_supervisor_handover_requires_matching_pid() {
        // LISTEN_PID is unset (or someone else's) in the test environment.
        let err = LircSink::from_supervisor(Arc::new(KeyTable::with_defaults())).unwrap_err();
        assert!(matches!(err, TransportError::NoActivationSocket));
    }
}
