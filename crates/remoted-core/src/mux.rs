// Source multiplexer
// Exclusive-grabs the raw sources and drives decoder and transport from
// a single blocking readiness wait

use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use evdev::Device;

use crate::decoder::Decoder;
use crate::table::KeyTable;
use crate::transport::{Transport, TransportError};

/// Autorepeat configuration applied to every source once at startup.
const REPEAT_DELAY_MS: u32 = 400;
const REPEAT_PERIOD_MS: u32 = 200;

// EVIOCSREP: _IOW('E', 0x03, unsigned int[2])
const EVIOCSREP: libc::c_ulong = 0x4008_4503;

#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    #[error("failed to open input device '{path}': {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("failed to grab input device '{path}': {source}")]
    Grab { path: PathBuf, source: io::Error },

    #[error("an input descriptor was closed or failed")]
    SourceLost,

    #[error("the output descriptor was closed or failed")]
    TransportLost,

    #[error("event loop I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

struct Source {
    device: Device,
    decoder: Decoder,
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("decoder", &self.decoder)
            .finish_non_exhaustive()
    }
}

/// Owns the raw sources and the output sink for the lifetime of the run.
#[derive(Debug)]
pub struct Multiplexer {
    sources: Vec<Source>,
    transport: Transport,
}

impl Multiplexer {
    /// Open and exclusively grab every source, discard whatever was
    /// buffered before the grab took effect, and set the autorepeat rate.
    /// All of this happens before the first wait; nothing else on the host
    /// sees these devices afterwards.
    pub fn open(
        paths: &[PathBuf],
        table: Arc<KeyTable>,
        transport: Transport,
    ) -> Result<Self, MuxError> {
        let mut sources = Vec::with_capacity(paths.len());
        for path in paths {
            sources.push(Self::open_source(path, table.clone())?);
        }
        Ok(Self { sources, transport })
    }

    fn open_source(path: &Path, table: Arc<KeyTable>) -> Result<Source, MuxError> {
        let mut device = Device::open(path).map_err(|source| MuxError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        set_nonblocking(device.as_raw_fd())?;

        // Clear a grab left behind by a crashed predecessor, then take
        // exclusive access ourselves.
        let _ = device.ungrab();
        device.grab().map_err(|source| MuxError::Grab {
            path: path.to_path_buf(),
            source,
        })?;

        let drained = drain_backlog(&mut device)?;
        if drained > 0 {
            log::debug!("discarded {drained} stale event(s) from {}", path.display());
        }

        if let Err(err) = set_autorepeat(device.as_raw_fd(), REPEAT_DELAY_MS, REPEAT_PERIOD_MS) {
            log::debug!("cannot set repeat rate on {}: {err}", path.display());
        }

        log::info!("grabbed {}", path.display());
        Ok(Source {
            device,
            decoder: Decoder::new(table),
        })
    }

    /// Block on readiness over all sources plus the output descriptor and
    /// route events until the stop flag is raised or a fatal condition
    /// occurs. Hot-path failures are not retried: a half-sent translated
    /// event cannot be resumed.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<(), MuxError> {
        let Self { sources, transport } = self;

        while !stop.load(Ordering::SeqCst) {
            let mut fds: Vec<libc::pollfd> = sources
                .iter()
                .map(|source| libc::pollfd {
                    fd: source.device.as_raw_fd(),
                    events: libc::POLLIN,
                    revents: 0,
                })
                .collect();
            if let Some(fd) = transport.poll_fd() {
                fds.push(libc::pollfd {
                    fd,
                    events: 0,
                    revents: 0,
                });
            }

            let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
            if rc < 0 {
                let err = io::Error::last_os_error();
                if err.raw_os_error() == Some(libc::EINTR) {
                    continue;
                }
                return Err(MuxError::Io(err));
            }

            let fatal = libc::POLLHUP | libc::POLLERR | libc::POLLNVAL;
            for (slot, pollfd) in fds.iter().enumerate() {
                if pollfd.revents & fatal != 0 {
                    return Err(if slot < sources.len() {
                        MuxError::SourceLost
                    } else {
                        MuxError::TransportLost
                    });
                }
            }

            for (slot, source) in sources.iter_mut().enumerate() {
                if fds[slot].revents & libc::POLLIN == 0 {
                    continue;
                }
                let Source { device, decoder } = source;
                let events = match device.fetch_events() {
                    Ok(events) => events,
                    Err(err) if err.kind() == io::ErrorKind::WouldBlock => continue,
                    Err(err) => return Err(MuxError::Io(err)),
                };
                for ev in events {
                    let batch = decoder.decode(ev);
                    if !batch.is_empty() {
                        transport.emit(&batch)?;
                    }
                }
            }
        }

        Ok(())
    }
}

impl Drop for Multiplexer {
    /// Sources must not stay grabbed past the process: a leaked grab leaves
    /// the remote dead to the rest of the host until it is replugged.
    fn drop(&mut self) {
        for source in &mut self.sources {
            let _ = source.device.ungrab();
        }
    }
}

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Read the source dry. Events buffered before the exclusive grab took
/// effect are stale input typed at whatever owned the device before us.
fn drain_backlog(device: &mut Device) -> io::Result<usize> {
    let mut drained = 0;
    loop {
        match device.fetch_events() {
            Ok(events) => {
                let count = events.count();
                if count == 0 {
                    break;
                }
                drained += count;
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
            Err(err) => return Err(err),
        }
    }
    Ok(drained)
}

fn set_autorepeat(fd: RawFd, delay_ms: u32, period_ms: u32) -> io::Result<()> {
    let rep: [libc::c_uint; 2] = [delay_ms, period_ms];
    let rc = unsafe { libc::ioctl(fd, EVIOCSREP, rep.as_ptr()) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // A transport over a scratch file; opening real devices in tests is
    // environment-dependent, opening a temp file is not.
    fn file_transport() -> Transport {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let sink = crate::transport::DeviceFileSink::open(tmp.path()).unwrap();
        Transport::File(sink)
    }

    #[test]
    fn test_open_reports_the_failing_path() {
        let table = Arc::new(KeyTable::with_defaults());
        let paths = [PathBuf::from("/dev/input/event-none")];
        let err = Multiplexer::open(&paths, table, file_transport()).unwrap_err();
        match err {
            MuxError::Open { path, .. } => {
                assert_eq!(path, PathBuf::from("/dev/input/event-none"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
