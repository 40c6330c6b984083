// Output transports
// One sink per process lifetime, selected at startup

pub mod dev;
pub mod lirc;
pub mod uinput;

pub use dev::DeviceFileSink;
pub use lirc::LircSink;
pub use uinput::UinputSink;

use std::io;
use std::os::unix::io::RawFd;
use std::path::PathBuf;

use evdev::InputEvent;

/// Errors raised while setting up or writing to an output sink.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to create virtual device: {0}")]
    Create(#[source] io::Error),

    #[error("failed to open output device '{path}': {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("failed to set up client socket: {0}")]
    Socket(#[source] io::Error),

    #[error("no listening socket was passed by the service supervisor")]
    NoActivationSocket,

    #[error("failed to write to output: {0}")]
    Write(#[source] io::Error),
}

/// The selected output sink. Emission order is the decoder's order; no
/// sink reorders or regroups a batch.
#[derive(Debug)]
pub enum Transport {
    Uinput(UinputSink),
    File(DeviceFileSink),
    Lirc(LircSink),
}

impl Transport {
    pub fn emit(&mut self, batch: &[InputEvent]) -> Result<(), TransportError> {
        match self {
            Transport::Uinput(sink) => sink.emit(batch),
            Transport::File(sink) => sink.emit(batch),
            Transport::Lirc(sink) => sink.emit(batch),
        }
    }

    /// Output descriptor for the readiness wait, where the sink exposes
    /// one. The wait only watches it for error conditions.
    pub fn poll_fd(&self) -> Option<RawFd> {
        match self {
            Transport::Uinput(_) => None,
            Transport::File(sink) => Some(sink.poll_fd()),
            Transport::Lirc(sink) => Some(sink.poll_fd()),
        }
    }
}
