// Device-file sink
// Writes raw input_event records to an already existing device node

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::mem;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;
use std::slice;
use std::time::UNIX_EPOCH;

use evdev::InputEvent;

use super::TransportError;

/// Raw event-record sink over a writable device file.
///
/// This sink never appends a frame terminator of its own: the decoder's
/// terminator record is part of every committed batch, and duplicating it
/// here would double-frame the stream.
#[derive(Debug)]
pub struct DeviceFileSink {
    file: File,
}

impl DeviceFileSink {
    pub fn open(path: &Path) -> Result<Self, TransportError> {
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|source| TransportError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self { file })
    }

    pub fn poll_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }

    pub fn emit(&mut self, batch: &[InputEvent]) -> Result<(), TransportError> {
        for ev in batch {
            let raw = raw_event(ev);
            self.file
                .write_all(event_bytes(&raw))
                .map_err(TransportError::Write)?;
        }
        Ok(())
    }
}

fn raw_event(ev: &InputEvent) -> libc::input_event {
    let elapsed = ev
        .timestamp()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    libc::input_event {
        time: libc::timeval {
            tv_sec: elapsed.as_secs() as libc::time_t,
            tv_usec: libc::suseconds_t::from(elapsed.subsec_micros()),
        },
        type_: ev.event_type().0,
        code: ev.code(),
        value: ev.value(),
    }
}

fn event_bytes(raw: &libc::input_event) -> &[u8] {
    // input_event is plain old data with no padding holes on Linux.
    unsafe {
        slice::from_raw_parts(
            (raw as *const libc::input_event).cast::<u8>(),
            mem::size_of::<libc::input_event>(),
        )
    }
}
