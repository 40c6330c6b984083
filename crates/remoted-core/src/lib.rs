// Remoted Core Library
// Event decoding and output transports for remote-control translation

pub mod decoder;
pub mod exit;
pub mod keymap;
pub mod mode;
pub mod mux;
pub mod names;
pub mod table;
pub mod transport;

pub use decoder::{Decoder, EventBatch};
pub use keymap::{KeymapError, KeymapRecord};
pub use mode::Mode;
pub use mux::{Multiplexer, MuxError};
pub use table::{KeyDefinition, KeyTable};
pub use transport::{DeviceFileSink, LircSink, Transport, TransportError, UinputSink};
