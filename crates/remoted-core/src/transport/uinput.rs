// Virtual-device sink
// Creates a uinput device declaring everything the table can emit

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, InputEvent, Key, RelativeAxisType};

use super::TransportError;
use crate::table::KeyTable;

const DEVICE_NAME: &str = "remoted (virtual) remote";

/// Host-level virtual input device.
pub struct UinputSink {
    device: VirtualDevice,
}

impl std::fmt::Debug for UinputSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UinputSink").finish_non_exhaustive()
    }
}

impl UinputSink {
    /// Create the virtual device. Capabilities are declared once, here:
    /// every semantic code the table can emit, plus the relative axes the
    /// mouse half of the remote produces.
    pub fn create(table: &KeyTable) -> Result<Self, TransportError> {
        let mut keys = AttributeSet::<Key>::new();
        for code in table.codes() {
            keys.insert(Key::new(code));
        }

        let mut axes = AttributeSet::<RelativeAxisType>::new();
        axes.insert(RelativeAxisType::REL_X);
        axes.insert(RelativeAxisType::REL_Y);
        axes.insert(RelativeAxisType::REL_WHEEL);

        let device = VirtualDeviceBuilder::new()
            .map_err(TransportError::Create)?
            .name(DEVICE_NAME)
            .with_keys(&keys)
            .map_err(TransportError::Create)?
            .with_relative_axes(&axes)
            .map_err(TransportError::Create)?
            .build()
            .map_err(TransportError::Create)?;

        log::info!("created virtual device '{DEVICE_NAME}'");
        Ok(Self { device })
    }

    /// Write one decoder batch, in order.
    pub fn emit(&mut self, batch: &[InputEvent]) -> Result<(), TransportError> {
        self.device.emit(batch).map_err(TransportError::Write)
    }
}
