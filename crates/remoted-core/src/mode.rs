// Modifier chord tracking
// One Mode value per raw source, driven only by modifier key transitions

use bitflags::bitflags;
use evdev::Key;

bitflags! {
    /// Modifier chord state of a single raw source.
    ///
    /// The bit layout is wire-visible: it appears verbatim in unresolved-key
    /// diagnostics and in the masks of compiled table entries.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Mode: u32 {
        const META    = 1 << 0;
        const CTRL    = 1 << 1;
        const SHIFT   = 1 << 2;
        const ALT     = 1 << 3;
        const NUMLOCK = 1 << 4;
        /// Set on lookups committed from Alt-numeric code entry. Never driven
        /// by a physical key.
        const NUMALT  = 1 << 5;
    }
}

/// Map a raw key to the modifier bit it drives, if any.
///
/// Left and right variants fold onto the same bit; the decoder does not
/// distinguish which side of the chord was held.
pub fn modifier_bit(key: Key) -> Option<Mode> {
    if key == Key::KEY_LEFTMETA || key == Key::KEY_RIGHTMETA {
        Some(Mode::META)
    } else if key == Key::KEY_LEFTCTRL || key == Key::KEY_RIGHTCTRL {
        Some(Mode::CTRL)
    } else if key == Key::KEY_LEFTALT || key == Key::KEY_RIGHTALT {
        Some(Mode::ALT)
    } else if key == Key::KEY_LEFTSHIFT || key == Key::KEY_RIGHTSHIFT {
        Some(Mode::SHIFT)
    } else if key == Key::KEY_NUMLOCK {
        Some(Mode::NUMLOCK)
    } else {
        None
    }
}

/// Numeric keypad digits accepted during Alt-numeric code entry.
pub fn keypad_digit(key: Key) -> Option<u32> {
    const DIGITS: [Key; 10] = [
        Key::KEY_KP0,
        Key::KEY_KP1,
        Key::KEY_KP2,
        Key::KEY_KP3,
        Key::KEY_KP4,
        Key::KEY_KP5,
        Key::KEY_KP6,
        Key::KEY_KP7,
        Key::KEY_KP8,
        Key::KEY_KP9,
    ];
    DIGITS
        .iter()
        .position(|digit| *digit == key)
        .map(|digit| digit as u32)
}
