// Lookup table
// Ordered (modifier mask, raw key) -> semantic code definitions

use evdev::Key;

use crate::mode::Mode;

/// One translation entry. The position of a definition inside the table is
/// its identity: the index is emitted on the wire as a synthetic scan code
/// and is the scancode namespace keymap files patch against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyDefinition {
    pub mask: Mode,
    pub key: u32,
    pub code: u16,
    pub name: &'static str,
}

macro_rules! def {
    ($mask:expr, $key:expr, $code:ident) => {
        KeyDefinition {
            mask: $mask,
            key: $key,
            code: Key::$code.0,
            name: stringify!($code),
        }
    };
    ($mask:expr, $key:expr, $code:expr, $name:expr) => {
        KeyDefinition {
            mask: $mask,
            key: $key,
            code: $code,
            name: $name,
        }
    };
}

const fn k(key: Key) -> u32 {
    key.0 as u32
}

const NONE: Mode = Mode::empty();
const CTRL: Mode = Mode::CTRL;
const CTRL_SHIFT: Mode = Mode::CTRL.union(Mode::SHIFT);
const META_ALT: Mode = Mode::META.union(Mode::ALT);
const ALT: Mode = Mode::ALT;
const NUMALT: Mode = Mode::NUMALT;

/// Compiled defaults for the composite remote. Chorded entries carry the
/// raw scancode the remote's keyboard half produces for that button; the
/// NUMALT entry matches an Alt-numeric committed value, not a physical key.
static DEFAULT_DEFS: &[KeyDefinition] = &[
    def!(NONE, k(Key::KEY_HOMEPAGE), KEY_HOMEPAGE),
    def!(NONE, k(Key::KEY_SLEEP), KEY_SLEEP),
    def!(CTRL_SHIFT, 20, KEY_YELLOW),
    def!(CTRL, 50, KEY_BLUE),
    def!(CTRL, 23, KEY_GREEN),
    def!(CTRL, 18, KEY_RED),
    def!(CTRL, 24, KEY_HOMEPAGE),
    def!(CTRL, 34, KEY_PROGRAM),
    def!(CTRL, 20, 0x177, "KEY_SCREEN"),
    def!(CTRL_SHIFT, 50, KEY_DVD),
    def!(CTRL_SHIFT, 48, KEY_REWIND),
    def!(CTRL_SHIFT, 33, KEY_FASTFORWARD),
    def!(NONE, k(Key::KEY_PREVIOUSSONG), KEY_PREVIOUSSONG),
    def!(NONE, k(Key::KEY_NEXTSONG), KEY_NEXTSONG),
    def!(NONE, k(Key::KEY_PLAYPAUSE), KEY_PLAYPAUSE),
    def!(NONE, k(Key::KEY_STOPCD), KEY_STOPCD),
    def!(CTRL, 19, KEY_RECORD),
    def!(NONE, k(Key::KEY_BACKSPACE), KEY_BACKSPACE),
    def!(NONE, k(Key::BTN_RIGHT), KEY_INFO),
    def!(NONE, k(Key::KEY_LEFT), KEY_LEFT),
    def!(NONE, k(Key::KEY_RIGHT), KEY_RIGHT),
    def!(NONE, k(Key::KEY_UP), KEY_UP),
    def!(NONE, k(Key::KEY_DOWN), KEY_DOWN),
    def!(NONE, k(Key::KEY_ENTER), KEY_ENTER),
    def!(NONE, k(Key::BTN_LEFT), BTN_LEFT),
    def!(NONE, k(Key::KEY_VOLUMEUP), KEY_VOLUMEUP),
    def!(NONE, k(Key::KEY_VOLUMEDOWN), KEY_VOLUMEDOWN),
    def!(NONE, k(Key::KEY_MUTE), KEY_MUTE),
    def!(NONE, k(Key::KEY_PAGEUP), KEY_CHANNELUP),
    def!(NONE, k(Key::KEY_PAGEDOWN), KEY_CHANNELDOWN),
    def!(META_ALT, 28, BTN_START),
    def!(NONE, k(Key::KEY_KP1), KEY_KP1),
    def!(NONE, k(Key::KEY_KP2), KEY_KP2),
    def!(NONE, k(Key::KEY_KP3), KEY_KP3),
    def!(NONE, k(Key::KEY_KP4), KEY_KP4),
    def!(NONE, k(Key::KEY_KP5), KEY_KP5),
    def!(NONE, k(Key::KEY_KP6), KEY_KP6),
    def!(NONE, k(Key::KEY_KP7), KEY_KP7),
    def!(NONE, k(Key::KEY_KP8), KEY_KP8),
    def!(NONE, k(Key::KEY_KP9), KEY_KP9),
    def!(NONE, k(Key::KEY_KP0), KEY_KP0),
    def!(NONE, k(Key::KEY_KPASTERISK), KEY_KPASTERISK),
    // Alt-numeric "35" on the keypad
    def!(NUMALT, 35, KEY_KPPLUSMINUS),
    def!(ALT, 62, KEY_CLOSE),
    def!(NONE, k(Key::KEY_ESC), KEY_ESC),
];

/// The translation table. Built once from the compiled defaults, optionally
/// patched by keymap records before the event loop starts, immutable
/// afterwards.
#[derive(Debug, Clone)]
pub struct KeyTable {
    defs: Vec<KeyDefinition>,
}

impl KeyTable {
    pub fn with_defaults() -> Self {
        Self {
            defs: DEFAULT_DEFS.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Resolve a (modifier mask, raw key) pair to its table index and
    /// semantic code. Linear scan, first match wins: a duplicate definition
    /// silently shadows every later one.
    pub fn resolve(&self, mask: Mode, key: u32) -> Option<(usize, u16)> {
        self.defs
            .iter()
            .enumerate()
            .find(|(_, def)| def.mask == mask && def.key == key)
            .map(|(index, def)| (index, def.code))
    }

    /// Display name of the first entry currently emitting `code`.
    ///
    /// Patching replaces an entry's code but not its name, so a patched
    /// entry keeps reporting the name of the button it was compiled for.
    pub fn reverse_resolve(&self, code: u16) -> Option<&'static str> {
        self.defs
            .iter()
            .find(|def| def.code == code)
            .map(|def| def.name)
    }

    /// Replace the semantic code of one entry in place. The caller
    /// guarantees `index < self.len()`.
    pub fn patch(&mut self, index: usize, code: u16) {
        self.defs[index].code = code;
    }

    /// Every semantic code the table can currently emit, for transports
    /// that declare their capabilities up front.
    pub fn codes(&self) -> impl Iterator<Item = u16> + '_ {
        self.defs.iter().map(|def| def.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_definitions_are_unique() {
        let table = KeyTable::with_defaults();
        for (i, a) in table.defs.iter().enumerate() {
            for b in &table.defs[i + 1..] {
                assert!(
                    !(a.mask == b.mask && a.key == b.key),
                    "duplicate definition for mask {:?} key {}",
                    a.mask,
                    a.key
                );
            }
        }
    }

    #[test]
    fn test_resolve_plain_key() {
        let table = KeyTable::with_defaults();
        let (index, code) = table
            .resolve(Mode::empty(), Key::KEY_ENTER.0 as u32)
            .expect("ENTER is compiled in");
        assert_eq!(code, Key::KEY_ENTER.0);
        assert_eq!(table.defs[index].name, "KEY_ENTER");
    }

    #[test]
    fn test_resolve_respects_the_mask() {
        let table = KeyTable::with_defaults();
        // Raw key 20 resolves differently under Ctrl and Ctrl+Shift.
        let (_, yellow) = table.resolve(Mode::CTRL | Mode::SHIFT, 20).unwrap();
        let (_, screen) = table.resolve(Mode::CTRL, 20).unwrap();
        assert_eq!(yellow, Key::KEY_YELLOW.0);
        assert_eq!(screen, 0x177);
        assert_eq!(table.resolve(Mode::empty(), 20), None);
    }

    #[test]
    fn test_numalt_entry_matches_accumulated_value() {
        let table = KeyTable::with_defaults();
        let (_, code) = table.resolve(Mode::NUMALT, 35).unwrap();
        assert_eq!(code, Key::KEY_KPPLUSMINUS.0);
        // The same value without the entry flag is not a binding.
        assert_eq!(table.resolve(Mode::empty(), 35), None);
    }

    #[test]
    fn test_reverse_resolve_first_match() {
        let table = KeyTable::with_defaults();
        assert_eq!(
            table.reverse_resolve(Key::KEY_HOMEPAGE.0),
            Some("KEY_HOMEPAGE")
        );
        assert_eq!(table.reverse_resolve(0x2fe), None);
    }

    #[test]
    fn test_patch_replaces_code_and_keeps_name() {
        let mut table = KeyTable::with_defaults();
        table.patch(5, 30);
        assert_eq!(table.defs[5].code, 30);
        assert_eq!(table.defs[5].name, "KEY_RED");
        let (index, code) = table.resolve(Mode::CTRL, 18).unwrap();
        assert_eq!(index, 5);
        assert_eq!(code, 30);
    }
}
