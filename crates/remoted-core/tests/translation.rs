// End-to-end decode scenarios over the compiled table, including keymap
// patching, run without any device access.

use std::io::Cursor;
use std::sync::Arc;

use evdev::{EventType, InputEvent, Key, MiscType};
use remoted_core::keymap::{self, KeymapRecord};
use remoted_core::table::KeyTable;
use remoted_core::Decoder;

fn key(code: u16, value: i32) -> InputEvent {
    InputEvent::new(EventType::KEY, code, value)
}

#[test]
fn test_chorded_button_full_transition() {
    let mut dec = Decoder::new(Arc::new(KeyTable::with_defaults()));

    // The remote's red button arrives as Ctrl+18 from the keyboard half.
    assert!(dec.decode(key(Key::KEY_LEFTCTRL.0, 1)).is_empty());

    let press = dec.decode(key(18, 1));
    assert_eq!(press.len(), 3);
    assert_eq!(press[0].event_type(), EventType::MISC);
    assert_eq!(press[0].code(), MiscType::MSC_SCAN.0);
    assert_eq!(press[1].code(), Key::KEY_RED.0);
    assert_eq!(press[2].event_type(), EventType::SYNCHRONIZATION);

    // The scan echo carries the table index of the resolved entry.
    let echo_index = press[0].value();
    assert_eq!(echo_index, 5);

    let repeat = dec.decode(key(18, 2));
    assert_eq!(repeat.len(), 2);
    assert_eq!(repeat[0].value(), 2);

    let release = dec.decode(key(18, 0));
    assert_eq!(release.len(), 2);
    assert_eq!(release[0].code(), Key::KEY_RED.0);
    assert_eq!(release[0].value(), 0);

    assert!(dec.decode(key(Key::KEY_LEFTCTRL.0, 0)).is_empty());
}

#[test]
fn test_patched_entry_is_used_by_the_decoder() {
    let mut table = KeyTable::with_defaults();

    // Rebind entry 5 (the red button) to KEY_A via the record protocol.
    let mut encoded = Vec::new();
    KeymapRecord {
        scancode: 5,
        keyid: u32::from(Key::KEY_A.0),
    }
    .write_to(&mut encoded)
    .unwrap();
    let records = keymap::read_records(Cursor::new(encoded)).unwrap();
    assert_eq!(keymap::apply(&mut table, &records), 1);

    let mut dec = Decoder::new(Arc::new(table));
    assert!(dec.decode(key(Key::KEY_LEFTCTRL.0, 1)).is_empty());
    let press = dec.decode(key(18, 1));
    assert_eq!(press[1].code(), Key::KEY_A.0);

    // The release pairs with the patched press.
    assert!(dec.decode(key(Key::KEY_LEFTCTRL.0, 0)).is_empty());
    let release = dec.decode(key(18, 0));
    assert_eq!(release[0].code(), Key::KEY_A.0);
}

#[test]
fn test_alt_numeric_entry_commits_against_the_table() {
    let mut dec = Decoder::new(Arc::new(KeyTable::with_defaults()));

    assert!(dec.decode(key(Key::KEY_LEFTALT.0, 1)).is_empty());
    assert!(dec.decode(key(Key::KEY_KP3.0, 1)).is_empty());
    assert!(dec.decode(key(Key::KEY_KP3.0, 0)).is_empty());
    assert!(dec.decode(key(Key::KEY_KP5.0, 1)).is_empty());

    let press = dec.decode(key(Key::KEY_LEFTALT.0, 0));
    assert_eq!(press.len(), 3);
    assert_eq!(press[1].code(), Key::KEY_KPPLUSMINUS.0);

    let release = dec.decode(key(Key::KEY_ENTER.0, 1));
    assert_eq!(release.len(), 2);
    assert_eq!(release[0].code(), Key::KEY_KPPLUSMINUS.0);
    assert_eq!(release[0].value(), 0);
}

#[test]
fn test_mouse_half_passes_straight_through() {
    let mut dec = Decoder::new(Arc::new(KeyTable::with_defaults()));

    let motion = dec.decode(InputEvent::new(EventType::RELATIVE, 1, -7));
    assert_eq!(motion.len(), 1);
    assert_eq!(motion[0].value(), -7);

    let syn = dec.decode(InputEvent::new(EventType::SYNCHRONIZATION, 0, 0));
    assert_eq!(syn.len(), 1);

    // A mouse button is a table lookup like any other key.
    let press = dec.decode(key(Key::BTN_RIGHT.0, 1));
    assert_eq!(press.len(), 3);
    assert_eq!(press[1].code(), Key::KEY_INFO.0);
}

#[test]
fn test_sources_decode_independently() {
    let table = Arc::new(KeyTable::with_defaults());
    let mut kbd = Decoder::new(table.clone());
    let mut mouse = Decoder::new(table);

    // Ctrl held on the keyboard half does not chord the mouse half.
    assert!(kbd.decode(key(Key::KEY_LEFTCTRL.0, 1)).is_empty());
    let press = mouse.decode(key(Key::BTN_RIGHT.0, 1));
    assert_eq!(press[1].code(), Key::KEY_INFO.0);

    let press = kbd.decode(key(18, 1));
    assert_eq!(press[1].code(), Key::KEY_RED.0);
}
