// Event decoder
// Per-source state machine: modifier chords, Alt-numeric code entry,
// table lookup, and press/release code consistency

use std::sync::Arc;

use evdev::{EventType, InputEvent, Key, MiscType};
use smallvec::SmallVec;

use crate::mode::{keypad_digit, modifier_bit, Mode};
use crate::table::KeyTable;

/// Records produced by one raw event. A committed key press is at most
/// three records (scan echo, key, terminator); everything else is fewer.
pub type EventBatch = SmallVec<[InputEvent; 3]>;

/// Decoder for one raw source.
///
/// The central invariant lives in `code`: it holds the semantic code
/// resolved at the most recent successful press lookup, and every release
/// reuses it verbatim. A key released after the modifier chord changed
/// still releases the code its press resolved to, so the output device
/// never sees a press without a matching release.
#[derive(Debug)]
pub struct Decoder {
    table: Arc<KeyTable>,
    mode: Mode,
    /// Lookup-key scratch. Holds the raw key code of the event being
    /// submitted, or the running value during Alt-numeric digit entry.
    pending: u32,
    /// Alt-numeric code entry in progress.
    accumulating: bool,
    /// A relative-motion record was just passed through; the next frame
    /// terminator is passed through as well.
    raw: bool,
    /// Semantic code cached at the last successful press lookup.
    code: u16,
}

impl Decoder {
    pub fn new(table: Arc<KeyTable>) -> Self {
        Self {
            table,
            mode: Mode::empty(),
            pending: 0,
            accumulating: false,
            raw: false,
            code: 0,
        }
    }

    /// Consume one raw event and produce zero or more outgoing records.
    pub fn decode(&mut self, ev: InputEvent) -> EventBatch {
        let mut out = EventBatch::new();
        let ty = ev.event_type();

        if ty == EventType::KEY {
            self.raw = false;

            if let Some(bit) = modifier_bit(Key::new(ev.code())) {
                self.mode.set(bit, ev.value() != 0);
                // Leaving Alt-only mode mid-entry commits the accumulated
                // value as a press; the lookup below runs with NUMALT set.
                if self.mode != Mode::ALT && self.accumulating {
                    self.submit(1, &mut out);
                }
            } else if self.mode == Mode::ALT && ev.value() == 0 {
                // Key releases carry no meaning while a code is being typed.
            } else if self.mode == Mode::ALT {
                match keypad_digit(Key::new(ev.code())) {
                    Some(digit) => {
                        self.accumulating = true;
                        self.pending = self.pending * 10 + digit;
                    }
                    None => {
                        // A non-digit aborts the entry. The digits typed so
                        // far are discarded, not submitted.
                        self.accumulating = false;
                        self.pending = u32::from(ev.code());
                        self.submit(ev.value(), &mut out);
                    }
                }
            } else if self.accumulating {
                // The committed press from the entry above is still open;
                // this key closes it and is consumed doing so.
                self.accumulating = false;
                self.submit(0, &mut out);
            } else {
                self.pending = u32::from(ev.code());
                self.submit(ev.value(), &mut out);
            }
        } else if ty == EventType::SYNCHRONIZATION {
            if self.raw {
                out.push(ev);
            }
            self.raw = false;
        } else if ty == EventType::RELATIVE {
            out.push(ev);
            self.raw = true;
        } else if ty == EventType::MISC || ty == EventType::REPEAT {
            // The transport synthesizes its own scan echo, and the repeat
            // rate was configured at startup.
        } else {
            log::warn!("unsupported event type {:#04x}", ty.0);
        }

        out
    }

    /// Commit one key transition. Presses and autorepeats resolve against
    /// the table; releases skip the lookup and reuse the cached code.
    fn submit(&mut self, value: i32, out: &mut EventBatch) {
        if value != 0 {
            let mask = if self.accumulating {
                self.mode | Mode::NUMALT
            } else {
                self.mode
            };

            match self.table.resolve(mask, self.pending) {
                Some((index, code)) => {
                    self.code = code;
                    if value == 1 {
                        out.push(InputEvent::new(
                            EventType::MISC,
                            MiscType::MSC_SCAN.0,
                            index as i32,
                        ));
                    }
                    out.push(InputEvent::new(EventType::KEY, code, value));
                    out.push(InputEvent::new(EventType::SYNCHRONIZATION, 0, 0));
                }
                None => {
                    log::warn!(
                        "unresolved key: mode={:?} entry={} key={} value={} numlock={}",
                        self.mode,
                        self.accumulating,
                        self.pending,
                        value,
                        self.mode.contains(Mode::NUMLOCK)
                    );
                }
            }
        } else {
            out.push(InputEvent::new(EventType::KEY, self.code, 0));
            out.push(InputEvent::new(EventType::SYNCHRONIZATION, 0, 0));
        }

        self.pending = 0;
    }
}
