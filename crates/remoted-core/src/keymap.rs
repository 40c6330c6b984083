// Keymap overrides
// Text keymap parsing, the binary patch-record protocol, and table patching

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use crate::names;
use crate::table::KeyTable;

/// One table override: replace the semantic code of entry `scancode` with
/// `keyid`.
///
/// On the wire a record is two little-endian u32s back to back, streamed
/// with no header or footer and terminated by end-of-stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeymapRecord {
    pub scancode: u32,
    pub keyid: u32,
}

impl KeymapRecord {
    pub const ENCODED_LEN: usize = 8;

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.scancode.to_le_bytes())?;
        writer.write_all(&self.keyid.to_le_bytes())
    }

    /// Read the next record. `Ok(None)` on a clean end of stream; a stream
    /// ending inside a record is a protocol violation between trusted
    /// components, not a user error.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Option<Self>, KeymapError> {
        let mut buf = [0u8; Self::ENCODED_LEN];
        let mut filled = 0;
        while filled < buf.len() {
            let n = reader.read(&mut buf[filled..])?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(KeymapError::TruncatedRecord { got: filled });
            }
            filled += n;
        }
        Ok(Some(Self {
            scancode: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            keyid: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        }))
    }
}

/// Drain a record stream to end-of-stream.
pub fn read_records<R: Read>(mut reader: R) -> Result<Vec<KeymapRecord>, KeymapError> {
    let mut records = Vec::new();
    while let Some(record) = KeymapRecord::read_from(&mut reader)? {
        records.push(record);
    }
    Ok(records)
}

#[derive(Debug, thiserror::Error)]
pub enum KeymapError {
    #[error("failed to open keymap '{path}': {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("failed to read keymap: {0}")]
    Io(#[from] io::Error),

    #[error("truncated patch record: got {got} of 8 bytes")]
    TruncatedRecord { got: usize },
}

/// Parse a text keymap into override records.
///
/// Lines are `<scancode> $<keyid>` or `<scancode> <symbolic-name>`;
/// `#` starts a trailing comment and blank lines are skipped. A malformed
/// line is the keymap author's problem: it is logged against `origin` and
/// skipped, and parsing continues.
pub fn parse<R: BufRead>(reader: R, origin: &str) -> io::Result<Vec<KeymapRecord>> {
    let mut records = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let lineno = index + 1;

        let text = line.split('#').next().unwrap_or("").trim();
        if text.is_empty() {
            continue;
        }

        let Some((scan_text, key_text)) = text.split_once(char::is_whitespace) else {
            log::warn!("{origin}:{lineno}: missing key id");
            continue;
        };

        let Some(scancode) = parse_scalar(scan_text) else {
            log::warn!("{origin}:{lineno}: invalid scancode '{scan_text}'");
            continue;
        };

        let key_text = key_text.trim();
        let keyid = if let Some(number) = key_text.strip_prefix('$') {
            match parse_scalar(number) {
                Some(value) => value,
                None => {
                    log::warn!("{origin}:{lineno}: invalid key id '{key_text}'");
                    continue;
                }
            }
        } else {
            match names::key_from_name(key_text) {
                Some(code) => u32::from(code),
                None => {
                    log::warn!("{origin}:{lineno}: unknown key name '{key_text}'");
                    continue;
                }
            }
        };

        records.push(KeymapRecord { scancode, keyid });
    }

    Ok(records)
}

/// Apply override records to the table. Out-of-range records are rejected
/// and logged; valid ones patch the addressed entry in place.
pub fn apply(table: &mut KeyTable, records: &[KeymapRecord]) -> usize {
    let mut applied = 0;
    for record in records {
        if record.scancode as usize >= table.len() {
            log::warn!(
                "scancode {} out of range (table has {} entries)",
                record.scancode,
                table.len()
            );
            continue;
        }
        if record.keyid >= u32::from(names::MAX_KEY_CODE) {
            log::warn!("unsupported key id {}", record.keyid);
            continue;
        }
        log::debug!("mapping scancode {} to {:#06x}", record.scancode, record.keyid);
        table.patch(record.scancode as usize, record.keyid as u16);
        applied += 1;
    }
    applied
}

/// Parse a text keymap file and patch the table with every valid line.
pub fn load_file(path: &Path, table: &mut KeyTable) -> Result<usize, KeymapError> {
    let file = File::open(path).map_err(|source| KeymapError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let records = parse(BufReader::new(file), &path.display().to_string())?;
    Ok(apply(table, &records))
}

/// Accepts decimal, hex (`0x`), and octal (leading `0`) notation, like the
/// keymap files this format grew up with.
fn parse_scalar(text: &str) -> Option<u32> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else if text.len() > 1 && text.starts_with('0') {
        u32::from_str_radix(&text[1..], 8).ok()
    } else {
        text.parse().ok()
    }
}
