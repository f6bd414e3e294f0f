use crate::error::KeyloggerError;
use crate::key_code::KeyCode;
use crate::KeyloggerResult;
use crate::modifiers::ModifierState;

/// The default maximum number of keys a line may hold.
pub const DEFAULT_LINE_LIMIT: usize = 4096;

/// A character-producing key stored in a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypedKey {
    /// The key that was pressed.
    pub code: KeyCode,
    /// The character the key resolved to.
    pub chr: char,
    /// The modifiers active when the key was pressed.
    pub modifiers: ModifierState,
}

impl TypedKey {
    /// The key packed as a `flags << 8 | code` word, the unit of the binary log format.
    pub fn word(&self) -> u16 {
        (u16::from(self.modifiers.to_flags()) << 8) | (self.code.0 & 0xff)
    }
}

/// The line currently being typed, with an editing cursor.
///
/// The cursor is always in `0..=len()`.
#[derive(Debug, Clone)]
pub struct LineBuffer {
    keys: Vec<TypedKey>,
    cursor: usize,
    limit: usize,
}

impl LineBuffer {
    /// Create an empty buffer that holds at most `limit` keys.
    pub fn new(limit: usize) -> Self {
        Self {
            keys: Vec::new(),
            cursor: 0,
            limit,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn keys(&self) -> &[TypedKey] {
        &self.keys
    }

    /// The characters of the line.
    pub fn text(&self) -> String {
        self.keys.iter().map(|k| k.chr).collect()
    }

    /// Insert `key` at the cursor and move the cursor past it.
    ///
    /// Fails with [`KeyloggerError::BufferOverflow`] if the buffer is full, in which case the
    /// buffer is left unchanged.
    pub fn insert(&mut self, key: TypedKey) -> KeyloggerResult<()> {
        if self.keys.len() >= self.limit {
            return Err(KeyloggerError::BufferOverflow { limit: self.limit });
        }

        self.keys.insert(self.cursor, key);
        self.cursor += 1;

        Ok(())
    }

    /// Remove the key before the cursor (backspace).
    pub fn delete_back(&mut self) -> Option<TypedKey> {
        if self.cursor == 0 {
            return None;
        }

        self.cursor -= 1;
        Some(self.keys.remove(self.cursor))
    }

    /// Remove the key under the cursor (delete).
    pub fn delete_forward(&mut self) -> Option<TypedKey> {
        if self.cursor == self.keys.len() {
            return None;
        }

        Some(self.keys.remove(self.cursor))
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.keys.len());
    }

    /// Take the contents of the line, leaving it empty with the cursor at 0.
    pub fn take(&mut self) -> Vec<TypedKey> {
        self.cursor = 0;
        std::mem::take(&mut self.keys)
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_LINE_LIMIT)
    }
}
