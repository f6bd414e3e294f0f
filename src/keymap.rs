//! The keycode table: what each key does under the active layout and modifiers.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::KeyloggerError;
use crate::key_code::KeyCode;
use crate::modifiers::ModifierState;

/// The effect of a key, resolved against the current modifier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// The key produces a character.
    Char(char),
    /// Finalize the current line.
    Submit,
    /// Delete the character before the cursor.
    DeleteBack,
    /// Delete the character under the cursor.
    DeleteForward,
    MoveLeft,
    MoveRight,
    ToggleCapsLock,
    ToggleShift,
    ToggleAltGr,
    /// The key has no entry in the table.
    Unknown,
}

/// A table entry. Character keys carry their variants; every other key maps to a fixed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyKind {
    Char {
        base: char,
        shift: Option<char>,
        alt_gr: Option<char>,
    },
    Fixed(Action),
}

const fn chr(base: char, shift: char) -> KeyKind {
    KeyKind::Char {
        base,
        shift: Some(shift),
        alt_gr: None,
    }
}

const fn chr_alt(base: char, shift: char, alt_gr: char) -> KeyKind {
    KeyKind::Char {
        base,
        shift: Some(shift),
        alt_gr: Some(alt_gr),
    }
}

/// Keys whose meaning does not depend on the layout.
const CONTROL_KEYS: &[(KeyCode, KeyKind)] = &[
    (KeyCode::KEY_ENTER, KeyKind::Fixed(Action::Submit)),
    (KeyCode::KEY_KPENTER, KeyKind::Fixed(Action::Submit)),
    (KeyCode::KEY_BACKSPACE, KeyKind::Fixed(Action::DeleteBack)),
    (KeyCode::KEY_DELETE, KeyKind::Fixed(Action::DeleteForward)),
    (KeyCode::KEY_LEFT, KeyKind::Fixed(Action::MoveLeft)),
    (KeyCode::KEY_RIGHT, KeyKind::Fixed(Action::MoveRight)),
    (KeyCode::KEY_CAPSLOCK, KeyKind::Fixed(Action::ToggleCapsLock)),
    (KeyCode::KEY_LEFTSHIFT, KeyKind::Fixed(Action::ToggleShift)),
    (KeyCode::KEY_RIGHTSHIFT, KeyKind::Fixed(Action::ToggleShift)),
    (KeyCode::KEY_RIGHTALT, KeyKind::Fixed(Action::ToggleAltGr)),
    (KeyCode::KEY_SPACE, chr(' ', ' ')),
];

/// Letters sit on the same keys in every supported layout.
const LETTER_KEYS: &[(KeyCode, KeyKind)] = &[
    (KeyCode::KEY_A, chr('a', 'A')),
    (KeyCode::KEY_B, chr('b', 'B')),
    (KeyCode::KEY_C, chr('c', 'C')),
    (KeyCode::KEY_D, chr('d', 'D')),
    (KeyCode::KEY_F, chr('f', 'F')),
    (KeyCode::KEY_G, chr('g', 'G')),
    (KeyCode::KEY_H, chr('h', 'H')),
    (KeyCode::KEY_I, chr('i', 'I')),
    (KeyCode::KEY_J, chr('j', 'J')),
    (KeyCode::KEY_K, chr('k', 'K')),
    (KeyCode::KEY_L, chr('l', 'L')),
    (KeyCode::KEY_M, chr('m', 'M')),
    (KeyCode::KEY_N, chr('n', 'N')),
    (KeyCode::KEY_O, chr('o', 'O')),
    (KeyCode::KEY_P, chr('p', 'P')),
    (KeyCode::KEY_R, chr('r', 'R')),
    (KeyCode::KEY_S, chr('s', 'S')),
    (KeyCode::KEY_T, chr('t', 'T')),
    (KeyCode::KEY_U, chr('u', 'U')),
    (KeyCode::KEY_V, chr('v', 'V')),
    (KeyCode::KEY_X, chr('x', 'X')),
    (KeyCode::KEY_Y, chr('y', 'Y')),
    (KeyCode::KEY_Z, chr('z', 'Z')),
];

const US_KEYS: &[(KeyCode, KeyKind)] = &[
    (KeyCode::KEY_1, chr('1', '!')),
    (KeyCode::KEY_2, chr('2', '@')),
    (KeyCode::KEY_3, chr('3', '#')),
    (KeyCode::KEY_4, chr('4', '$')),
    (KeyCode::KEY_5, chr('5', '%')),
    (KeyCode::KEY_6, chr('6', '^')),
    (KeyCode::KEY_7, chr('7', '&')),
    (KeyCode::KEY_8, chr('8', '*')),
    (KeyCode::KEY_9, chr('9', '(')),
    (KeyCode::KEY_0, chr('0', ')')),
    (KeyCode::KEY_MINUS, chr('-', '_')),
    (KeyCode::KEY_EQUAL, chr('=', '+')),
    (KeyCode::KEY_LEFTBRACE, chr('[', '{')),
    (KeyCode::KEY_RIGHTBRACE, chr(']', '}')),
    (KeyCode::KEY_SEMICOLON, chr(';', ':')),
    (KeyCode::KEY_APOSTROPHE, chr('\'', '"')),
    (KeyCode::KEY_GRAVE, chr('`', '~')),
    (KeyCode::KEY_BACKSLASH, chr('\\', '|')),
    (KeyCode::KEY_COMMA, chr(',', '<')),
    (KeyCode::KEY_DOT, chr('.', '>')),
    (KeyCode::KEY_SLASH, chr('/', '?')),
    (KeyCode::KEY_E, chr('e', 'E')),
    (KeyCode::KEY_Q, chr('q', 'Q')),
    (KeyCode::KEY_W, chr('w', 'W')),
];

// Dead keys (acute, tilde, diaeresis) are logged as their spacing form.
const ABNT2_KEYS: &[(KeyCode, KeyKind)] = &[
    (KeyCode::KEY_1, chr_alt('1', '!', '¹')),
    (KeyCode::KEY_2, chr_alt('2', '@', '²')),
    (KeyCode::KEY_3, chr_alt('3', '#', '³')),
    (KeyCode::KEY_4, chr_alt('4', '$', '£')),
    (KeyCode::KEY_5, chr_alt('5', '%', '¢')),
    (KeyCode::KEY_6, chr_alt('6', '¨', '¬')),
    (KeyCode::KEY_7, chr('7', '&')),
    (KeyCode::KEY_8, chr('8', '*')),
    (KeyCode::KEY_9, chr('9', '(')),
    (KeyCode::KEY_0, chr('0', ')')),
    (KeyCode::KEY_MINUS, chr('-', '_')),
    (KeyCode::KEY_EQUAL, chr_alt('=', '+', '§')),
    (KeyCode::KEY_LEFTBRACE, chr('´', '`')),
    (KeyCode::KEY_RIGHTBRACE, chr_alt('[', '{', 'ª')),
    (KeyCode::KEY_SEMICOLON, chr('ç', 'Ç')),
    (KeyCode::KEY_APOSTROPHE, chr('~', '^')),
    (KeyCode::KEY_GRAVE, chr('\'', '"')),
    (KeyCode::KEY_BACKSLASH, chr_alt(']', '}', 'º')),
    (KeyCode::KEY_102ND, chr('\\', '|')),
    (KeyCode::KEY_COMMA, chr(',', '<')),
    (KeyCode::KEY_DOT, chr('.', '>')),
    (KeyCode::KEY_SLASH, chr(';', ':')),
    (KeyCode::KEY_RO, chr_alt('/', '?', '°')),
    (KeyCode::KEY_E, chr_alt('e', 'E', '°')),
    (KeyCode::KEY_Q, chr_alt('q', 'Q', '/')),
    (KeyCode::KEY_W, chr_alt('w', 'W', '?')),
];

/// A supported keyboard layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Layout {
    /// US QWERTY.
    #[default]
    Us,
    /// Brazilian ABNT2.
    Abnt2,
}

impl Layout {
    fn keys(self) -> &'static [(KeyCode, KeyKind)] {
        match self {
            Layout::Us => US_KEYS,
            Layout::Abnt2 => ABNT2_KEYS,
        }
    }
}

impl FromStr for Layout {
    type Err = KeyloggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "us" => Ok(Layout::Us),
            "abnt2" | "br" => Ok(Layout::Abnt2),
            other => Err(KeyloggerError::InvalidConfig(format!(
                "unknown layout: {other}"
            ))),
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::Us => f.write_str("us"),
            Layout::Abnt2 => f.write_str("abnt2"),
        }
    }
}

/// Maps key codes to [`Action`]s for one [`Layout`].
#[derive(Debug, Clone)]
pub struct Keymap {
    layout: Layout,
    keys: HashMap<KeyCode, KeyKind>,
}

impl Keymap {
    pub fn new(layout: Layout) -> Self {
        let keys = CONTROL_KEYS
            .iter()
            .chain(LETTER_KEYS)
            .chain(layout.keys())
            .copied()
            .collect();

        Self { layout, keys }
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Resolve `code` under the modifier state `mods`.
    ///
    /// Character keys pick their alt-gr variant when alt-gr is held and the key has one, then
    /// their shift variant when shift is held, and their base character otherwise. With caps
    /// lock engaged, a lowercase letter is then upper-cased; digits and punctuation are left
    /// alone. Codes missing from the table resolve to [`Action::Unknown`].
    pub fn resolve(&self, code: KeyCode, mods: &ModifierState) -> Action {
        let (base, shift, alt_gr) = match self.keys.get(&code) {
            None => return Action::Unknown,
            Some(KeyKind::Fixed(action)) => return *action,
            Some(KeyKind::Char {
                base,
                shift,
                alt_gr,
            }) => (*base, *shift, *alt_gr),
        };

        let chr = match (mods.alt_gr, alt_gr) {
            (true, Some(c)) => c,
            _ if mods.shift => shift.unwrap_or(base),
            _ => base,
        };

        Action::Char(if mods.caps_lock { upper_case(chr) } else { chr })
    }
}

impl Default for Keymap {
    fn default() -> Self {
        Self::new(Layout::default())
    }
}

fn upper_case(c: char) -> char {
    if !c.is_alphabetic() || !c.is_lowercase() {
        return c;
    }

    let mut upper = c.to_uppercase();

    match (upper.next(), upper.next()) {
        (Some(u), None) => u,
        // Letters without a single-character capital (e.g. 'ß') are kept as typed.
        _ => c,
    }
}
