use std::fmt;

/// The code of a physical key, as reported in the `code` field of an `EV_KEY` event.
///
/// The code identifies the key, not the character it produces: that depends on the active
/// layout and modifiers (see [`Keymap`](crate::Keymap)). The associated constants mirror the
/// names used in [input-event-codes.h].
///
/// [input-event-codes.h]: https://elixir.bootlin.com/linux/v5.19.17/source/include/uapi/linux/input-event-codes.h#L75
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub const KEY_1: Self = Self(2);
    pub const KEY_2: Self = Self(3);
    pub const KEY_3: Self = Self(4);
    pub const KEY_4: Self = Self(5);
    pub const KEY_5: Self = Self(6);
    pub const KEY_6: Self = Self(7);
    pub const KEY_7: Self = Self(8);
    pub const KEY_8: Self = Self(9);
    pub const KEY_9: Self = Self(10);
    pub const KEY_0: Self = Self(11);
    pub const KEY_MINUS: Self = Self(12);
    pub const KEY_EQUAL: Self = Self(13);
    pub const KEY_BACKSPACE: Self = Self(14);
    pub const KEY_TAB: Self = Self(15);
    pub const KEY_Q: Self = Self(16);
    pub const KEY_W: Self = Self(17);
    pub const KEY_E: Self = Self(18);
    pub const KEY_R: Self = Self(19);
    pub const KEY_T: Self = Self(20);
    pub const KEY_Y: Self = Self(21);
    pub const KEY_U: Self = Self(22);
    pub const KEY_I: Self = Self(23);
    pub const KEY_O: Self = Self(24);
    pub const KEY_P: Self = Self(25);
    pub const KEY_LEFTBRACE: Self = Self(26);
    pub const KEY_RIGHTBRACE: Self = Self(27);
    pub const KEY_ENTER: Self = Self(28);
    pub const KEY_LEFTCTRL: Self = Self(29);
    pub const KEY_A: Self = Self(30);
    pub const KEY_S: Self = Self(31);
    pub const KEY_D: Self = Self(32);
    pub const KEY_F: Self = Self(33);
    pub const KEY_G: Self = Self(34);
    pub const KEY_H: Self = Self(35);
    pub const KEY_J: Self = Self(36);
    pub const KEY_K: Self = Self(37);
    pub const KEY_L: Self = Self(38);
    pub const KEY_SEMICOLON: Self = Self(39);
    pub const KEY_APOSTROPHE: Self = Self(40);
    pub const KEY_GRAVE: Self = Self(41);
    pub const KEY_LEFTSHIFT: Self = Self(42);
    pub const KEY_BACKSLASH: Self = Self(43);
    pub const KEY_Z: Self = Self(44);
    pub const KEY_X: Self = Self(45);
    pub const KEY_C: Self = Self(46);
    pub const KEY_V: Self = Self(47);
    pub const KEY_B: Self = Self(48);
    pub const KEY_N: Self = Self(49);
    pub const KEY_M: Self = Self(50);
    pub const KEY_COMMA: Self = Self(51);
    pub const KEY_DOT: Self = Self(52);
    pub const KEY_SLASH: Self = Self(53);
    pub const KEY_RIGHTSHIFT: Self = Self(54);
    pub const KEY_LEFTALT: Self = Self(56);
    pub const KEY_SPACE: Self = Self(57);
    pub const KEY_CAPSLOCK: Self = Self(58);
    pub const KEY_102ND: Self = Self(86);
    pub const KEY_RO: Self = Self(89);
    pub const KEY_KPENTER: Self = Self(96);
    pub const KEY_RIGHTALT: Self = Self(100);
    pub const KEY_LEFT: Self = Self(105);
    pub const KEY_RIGHT: Self = Self(106);
    pub const KEY_DELETE: Self = Self(111);
}

impl From<u16> for KeyCode {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
