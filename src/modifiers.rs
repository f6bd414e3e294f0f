use crate::keymap::Action;

const CAPS_LOCK_FLAG: u8 = 0x01;
const SHIFT_FLAG: u8 = 0x02;
const ALT_GR_FLAG: u8 = 0x04;

/// The state of the modifier keys that change which character a key produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierState {
    /// Whether a shift key is held down.
    pub shift: bool,
    /// Whether caps lock is engaged.
    pub caps_lock: bool,
    /// Whether the alternate graphic key (right alt) is held down.
    pub alt_gr: bool,
}

impl ModifierState {
    /// Update the state in response to a modifier `action`.
    ///
    /// `active` is `true` for a press and `false` for a release. Caps lock only flips on
    /// press; shift and alt-gr follow the physical state of their key. Any other action leaves
    /// the state untouched.
    pub fn apply(&mut self, action: Action, active: bool) {
        match action {
            Action::ToggleCapsLock if active => self.caps_lock = !self.caps_lock,
            Action::ToggleShift => self.shift = active,
            Action::ToggleAltGr => self.alt_gr = active,
            _ => {}
        }
    }

    /// Pack the state into the flag byte stored in binary logs.
    pub fn to_flags(self) -> u8 {
        let mut flags = 0;

        if self.caps_lock {
            flags |= CAPS_LOCK_FLAG;
        }
        if self.shift {
            flags |= SHIFT_FLAG;
        }
        if self.alt_gr {
            flags |= ALT_GR_FLAG;
        }

        flags
    }

    /// Unpack a flag byte produced by [`ModifierState::to_flags`]. Unknown bits are ignored.
    pub fn from_flags(flags: u8) -> Self {
        Self {
            shift: flags & SHIFT_FLAG != 0,
            caps_lock: flags & CAPS_LOCK_FLAG != 0,
            alt_gr: flags & ALT_GR_FLAG != 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_lock_flips_on_press_only() {
        let mut mods = ModifierState::default();

        mods.apply(Action::ToggleCapsLock, true);
        assert!(mods.caps_lock);

        mods.apply(Action::ToggleCapsLock, false);
        assert!(mods.caps_lock);

        mods.apply(Action::ToggleCapsLock, true);
        assert!(!mods.caps_lock);
    }

    #[test]
    fn shift_and_alt_gr_track_key_state() {
        let mut mods = ModifierState::default();

        mods.apply(Action::ToggleShift, true);
        mods.apply(Action::ToggleAltGr, true);
        assert!(mods.shift && mods.alt_gr);

        // A repeated press does not toggle the key back off.
        mods.apply(Action::ToggleShift, true);
        assert!(mods.shift);

        mods.apply(Action::ToggleShift, false);
        mods.apply(Action::ToggleAltGr, false);
        assert_eq!(mods, ModifierState::default());
    }

    #[test]
    fn non_modifier_actions_are_ignored() {
        let mut mods = ModifierState::default();

        mods.apply(Action::Char('a'), true);
        mods.apply(Action::Submit, true);
        mods.apply(Action::Unknown, true);

        assert_eq!(mods, ModifierState::default());
    }

    #[test]
    fn flag_bits() {
        let mods = ModifierState {
            shift: true,
            caps_lock: false,
            alt_gr: true,
        };

        assert_eq!(mods.to_flags(), 0x06);
        assert_eq!(ModifierState::from_flags(0x06), mods);
        assert_eq!(ModifierState::from_flags(0xf1).to_flags(), 0x01);
    }
}
