// Some interesting Event types (see [input-event-codes.h] and the [kernel docs]).
//
// [input-event-codes.h]: https://elixir.bootlin.com/linux/v5.19.17/source/include/uapi/linux/input-event-codes.h#L38)
// [kernel docs]: https://www.kernel.org/doc/html/latest/input/event-codes.html
pub(crate) const EV_SYN: u16 = 0x00;
pub(crate) const EV_KEY: u16 = 0x01;
pub(crate) const EV_MSC: u16 = 0x04;
pub(crate) const EV_REP: u16 = 0x14;

/// The `value` of an EV_KEY caused by a key being released. Any other value (press or
/// autorepeat) means the key is down.
pub(crate) const EV_KEY_RELEASE: i32 = 0;

/// The event types a device must support to be treated as a keyboard.
pub(crate) const KEYBOARD_EV_BITS: u64 =
    (1 << EV_SYN) | (1 << EV_KEY) | (1 << EV_MSC) | (1 << EV_REP);

/// Check whether the event-type bitmask `ev_bits` describes a keyboard.
pub(crate) fn has_keyboard_flags(ev_bits: u64) -> bool {
    (ev_bits & KEYBOARD_EV_BITS) == KEYBOARD_EV_BITS
}
