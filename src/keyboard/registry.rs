//! Parsing of the kernel's input device registry (`/proc/bus/input/devices`).
//!
//! The registry lists one block per device, separated by blank lines:
//!
//! ```text
//! I: Bus=0011 Vendor=0001 Product=0001 Version=ab41
//! N: Name="AT Translated Set 2 keyboard"
//! H: Handlers=sysrq kbd leds event3
//! B: EV=120013
//! ```

use super::device::INPUT_DIR;
use super::event_codes::has_keyboard_flags;
use std::path::PathBuf;

pub(crate) const REGISTRY_PATH: &str = "/proc/bus/input/devices";

/// One device block of the registry.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct RegistryEntry {
    pub(crate) name: String,
    pub(crate) handlers: Vec<String>,
    /// The `B: EV=` bitmask, if present.
    pub(crate) ev_bits: Option<u64>,
}

impl RegistryEntry {
    /// The `eventN` handler of the device.
    pub(crate) fn event_node(&self) -> Option<&str> {
        self.handlers
            .iter()
            .map(String::as_str)
            .find(|h| h.strip_prefix("event").map_or(false, is_number))
    }

    /// Whether the device is handled by the keyboard driver and reports key events.
    pub(crate) fn is_keyboard(&self) -> bool {
        self.handlers.iter().any(|h| h == "kbd")
            && self.event_node().is_some()
            && self.ev_bits.map_or(true, has_keyboard_flags)
    }

    /// The path of the device's event node.
    pub(crate) fn device_path(&self) -> Option<PathBuf> {
        self.event_node()
            .map(|node| PathBuf::from(INPUT_DIR).join(node))
    }
}

fn is_number(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Parse the contents of the registry.
pub(crate) fn parse(registry: &str) -> Vec<RegistryEntry> {
    let mut entries = Vec::new();
    let mut current: Option<RegistryEntry> = None;

    for line in registry.lines() {
        let line = line.trim_end();

        if line.is_empty() {
            entries.extend(current.take());
            continue;
        }

        let Some((tag, value)) = line.split_once(": ") else {
            continue;
        };

        let entry = current.get_or_insert_with(RegistryEntry::default);

        match tag {
            "N" => {
                let name = value.strip_prefix("Name=").unwrap_or(value);
                entry.name = name.trim_matches('"').to_string();
            }
            "H" => {
                let handlers = value.strip_prefix("Handlers=").unwrap_or(value);
                entry.handlers = handlers.split_whitespace().map(String::from).collect();
            }
            "B" => {
                if let Some(bits) = value.strip_prefix("EV=") {
                    entry.ev_bits = u64::from_str_radix(bits.trim(), 16).ok();
                }
            }
            _ => {}
        }
    }

    entries.extend(current);
    entries
}

/// The event node paths of every keyboard listed in `registry`.
pub(crate) fn keyboard_paths(registry: &str) -> Vec<PathBuf> {
    parse(registry)
        .iter()
        .filter(|e| e.is_keyboard())
        .filter_map(|e| {
            let path = e.device_path()?;
            tracing::trace!("registry lists {:?} at {}", e.name, path.display());
            Some(path)
        })
        .collect()
}
