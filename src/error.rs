use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeyloggerError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("no keyboard devices found")]
    NoDevicesFound,
    #[error("not a keyboard: {0}")]
    NotAKeyboard(PathBuf),
    #[error("unsupported event type: {0}")]
    UnsupportedEventType(u16),
    #[error("invalid timestamp: sec={0} usec={1}")]
    InvalidTimestamp(i64, i64),
    #[error("short read from {device}: got {read} of {expected} bytes")]
    ShortRead {
        device: PathBuf,
        read: usize,
        expected: usize,
    },
    #[error("failed to read from {device}: {source}")]
    SourceRead {
        device: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("line buffer is full ({limit} keys)")]
    BufferOverflow { limit: usize },
    #[error("failed to write log file {path}: {source}")]
    LogWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid log record at byte {offset}: {reason}")]
    InvalidLogRecord { offset: usize, reason: String },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("all event sources closed")]
    SourcesExhausted,
}
